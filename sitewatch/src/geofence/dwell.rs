//! Per-region dwell timers.
//!
//! One outstanding timer per region id. Arming a region that already has a
//! timer cancels the old one first. Dropping the collection cancels
//! everything, so timers never outlive their owner.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Owned collection of armed dwell timers keyed by region id.
#[derive(Debug, Default)]
pub struct DwellTimers {
    timers: HashMap<String, CancellationToken>,
}

impl DwellTimers {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a single-shot timer for `region_id`.
    ///
    /// After `delay`, `on_fire` runs with the timer's token unless the timer
    /// was cancelled first. The token is a child of `parent`, so cancelling
    /// the parent cancels the timer too. Must be called within a Tokio
    /// runtime.
    pub fn arm<F, Fut>(
        &mut self,
        region_id: &str,
        delay: Duration,
        parent: &CancellationToken,
        on_fire: F,
    ) where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = parent.child_token();
        let timer_token = token.clone();
        let fire_token = token.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = timer_token.cancelled() => {}
                _ = tokio::time::sleep(delay) => on_fire(fire_token).await,
            }
        });

        if let Some(previous) = self.timers.insert(region_id.to_string(), token) {
            previous.cancel();
        }
    }

    /// Cancel and remove the timer for `region_id`.
    ///
    /// Returns `true` if a timer was armed.
    pub fn cancel(&mut self, region_id: &str) -> bool {
        match self.timers.remove(region_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Forget the timer for `region_id` without cancelling it.
    ///
    /// Used by a timer that has fired to deregister itself.
    pub fn release(&mut self, region_id: &str) {
        self.timers.remove(region_id);
    }

    /// Cancel every armed timer.
    pub fn cancel_all(&mut self) {
        for (_, token) in self.timers.drain() {
            token.cancel();
        }
    }

    /// Whether a timer is armed for `region_id`.
    pub fn is_armed(&self, region_id: &str) -> bool {
        self.timers.contains_key(region_id)
    }

    /// Number of armed timers.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Whether no timers are armed.
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl Drop for DwellTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnOnce(CancellationToken) -> std::future::Ready<()> {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_once_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let parent = CancellationToken::new();
        let mut timers = DwellTimers::new();

        timers.arm("a", Duration::from_secs(60), &parent, counting(&fired));
        assert!(timers.is_armed("a"));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let fired = Arc::new(AtomicUsize::new(0));
        let parent = CancellationToken::new();
        let mut timers = DwellTimers::new();

        timers.arm("a", Duration::from_secs(60), &parent, counting(&fired));
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert!(timers.cancel("a"));
        assert!(!timers.cancel("a"));
        assert!(timers.is_empty());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_timer() {
        let fired = Arc::new(AtomicUsize::new(0));
        let parent = CancellationToken::new();
        let mut timers = DwellTimers::new();

        timers.arm("a", Duration::from_secs(60), &parent, counting(&fired));
        tokio::time::sleep(Duration::from_secs(30)).await;
        timers.arm("a", Duration::from_secs(60), &parent, counting(&fired));
        assert_eq!(timers.len(), 1);

        // Original deadline passes without firing
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancel_and_drop_cancel_everything() {
        let fired = Arc::new(AtomicUsize::new(0));
        let parent = CancellationToken::new();

        let mut timers = DwellTimers::new();
        timers.arm("a", Duration::from_secs(10), &parent, counting(&fired));
        timers.arm("b", Duration::from_secs(10), &parent, counting(&fired));
        parent.cancel();

        let other_parent = CancellationToken::new();
        let mut dropped = DwellTimers::new();
        dropped.arm("c", Duration::from_secs(10), &other_parent, counting(&fired));
        drop(dropped);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timers.len(), 2);

        timers.cancel_all();
        assert!(timers.is_empty());
    }
}
