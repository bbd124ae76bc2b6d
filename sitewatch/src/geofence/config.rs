//! Configuration for the proximity engine.

use std::time::Duration;

use super::position::WatchOptions;

/// Default time a device must stay inside a region before a dwell event.
pub const DEFAULT_DWELL_TIME: Duration = Duration::from_secs(60);

/// Default advisory position check interval.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Configuration for [`ProximityEngine`](super::ProximityEngine).
#[derive(Debug, Clone)]
pub struct GeofenceConfig {
    /// How long the device must remain inside a region before `on_dwell`
    /// fires. Zero disables dwell timers.
    pub dwell_time: Duration,

    /// Advisory cadence for position checks.
    ///
    /// Actual cadence is driven by the position source; the value is passed
    /// along as [`WatchOptions::interval_hint`].
    pub check_interval: Duration,

    /// Schedule a local notification when a region is entered.
    pub enable_notifications: bool,

    /// Also notify when a region is exited. Requires `enable_notifications`.
    pub notify_on_exit: bool,

    /// Options for the position watch.
    pub watch: WatchOptions,

    /// Capacity of the channel returned by `subscribe()`.
    pub event_channel_capacity: usize,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            dwell_time: DEFAULT_DWELL_TIME,
            check_interval: DEFAULT_CHECK_INTERVAL,
            enable_notifications: true,
            notify_on_exit: false,
            watch: WatchOptions::default(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl GeofenceConfig {
    /// Set the dwell time.
    pub fn with_dwell_time(mut self, dwell_time: Duration) -> Self {
        self.dwell_time = dwell_time;
        self
    }

    /// Set the advisory check interval.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Enable or disable notifications.
    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.enable_notifications = enabled;
        self
    }

    /// Enable or disable exit notifications.
    pub fn with_exit_notifications(mut self, enabled: bool) -> Self {
        self.notify_on_exit = enabled;
        self
    }

    /// Set the position watch options.
    pub fn with_watch_options(mut self, watch: WatchOptions) -> Self {
        self.watch = watch;
        self
    }

    /// Watch options with the check interval applied as the cadence hint.
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            interval_hint: self.check_interval,
            ..self.watch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GeofenceConfig::default();
        assert_eq!(config.dwell_time, Duration::from_secs(60));
        assert_eq!(config.check_interval, Duration::from_secs(10));
        assert!(config.enable_notifications);
        assert!(!config.notify_on_exit);
    }

    #[test]
    fn test_builder_pattern() {
        let config = GeofenceConfig::default()
            .with_dwell_time(Duration::from_secs(300))
            .with_check_interval(Duration::from_secs(30))
            .with_notifications(false)
            .with_exit_notifications(true);

        assert_eq!(config.dwell_time, Duration::from_secs(300));
        assert!(!config.enable_notifications);
        assert!(config.notify_on_exit);
        assert_eq!(config.watch_options().interval_hint, Duration::from_secs(30));
        assert_eq!(config.watch_options().timeout, Duration::from_secs(10));
    }
}
