//! Console renderings of the engine's user-facing output.

use console::style;
use sitewatch::geofence::{
    BoxFuture, GeofenceEvent, GeofenceEventKind, Notification, NotificationError,
    NotificationSink, Toast, ToastSink, ToastVariant,
};

/// Prints toasts as highlighted lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleToasts;

impl ToastSink for ConsoleToasts {
    fn show(&self, toast: Toast) {
        println!("{}", format_toast(&toast));
    }
}

/// Prints notifications instead of delivering them to a device.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifications;

impl NotificationSink for ConsoleNotifications {
    fn schedule(&self, notification: Notification) -> BoxFuture<'_, Result<(), NotificationError>> {
        Box::pin(async move {
            println!(
                "{} {}: {}",
                style("[notification]").magenta(),
                style(&notification.title).bold(),
                notification.body
            );
            Ok(())
        })
    }
}

pub fn format_toast(toast: &Toast) -> String {
    let tag = match toast.variant {
        ToastVariant::Default => style("[toast]").cyan(),
        ToastVariant::Destructive => style("[toast]").red().bold(),
    };
    format!("{} {} - {}", tag, style(&toast.title).bold(), toast.description)
}

pub fn format_event(event: &GeofenceEvent) -> String {
    let kind = match event.kind {
        GeofenceEventKind::Enter => style("ENTER").green().bold(),
        GeofenceEventKind::Exit => style("EXIT ").yellow().bold(),
        GeofenceEventKind::Dwell => style("DWELL").blue().bold(),
    };
    format!(
        "{} {} {} ({}) at {:.5}, {:.5}",
        style(event.timestamp.format("%H:%M:%S")).dim(),
        kind,
        event.region.name,
        event.region.id,
        event.position.latitude,
        event.position.longitude
    )
}
