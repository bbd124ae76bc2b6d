//! Output collaborators: notifications, toasts and diagnostics.
//!
//! The engine reports through three narrow traits so it has no ambient
//! globals and can be exercised with recording doubles in tests. Each trait
//! has a `tracing`-backed default used when the caller supplies nothing.

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use super::position::BoxFuture;

// =============================================================================
// Notifications
// =============================================================================

/// A user-visible notification to deliver immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Notification identifier, unique per engine.
    pub id: u32,
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Delivery time (the engine always asks for "now").
    pub deliver_at: DateTime<Utc>,
    /// Structured data attached for the tap handler.
    pub payload: Value,
}

/// Errors raised while scheduling a notification.
#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    /// Notifications are not permitted on this device.
    #[error("Notifications not permitted")]
    NotPermitted,

    /// The platform rejected the request.
    #[error("Failed to schedule notification: {0}")]
    Rejected(String),
}

/// Schedules local notifications.
///
/// Fire-and-forget from the engine's point of view: failures are logged and
/// never reach the engine's caller.
pub trait NotificationSink: Send + Sync {
    /// Schedule a notification.
    fn schedule(&self, notification: Notification) -> BoxFuture<'_, Result<(), NotificationError>>;
}

/// Notification sink that writes each notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifications;

impl NotificationSink for LogNotifications {
    fn schedule(&self, notification: Notification) -> BoxFuture<'_, Result<(), NotificationError>> {
        Box::pin(async move {
            info!(
                id = notification.id,
                title = %notification.title,
                payload = %notification.payload,
                "{}",
                notification.body
            );
            Ok(())
        })
    }
}

// =============================================================================
// Toasts
// =============================================================================

/// Visual style of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToastVariant {
    /// Informational message.
    #[default]
    Default,
    /// Error or blocking condition.
    Destructive,
}

/// An ephemeral user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    /// Title line.
    pub title: String,
    /// Description text.
    pub description: String,
    /// Visual style.
    pub variant: ToastVariant,
}

impl Toast {
    /// Create an informational toast.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: ToastVariant::Default,
        }
    }

    /// Create a destructive toast.
    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            variant: ToastVariant::Destructive,
            ..Self::new(title, description)
        }
    }
}

/// Shows toasts to the user.
pub trait ToastSink: Send + Sync {
    /// Show a toast.
    fn show(&self, toast: Toast);
}

/// Toast sink that writes each toast to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogToasts;

impl ToastSink for LogToasts {
    fn show(&self, toast: Toast) {
        match toast.variant {
            ToastVariant::Default => info!(title = %toast.title, "{}", toast.description),
            ToastVariant::Destructive => warn!(title = %toast.title, "{}", toast.description),
        }
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Severity of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Audit trail for geofencing activity.
pub trait DiagnosticLog: Send + Sync {
    /// Record an entry with optional structured context.
    fn log(&self, level: LogLevel, message: &str, context: Option<&Value>);
}

/// Diagnostic sink backed by `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticLog for TracingDiagnostics {
    fn log(&self, level: LogLevel, message: &str, context: Option<&Value>) {
        let context = context.map(ToString::to_string);
        let context = context.as_deref();
        match level {
            LogLevel::Info => info!(target: "sitewatch::diagnostics", context, "{}", message),
            LogLevel::Warn => warn!(target: "sitewatch::diagnostics", context, "{}", message),
            LogLevel::Error => error!(target: "sitewatch::diagnostics", context, "{}", message),
        }
    }
}
