//! A channel that writes notifications to the process log.

use tracing::{debug, error, info, warn};

use overwatch_core::{BoxFuture, Level, Notification, Notifier, NotifyError};

use crate::format::rfc1123;

/// Logs each notification as one record at the notification's level.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    name: String,
}

impl LogNotifier {
    /// Creates a log channel with a custom name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Renders `cluster / reason / message / lastSeen`, with ` / @mention`
    /// appended when a mention is set.
    #[must_use]
    pub fn format_line(notification: &Notification) -> String {
        let event = &notification.event;
        let mut line = format!(
            "{} / {} / {} / {}",
            notification.cluster,
            event.reason,
            event.message,
            rfc1123(&event.last_seen)
        );
        if let Some(mention) = notification.mention() {
            line.push_str(" / @");
            line.push_str(mention);
        }
        line
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new("log")
    }
}

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            let line = Self::format_line(notification);
            let id = notification.event.id.as_str();
            match notification.level {
                Level::Debug => debug!(channel = %self.name, id, "{line}"),
                Level::Info => info!(channel = %self.name, id, "{line}"),
                Level::Warn => warn!(channel = %self.name, id, "{line}"),
                Level::Error => error!(channel = %self.name, id, "{line}"),
            }
            Ok(())
        })
    }
}
