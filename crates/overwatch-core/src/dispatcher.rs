//! Notification fan-out.
//!
//! The [`Dispatcher`] applies the minimum-level threshold and then hands a
//! notification to every configured channel. Channels are attempted
//! independently: a failing or hanging channel never stops delivery to the
//! others. What a failure means for the process is decided by the caller via
//! [`FailurePolicy`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info};

use crate::error::NotifyError;
use crate::level::Level;
use crate::notifier::{Notification, Notifier};

/// Default per-channel delivery timeout.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// What to do when a channel fails to deliver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the watch loop and exit the process.
    #[default]
    Exit,
    /// Log the failure and keep going.
    Log,
}

impl FailurePolicy {
    /// Returns the policy name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exit => "exit",
            Self::Log => "log",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exit" => Ok(Self::Exit),
            "log" => Ok(Self::Log),
            other => Err(format!("unknown failure policy: {other}")),
        }
    }
}

/// The outcome of dispatching one notification.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// The notification was below the threshold and sent nowhere.
    pub suppressed: bool,
    /// Channels that accepted the notification.
    pub delivered: Vec<String>,
    /// Channels that failed, with their errors.
    pub failed: Vec<(String, NotifyError)>,
}

impl DispatchReport {
    fn suppressed() -> Self {
        Self {
            suppressed: true,
            ..Self::default()
        }
    }

    /// Returns true if no channel failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fans notifications out to a fixed set of channels.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    channels: Vec<Arc<dyn Notifier>>,
    min_level: Level,
    delivery_timeout: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher with no channels that lets everything through.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            min_level: Level::Debug,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }

    /// Adds a channel.
    #[must_use]
    pub fn with_channel(mut self, channel: Arc<dyn Notifier>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Sets the minimum level a notification needs to be delivered.
    #[must_use]
    pub const fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Sets the per-channel delivery timeout.
    #[must_use]
    pub const fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// The configured threshold.
    #[must_use]
    pub const fn min_level(&self) -> Level {
        self.min_level
    }

    /// Names of the configured channels.
    #[must_use]
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Returns true if a notification at `level` would be delivered.
    #[must_use]
    pub fn admits(&self, level: Level) -> bool {
        level.meets(self.min_level)
    }

    /// Delivers a notification to every channel, or to none if it is below
    /// the threshold.
    pub async fn dispatch(&self, notification: &Notification) -> DispatchReport {
        if !self.admits(notification.level) {
            debug!(
                level = %notification.level,
                threshold = %self.min_level,
                cluster = %notification.cluster,
                reason = %notification.event.reason,
                event_message = %notification.event.message,
                last_seen = %notification.event.last_seen,
                "skipping notification below threshold"
            );
            return DispatchReport::suppressed();
        }

        let timeout = self.delivery_timeout;
        let sends = self.channels.iter().map(|channel| async move {
            let result = match tokio::time::timeout(timeout, channel.send(notification)).await {
                Ok(result) => result,
                Err(_) => Err(NotifyError::Timeout(timeout)),
            };
            (channel.name().to_string(), result)
        });

        let mut report = DispatchReport::default();
        for (name, result) in join_all(sends).await {
            match result {
                Ok(()) => report.delivered.push(name),
                Err(e) => report.failed.push((name, e)),
            }
        }

        info!(
            id = %notification.event.id,
            reason = %notification.event.reason,
            level = %notification.level,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "notification dispatched"
        );

        report
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
