//! Notifications and the channel contract.
//!
//! A [`Notification`] is built once per qualifying event and handed to every
//! enabled [`Notifier`]. Each notifier renders it in its channel's own format.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::NotifyError;
use crate::event::Event;
use crate::level::Level;
use crate::source::BoxFuture;

/// A notification about one event occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Name of the cluster the event came from.
    pub cluster: String,
    /// The event snapshot.
    pub event: Event,
    /// Computed severity.
    pub level: Level,
    /// Addressee, possibly empty.
    pub mention: String,
}

impl Notification {
    /// Creates a notification.
    #[must_use]
    pub fn new(cluster: impl Into<String>, event: Event, level: Level, mention: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            event,
            level,
            mention: mention.into(),
        }
    }

    /// Returns the mention, or `None` when it is empty.
    #[must_use]
    pub fn mention(&self) -> Option<&str> {
        if self.mention.is_empty() {
            None
        } else {
            Some(&self.mention)
        }
    }
}

/// A delivery channel for notifications.
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Returns the name of this channel.
    fn name(&self) -> &str;

    /// Delivers a notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel did not accept the notification.
    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotifyError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn empty_mention_is_none() {
        let event = Event::new("uid", "Scheduled", Utc::now());
        let notification = Notification::new("local", event, Level::Info, "");
        assert_eq!(notification.mention(), None);
    }

    #[test]
    fn mention_is_returned() {
        let event = Event::new("uid", "Scheduled", Utc::now());
        let notification = Notification::new("local", event, Level::Info, "here");
        assert_eq!(notification.mention(), Some("here"));
        assert_eq!(notification.cluster, "local");
    }
}
