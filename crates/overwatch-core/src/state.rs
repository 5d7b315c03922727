//! Deduplication and throttle state.
//!
//! [`WatchState`] is owned by the watch loop and only mutated through
//! `&mut self`, so a single writer is guaranteed by construction. Records are
//! never evicted; they live until the process exits.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::event::Event;

/// Default startup horizon in seconds: events last seen more than this long
/// before process start are treated as history.
pub const DEFAULT_STARTUP_HORIZON_SECS: i64 = 60;

/// The last snapshot observed for an event id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRecord {
    /// The snapshot.
    pub event: Event,
}

/// Notification history for an event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleRecord {
    /// When the last notification was let through.
    pub last_sent_at: DateTime<Utc>,
    /// Quiet period, in minutes, before the next notification.
    pub backoff_level: u32,
}

impl ThrottleRecord {
    /// Earliest time the next notification for this id may be sent.
    #[must_use]
    pub fn can_send_at(&self) -> DateTime<Utc> {
        self.last_sent_at + Duration::minutes(i64::from(self.backoff_level))
    }
}

/// The outcome of observing one event snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The snapshot carries no new information.
    Duplicate,
    /// The event predates process start by more than the horizon.
    Stale {
        /// How long before process start the event was last seen.
        age: Duration,
    },
    /// The id is still inside its quiet period.
    Throttled {
        /// When the quiet period ends.
        until: DateTime<Utc>,
        /// The current backoff level.
        backoff_level: u32,
    },
    /// A notification should be sent.
    Notify {
        /// The backoff level recorded for this notification.
        backoff_level: u32,
    },
}

impl Decision {
    /// Returns true if the decision lets a notification through.
    #[must_use]
    pub const fn should_notify(&self) -> bool {
        matches!(self, Self::Notify { .. })
    }
}

/// In-memory dedup and throttle records keyed by event id.
#[derive(Debug, Clone)]
pub struct WatchState {
    started_at: DateTime<Utc>,
    horizon: Duration,
    seen: HashMap<String, WatchRecord>,
    sent: HashMap<String, ThrottleRecord>,
}

impl WatchState {
    /// Creates empty state for a process that started at `started_at`.
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self::with_horizon(started_at, Duration::seconds(DEFAULT_STARTUP_HORIZON_SECS))
    }

    /// Creates empty state with a custom startup horizon.
    #[must_use]
    pub fn with_horizon(started_at: DateTime<Utc>, horizon: Duration) -> Self {
        Self {
            started_at,
            horizon,
            seen: HashMap::new(),
            sent: HashMap::new(),
        }
    }

    /// When the process started.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Decides what to do with a snapshot observed at `now`.
    ///
    /// The snapshot is remembered for duplicate checks even when a later
    /// check skips it. The throttle record is only written when the decision
    /// is [`Decision::Notify`].
    pub fn observe(&mut self, event: &Event, now: DateTime<Utc>) -> Decision {
        if self
            .seen
            .get(&event.id)
            .is_some_and(|record| record.event.count == event.count)
        {
            return Decision::Duplicate;
        }

        self.seen.insert(
            event.id.clone(),
            WatchRecord {
                event: event.clone(),
            },
        );

        let age = self.started_at - event.last_seen;
        if age > self.horizon {
            return Decision::Stale { age };
        }

        let backoff_level = match self.sent.get(&event.id) {
            Some(record) => {
                let until = record.can_send_at();
                if now < until {
                    return Decision::Throttled {
                        until,
                        backoff_level: record.backoff_level,
                    };
                }
                record.backoff_level + 1
            }
            None => 0,
        };

        self.sent.insert(
            event.id.clone(),
            ThrottleRecord {
                last_sent_at: now,
                backoff_level,
            },
        );

        Decision::Notify { backoff_level }
    }

    /// Returns the watch record for an id.
    #[must_use]
    pub fn watch_record(&self, id: &str) -> Option<&WatchRecord> {
        self.seen.get(id)
    }

    /// Returns the throttle record for an id.
    #[must_use]
    pub fn throttle_record(&self, id: &str) -> Option<&ThrottleRecord> {
        self.sent.get(id)
    }

    /// Number of distinct ids observed.
    #[must_use]
    pub fn observed_count(&self) -> usize {
        self.seen.len()
    }

    /// Number of distinct ids notified.
    #[must_use]
    pub fn notified_count(&self) -> usize {
        self.sent.len()
    }
}
