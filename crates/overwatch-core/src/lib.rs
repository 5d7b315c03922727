//! Event watch, deduplication and dispatch engine for Overwatch.
//!
//! `overwatch-core` turns a stream of cluster events into notifications. It
//! owns everything that does not depend on a particular cluster API or chat
//! service:
//!
//! - **Severity**: a reason-to-level table with overridable entries
//! - **Watch state**: duplicate suppression, a startup window and a growing
//!   per-event quiet period
//! - **Mentions**: addressee lookup from a label on the involved object
//! - **Dispatch**: a minimum-level threshold and independent fan-out to every
//!   channel, each bounded by a timeout
//! - **Watch loop**: signal-driven relisting with bounded concurrent delivery
//!   and cooperative shutdown
//!
//! Cluster access goes through the [`EventSource`] trait and delivery through
//! the [`Notifier`] trait.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use overwatch_core::{Decision, Level, SeverityTable, WatchState, Event};
//!
//! let table = SeverityTable::default();
//! assert_eq!(table.classify("BackOff"), Level::Error);
//! assert_eq!(table.classify("Scheduled"), Level::Info);
//!
//! let start = Utc::now();
//! let mut state = WatchState::new(start);
//! let event = Event::new("uid-1", "Scheduled", start);
//!
//! assert!(state.observe(&event, start).should_notify());
//! assert_eq!(state.observe(&event, start), Decision::Duplicate);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod level;
pub mod notifier;
pub mod resolver;
pub mod severity;
pub mod source;
pub mod state;
pub mod watcher;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::{DEFAULT_DELIVERY_TIMEOUT, DispatchReport, Dispatcher, FailurePolicy};
pub use error::{LevelParseError, NotifyError, Result, SourceError, WatchError};
pub use event::{Event, EventOrigin, ObjectReference};
pub use level::Level;
pub use notifier::{Notification, Notifier};
pub use resolver::MentionResolver;
pub use severity::SeverityTable;
pub use source::{
    BoxFuture, EventSource, ResourceKind, ResourceMeta, SignalKind, SignalStream, WatchSignal,
};
pub use state::{Decision, ThrottleRecord, WatchRecord, WatchState};
pub use watcher::{DEFAULT_MAX_IN_FLIGHT, PassSummary, WatchPhase, Watcher, WatcherConfig};
