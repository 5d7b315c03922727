//! Notification channels for Overwatch.
//!
//! Every channel implements [`overwatch_core::Notifier`]:
//!
//! - [`LogNotifier`] writes one log record at the notification's level
//! - [`SlackNotifier`] posts a message with event, detail and object
//!   attachments through `chat.postMessage`
//! - [`DatadogNotifier`] creates a Datadog event with tags and a markdown
//!   body
//!
//! The HTTP channels take a configurable base URL so they can be pointed at
//! other API sites or at a local server.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod datadog;
pub mod format;
pub mod log;
pub mod slack;

pub use datadog::{DATADOG_API_URL, DatadogConfig, DatadogEvent, DatadogNotifier};
pub use log::LogNotifier;
pub use slack::{Attachment, Field, PostMessage, SLACK_API_URL, SlackConfig, SlackNotifier};
