//! Overwatch watches the events of a Kubernetes namespace and forwards the
//! ones worth knowing about to log, Slack and Datadog.
//!
//! This crate wires the pieces together:
//!
//! - [`settings`] parses flags and `OVERWATCH_*` variables into a [`Config`]
//! - [`app`] builds the channels, dispatcher and watcher and runs them
//! - [`status`] serves the usage, version and health-check routes

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod app;
pub mod settings;
pub mod status;

pub use app::{build_dispatcher, build_watcher, run, serve};
pub use settings::{ChannelSettings, ClusterTarget, Config, LogFormat, Settings, SettingsError};
pub use status::{StatusError, StatusServer};
