//! Kubernetes event source for Overwatch.
//!
//! [`KubeClient`] implements [`overwatch_core::EventSource`] over the plain
//! Kubernetes REST API:
//!
//! - events are listed from `/api/v1/namespaces/{ns}/events`
//! - changes are streamed from the same path with `watch=true`
//! - involved objects are read from the core, `apps/v1` and `batch/v1`
//!   groups for their labels
//!
//! Connections go either to an explicit host such as a `kubectl proxy`, or
//! to the in-cluster API server using the pod's service account.
//!
//! ```rust,no_run
//! use overwatch_kube::{ClusterConfig, KubeClient};
//!
//! # fn main() -> Result<(), overwatch_kube::ConnectError> {
//! let client = KubeClient::new(ClusterConfig::from_host("http://127.0.0.1:8001"))?;
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod wire;

pub use client::{DEFAULT_MAX_WATCH_FRAME, KubeClient, events_path, resource_path};
pub use config::{ClusterConfig, DEFAULT_REQUEST_TIMEOUT, SERVICE_ACCOUNT_DIR};
pub use error::{ConnectError, Result};
