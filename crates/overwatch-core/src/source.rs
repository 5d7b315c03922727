//! The event source contract.
//!
//! The watch loop only needs three things from a cluster: a stream of change
//! signals, a point-in-time listing of events, and metadata lookups for the
//! objects events refer to. [`EventSource`] captures exactly that so the loop
//! can be driven by the Kubernetes API in production and by an in-memory
//! source in tests.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::event::Event;

/// Boxed future type for async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Stream of change signals produced by [`EventSource::watch`].
pub type SignalStream = Pin<Box<dyn Stream<Item = Result<WatchSignal, SourceError>> + Send>>;

/// What kind of change a signal reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    /// An event was created.
    Added,
    /// An event was updated.
    Modified,
    /// An event was removed.
    Deleted,
    /// A progress marker with no object change.
    Bookmark,
    /// The server reported an error on the watch.
    Error,
}

impl SignalKind {
    /// Returns the kind as its wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "ADDED",
            Self::Modified => "MODIFIED",
            Self::Deleted => "DELETED",
            Self::Bookmark => "BOOKMARK",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change notification from the event source.
///
/// The loop re-lists on every signal, so the changed object itself is not
/// carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSignal {
    /// Kind of change.
    pub kind: SignalKind,
}

impl WatchSignal {
    /// Creates a signal of the given kind.
    #[must_use]
    pub const fn new(kind: SignalKind) -> Self {
        Self { kind }
    }
}

/// Resource kinds whose metadata can be looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A pod.
    Pod,
    /// A service.
    Service,
    /// A node. Cluster-scoped.
    Node,
    /// A deployment.
    Deployment,
    /// A replica set.
    ReplicaSet,
    /// A job.
    Job,
    /// A daemon set.
    DaemonSet,
}

impl ResourceKind {
    /// All supported kinds.
    pub const ALL: [Self; 7] = [
        Self::Pod,
        Self::Service,
        Self::Node,
        Self::Deployment,
        Self::ReplicaSet,
        Self::Job,
        Self::DaemonSet,
    ];

    /// Returns the kind name as it appears in object references.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pod => "Pod",
            Self::Service => "Service",
            Self::Node => "Node",
            Self::Deployment => "Deployment",
            Self::ReplicaSet => "ReplicaSet",
            Self::Job => "Job",
            Self::DaemonSet => "DaemonSet",
        }
    }

    /// Returns true if objects of this kind live in a namespace.
    #[must_use]
    pub const fn is_namespaced(&self) -> bool {
        !matches!(self, Self::Node)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SourceError::UnsupportedKind(s.to_string()))
    }
}

/// Metadata of a looked-up resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMeta {
    /// Object name.
    pub name: String,
    /// Object labels.
    pub labels: HashMap<String, String>,
}

impl ResourceMeta {
    /// Creates metadata with no labels.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: HashMap::new(),
        }
    }

    /// Adds a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Returns a label value.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// A cluster that reports events.
pub trait EventSource: Send + Sync {
    /// Opens a stream of change signals for `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch cannot be established.
    fn watch<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<SignalStream, SourceError>>;

    /// Lists every current event in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    fn list<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<Vec<Event>, SourceError>>;

    /// Fetches the metadata of a resource.
    ///
    /// `namespace` is ignored for cluster-scoped kinds.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource does not exist or the lookup fails.
    fn get_resource<'a>(
        &'a self,
        kind: ResourceKind,
        namespace: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<ResourceMeta, SourceError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Pod", ResourceKind::Pod)]
    #[test_case("Service", ResourceKind::Service)]
    #[test_case("Node", ResourceKind::Node)]
    #[test_case("Deployment", ResourceKind::Deployment)]
    #[test_case("ReplicaSet", ResourceKind::ReplicaSet)]
    #[test_case("Job", ResourceKind::Job)]
    #[test_case("DaemonSet", ResourceKind::DaemonSet)]
    fn parse_supported_kind(input: &str, expected: ResourceKind) {
        assert_eq!(input.parse::<ResourceKind>().unwrap(), expected);
    }

    #[test_case("StatefulSet" ; "stateful set")]
    #[test_case("pod" ; "lower case")]
    #[test_case("" ; "empty")]
    fn parse_unsupported_kind(input: &str) {
        let err = input.parse::<ResourceKind>().unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedKind(k) if k == input));
    }

    #[test]
    fn only_nodes_are_cluster_scoped() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.is_namespaced(), kind != ResourceKind::Node);
        }
    }

    #[test]
    fn resource_meta_labels() {
        let meta = ResourceMeta::new("web").with_label("team", "payments");
        assert_eq!(meta.label("team"), Some("payments"));
        assert_eq!(meta.label("owner"), None);
    }

    #[test]
    fn signal_kind_wire_names() {
        let kind: SignalKind = serde_json::from_str("\"MODIFIED\"").unwrap();
        assert_eq!(kind, SignalKind::Modified);
        assert_eq!(SignalKind::Bookmark.to_string(), "BOOKMARK");
    }
}
