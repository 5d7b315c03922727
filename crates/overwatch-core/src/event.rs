//! Cluster event snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The object an event is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectReference {
    /// Object kind, e.g. `Pod`.
    pub kind: String,
    /// Object name.
    pub name: String,
}

/// The component that reported an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOrigin {
    /// Reporting component, e.g. `default-scheduler`.
    pub component: String,
    /// Node the component runs on. Empty for control-plane components.
    pub host: String,
}

/// An immutable snapshot of one cluster event.
///
/// The same `id` is reported again whenever the occurrence repeats; `count`
/// never decreases between snapshots of one id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Stable unique identifier.
    pub id: String,
    /// Short reason code, e.g. `BackOff`.
    pub reason: String,
    /// Free-form message.
    pub message: String,
    /// The cluster's own classification (`Normal` or `Warning`).
    pub event_type: String,
    /// Number of occurrences folded into this event.
    pub count: u32,
    /// First occurrence.
    pub first_seen: DateTime<Utc>,
    /// Most recent occurrence.
    pub last_seen: DateTime<Utc>,
    /// The object the event is about.
    pub involved_object: ObjectReference,
    /// The reporting component.
    pub source: EventOrigin,
    /// Namespace of the event.
    pub namespace: String,
    /// Name of the event object itself.
    pub object_name: String,
}

impl Event {
    /// Creates an event with a single occurrence at `seen`.
    ///
    /// Remaining fields start empty; use the `with_*` setters to fill them.
    #[must_use]
    pub fn new(id: impl Into<String>, reason: impl Into<String>, seen: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            reason: reason.into(),
            message: String::new(),
            event_type: "Normal".to_string(),
            count: 1,
            first_seen: seen,
            last_seen: seen,
            involved_object: ObjectReference::default(),
            source: EventOrigin::default(),
            namespace: String::new(),
            object_name: String::new(),
        }
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the occurrence count.
    #[must_use]
    pub const fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Sets the most recent occurrence.
    #[must_use]
    pub const fn with_last_seen(mut self, last_seen: DateTime<Utc>) -> Self {
        self.last_seen = last_seen;
        self
    }

    /// Sets the involved object.
    #[must_use]
    pub fn with_involved_object(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.involved_object = ObjectReference {
            kind: kind.into(),
            name: name.into(),
        };
        self
    }

    /// Sets the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the event object name.
    #[must_use]
    pub fn with_object_name(mut self, name: impl Into<String>) -> Self {
        self.object_name = name.into();
        self
    }

    /// Sets the reporting component.
    #[must_use]
    pub fn with_source(mut self, component: impl Into<String>, host: impl Into<String>) -> Self {
        self.source = EventOrigin {
            component: component.into(),
            host: host.into(),
        };
        self
    }

    /// Sets the cluster classification.
    #[must_use]
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_has_single_occurrence() {
        let now = Utc::now();
        let event = Event::new("uid-1", "Scheduled", now);

        assert_eq!(event.count, 1);
        assert_eq!(event.first_seen, now);
        assert_eq!(event.last_seen, now);
        assert_eq!(event.event_type, "Normal");
    }

    #[test]
    fn builder_sets_fields() {
        let now = Utc::now();
        let event = Event::new("uid-1", "BackOff", now)
            .with_message("Back-off restarting failed container")
            .with_count(7)
            .with_involved_object("Pod", "web-7d9f-abcde")
            .with_namespace("prod")
            .with_object_name("web-7d9f-abcde.17a")
            .with_source("kubelet", "node-3")
            .with_event_type("Warning");

        assert_eq!(event.count, 7);
        assert_eq!(event.involved_object.kind, "Pod");
        assert_eq!(event.source.host, "node-3");
        assert_eq!(event.namespace, "prod");
        assert_eq!(event.event_type, "Warning");
    }

    #[test]
    fn serializes_camel_case() {
        let event = Event::new("uid-1", "Scheduled", Utc::now());
        let json = serde_json::to_value(&event).unwrap();

        assert!(json.get("lastSeen").is_some());
        assert!(json.get("involvedObject").is_some());
        assert!(json.get("objectName").is_some());
    }
}
