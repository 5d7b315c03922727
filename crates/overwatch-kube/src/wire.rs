//! Kubernetes API wire types.
//!
//! Only the fields the watcher reads are modelled. Everything is optional on
//! the wire so that partially populated objects still decode.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use overwatch_core::{Event, EventOrigin, ObjectReference, SignalKind};

/// Standard object metadata.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    /// Object name.
    pub name: String,
    /// Object namespace.
    pub namespace: String,
    /// Unique id.
    pub uid: String,
    /// Labels.
    pub labels: HashMap<String, String>,
    /// Creation time.
    pub creation_timestamp: Option<DateTime<Utc>>,
}

/// The object an event refers to.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InvolvedObject {
    /// Object kind.
    pub kind: String,
    /// Object name.
    pub name: String,
}

/// The component that emitted an event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventSourceRef {
    /// Component name.
    pub component: String,
    /// Node name.
    pub host: String,
}

/// A `core/v1` Event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KubeEvent {
    /// Event metadata.
    pub metadata: ObjectMeta,
    /// The object the event is about.
    pub involved_object: InvolvedObject,
    /// Reason code.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
    /// `Normal` or `Warning`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Occurrence count.
    pub count: Option<u32>,
    /// First occurrence.
    pub first_timestamp: Option<DateTime<Utc>>,
    /// Most recent occurrence.
    pub last_timestamp: Option<DateTime<Utc>>,
    /// Occurrence time for events produced by the newer events API.
    pub event_time: Option<DateTime<Utc>>,
    /// Reporting component.
    pub source: EventSourceRef,
}

impl KubeEvent {
    /// Converts the wire object into an [`Event`] snapshot.
    ///
    /// `lastTimestamp` falls back to `eventTime` and then to the creation
    /// time. A missing count means one occurrence.
    #[must_use]
    pub fn into_event(self) -> Event {
        let last_seen = self
            .last_timestamp
            .or(self.event_time)
            .or(self.metadata.creation_timestamp)
            .unwrap_or_default();
        let first_seen = self
            .first_timestamp
            .or(self.event_time)
            .or(self.metadata.creation_timestamp)
            .unwrap_or(last_seen);
        let id = if self.metadata.uid.is_empty() {
            format!("{}/{}", self.metadata.namespace, self.metadata.name)
        } else {
            self.metadata.uid
        };

        Event {
            id,
            reason: self.reason,
            message: self.message,
            event_type: self.event_type,
            count: self.count.unwrap_or(1).max(1),
            first_seen,
            last_seen,
            involved_object: ObjectReference {
                kind: self.involved_object.kind,
                name: self.involved_object.name,
            },
            source: EventOrigin {
                component: self.source.component,
                host: self.source.host,
            },
            namespace: self.metadata.namespace,
            object_name: self.metadata.name,
        }
    }
}

/// A `core/v1` `EventList`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventList {
    /// The events.
    pub items: Vec<KubeEvent>,
}

/// Any object read only for its metadata.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetadataOnly {
    /// Object metadata.
    pub metadata: ObjectMeta,
}

/// One frame of a watch response.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchFrame {
    /// Change type.
    #[serde(rename = "type")]
    pub kind: SignalKind,
    /// The changed object, or a `Status` for error frames.
    #[serde(default)]
    pub object: serde_json::Value,
}

impl WatchFrame {
    /// The `Status` message carried by an error frame.
    #[must_use]
    pub fn status_message(&self) -> Option<&str> {
        self.object.get("message").and_then(serde_json::Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{
        "metadata": {
            "name": "web-1.17a2b3c4d5",
            "namespace": "default",
            "uid": "5f0c9b1e-0000-4000-8000-000000000001",
            "creationTimestamp": "2024-03-01T10:00:00Z"
        },
        "involvedObject": {"kind": "Pod", "name": "web-1", "namespace": "default"},
        "reason": "BackOff",
        "message": "Back-off restarting failed container",
        "type": "Warning",
        "count": 4,
        "firstTimestamp": "2024-03-01T10:00:00Z",
        "lastTimestamp": "2024-03-01T10:05:00Z",
        "source": {"component": "kubelet", "host": "node-a"}
    }"#;

    #[test]
    fn full_event_converts() {
        let wire: KubeEvent = serde_json::from_str(EVENT).unwrap();
        let event = wire.into_event();

        assert_eq!(event.id, "5f0c9b1e-0000-4000-8000-000000000001");
        assert_eq!(event.reason, "BackOff");
        assert_eq!(event.event_type, "Warning");
        assert_eq!(event.count, 4);
        assert_eq!(event.last_seen.to_rfc3339(), "2024-03-01T10:05:00+00:00");
        assert_eq!(event.first_seen.to_rfc3339(), "2024-03-01T10:00:00+00:00");
        assert_eq!(event.involved_object.kind, "Pod");
        assert_eq!(event.source.host, "node-a");
        assert_eq!(event.object_name, "web-1.17a2b3c4d5");
        assert_eq!(event.namespace, "default");
    }

    #[test]
    fn missing_uid_falls_back_to_namespace_and_name() {
        let first: KubeEvent = serde_json::from_str(
            r#"{"metadata": {"name": "web-1.aaa", "namespace": "default"}, "reason": "BackOff"}"#,
        )
        .unwrap();
        let second: KubeEvent = serde_json::from_str(
            r#"{"metadata": {"name": "web-2.bbb", "namespace": "default"}, "reason": "BackOff"}"#,
        )
        .unwrap();

        assert_eq!(first.into_event().id, "default/web-1.aaa");
        assert_eq!(second.into_event().id, "default/web-2.bbb");
    }

    #[test]
    fn missing_count_is_one() {
        let wire: KubeEvent = serde_json::from_str(
            r#"{"metadata": {"uid": "u"}, "reason": "Scheduled", "count": null,
                "lastTimestamp": "2024-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(wire.into_event().count, 1);
    }

    #[test]
    fn last_seen_falls_back_to_event_time() {
        let wire: KubeEvent = serde_json::from_str(
            r#"{"metadata": {"uid": "u", "creationTimestamp": "2024-03-01T09:00:00Z"},
                "lastTimestamp": null,
                "eventTime": "2024-03-01T10:00:00.123456Z"}"#,
        )
        .unwrap();
        let event = wire.into_event();
        assert_eq!(event.last_seen.timestamp(), 1_709_287_200);
    }

    #[test]
    fn last_seen_falls_back_to_creation() {
        let wire: KubeEvent = serde_json::from_str(
            r#"{"metadata": {"uid": "u", "creationTimestamp": "2024-03-01T09:00:00Z"}}"#,
        )
        .unwrap();
        let event = wire.into_event();
        assert_eq!(event.last_seen.to_rfc3339(), "2024-03-01T09:00:00+00:00");
        assert_eq!(event.first_seen, event.last_seen);
    }

    #[test]
    fn list_decodes() {
        let list: EventList = serde_json::from_str(&format!(
            r#"{{"kind": "EventList", "apiVersion": "v1", "metadata": {{}}, "items": [{EVENT}]}}"#
        ))
        .unwrap();
        assert_eq!(list.items.len(), 1);
    }

    #[test]
    fn watch_frame_decodes() {
        let frame: WatchFrame =
            serde_json::from_str(&format!(r#"{{"type": "MODIFIED", "object": {EVENT}}}"#)).unwrap();
        assert_eq!(frame.kind, SignalKind::Modified);
    }

    #[test]
    fn error_frame_message() {
        let frame: WatchFrame = serde_json::from_str(
            r#"{"type": "ERROR", "object": {"kind": "Status", "message": "too old resource version", "code": 410}}"#,
        )
        .unwrap();
        assert_eq!(frame.kind, SignalKind::Error);
        assert_eq!(frame.status_message(), Some("too old resource version"));
    }

    #[test]
    fn labels_decode() {
        let meta: MetadataOnly = serde_json::from_str(
            r#"{"metadata": {"name": "api", "labels": {"team": "core"}}, "spec": {}}"#,
        )
        .unwrap();
        assert_eq!(meta.metadata.labels.get("team").map(String::as_str), Some("core"));
    }
}
