//! Datadog channel using the v1 events API.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use overwatch_core::{BoxFuture, Level, Notification, Notifier, NotifyError};

use crate::format::{headline, rfc1123, service_name};

/// Default Datadog API host.
pub const DATADOG_API_URL: &str = "https://api.datadoghq.com";

/// Source type attached to every event.
pub const SOURCE_TYPE: &str = "kubernetes";

/// Datadog channel settings.
#[derive(Clone)]
pub struct DatadogConfig {
    /// API key.
    pub api_key: String,
    /// Application key.
    pub app_key: String,
    /// API host, overridable for other sites and testing.
    pub base_url: String,
}

impl fmt::Debug for DatadogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatadogConfig")
            .field("api_key", &"<redacted>")
            .field("app_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl DatadogConfig {
    /// Creates settings from an API and application key pair.
    #[must_use]
    pub fn new(api_key: impl Into<String>, app_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            app_key: app_key.into(),
            base_url: DATADOG_API_URL.to_string(),
        }
    }

    /// Overrides the API host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// A Datadog event request body.
#[derive(Debug, Clone, Serialize)]
pub struct DatadogEvent {
    /// Event title.
    pub title: String,
    /// Markdown body.
    pub text: String,
    /// `low` or `normal`.
    pub priority: &'static str,
    /// `info`, `warning` or `error`.
    pub alert_type: &'static str,
    /// Integration source.
    pub source_type_name: &'static str,
    /// `key:value` tags.
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct MessageDetails<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    cluster: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    reason: &'a str,
    #[serde(rename = "type", skip_serializing_if = "str::is_empty")]
    event_type: &'a str,
    level: &'a str,
}

#[derive(Debug, Serialize)]
struct EventDetails<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    node: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    namespace: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    component: &'a str,
    count: String,
    first_occurrence: String,
    last_occurrence: String,
}

#[derive(Debug, Serialize)]
struct InvolvedObject<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    kind: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    name: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventResponse {
    status: Option<String>,
    event: Option<PostedEvent>,
    errors: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostedEvent {
    id: Option<u64>,
}

/// Alert type for a level.
#[must_use]
pub const fn alert_type_for(level: Level) -> &'static str {
    match level {
        Level::Debug | Level::Info => "info",
        Level::Warn => "warning",
        Level::Error => "error",
    }
}

/// Priority for a level.
#[must_use]
pub const fn priority_for(level: Level) -> &'static str {
    match level {
        Level::Debug | Level::Info => "low",
        Level::Warn | Level::Error => "normal",
    }
}

/// Posts notifications as Datadog events.
#[derive(Debug, Clone)]
pub struct DatadogNotifier {
    http: reqwest::Client,
    config: DatadogConfig,
}

impl DatadogNotifier {
    /// Creates a Datadog channel.
    #[must_use]
    pub fn new(config: DatadogConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Builds the event body for a notification.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Encode`] if the detail blocks cannot be
    /// serialized.
    pub fn event(&self, notification: &Notification) -> Result<DatadogEvent, NotifyError> {
        let event = &notification.event;
        let object = &event.involved_object;
        let service = service_name(&object.kind, &event.object_name);
        let mention = notification.mention.as_str();

        let mut title = headline(&event.reason, &service, &notification.cluster);
        if let Some(mention) = notification.mention() {
            title = format!("Alerting [{mention}] concerning {title}");
        }

        let tags = vec![
            format!("team:{mention}"),
            format!("cluster:{}", notification.cluster),
            format!("type:{}", event.event_type),
            format!("level:{}", notification.level),
            format!("reason:{}", event.reason),
            format!("node:{}", event.source.host),
            format!("name:{}", event.object_name),
            format!("namespace:{}", event.namespace),
            format!("component:{}", event.source.component),
            format!("count:{}", event.count),
            format!("object-kind:{}", object.kind),
            format!("object-name:{}", object.name),
            format!("mentioned:{mention}"),
            format!("service:{service}"),
        ];

        let message = to_json(&MessageDetails {
            cluster: &notification.cluster,
            reason: &event.reason,
            event_type: &event.event_type,
            level: notification.level.as_str(),
        })?;
        let details = to_json(&EventDetails {
            node: &event.source.host,
            namespace: &event.namespace,
            component: &event.source.component,
            count: event.count.to_string(),
            first_occurrence: rfc1123(&event.first_seen),
            last_occurrence: rfc1123(&event.last_seen),
        })?;
        let involved = to_json(&InvolvedObject {
            kind: &object.kind,
            name: &object.name,
        })?;

        let text = format!(
            "%%% \n#### Message Details\n\t{message}\n#### Event Details\n\t{details}\n#### Involved Object\n\t{involved}\n\n %%%"
        );

        Ok(DatadogEvent {
            title,
            text,
            priority: priority_for(notification.level),
            alert_type: alert_type_for(notification.level),
            source_type_name: SOURCE_TYPE,
            tags,
        })
    }

    async fn post(&self, notification: &Notification) -> Result<(), NotifyError> {
        let body = self.event(notification)?;
        let url = format!("{}/api/v1/events", self.config.base_url);

        let response = self
            .http
            .post(&url)
            .header("DD-API-KEY", &self.config.api_key)
            .header("DD-APPLICATION-KEY", &self.config.app_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        let reply: EventResponse = response.json().await.unwrap_or_default();
        if !status.is_success() {
            let detail = if reply.errors.is_empty() {
                format!("HTTP {status}")
            } else {
                format!("HTTP {status}: {}", reply.errors.join(", "))
            };
            return Err(NotifyError::Rejected(detail));
        }

        info!(
            reason = %notification.event.reason,
            event_id = reply.event.and_then(|e| e.id).unwrap_or_default(),
            status = reply.status.as_deref().unwrap_or_default(),
            title = %body.title,
            "posted to datadog"
        );
        Ok(())
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, NotifyError> {
    serde_json::to_string(value).map_err(|e| NotifyError::Encode(e.to_string()))
}

impl Notifier for DatadogNotifier {
    fn name(&self) -> &str {
        "datadog"
    }

    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(self.post(notification))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::{TimeZone, Utc};
    use overwatch_core::Event;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    type Captured = Arc<Mutex<Vec<(HeaderMap, Value)>>>;

    fn notification(level: Level, mention: &str) -> Notification {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap();
        let event = Event::new("uid", "BackOff", at)
            .with_message("Back-off restarting failed container")
            .with_count(2)
            .with_event_type("Warning")
            .with_involved_object("Pod", "checkout-api-5d8f7c9b6-x2k4q")
            .with_namespace("default")
            .with_object_name("checkout-api-5d8f7c9b6-x2k4q")
            .with_source("kubelet", "node-a");
        Notification::new("prod", event, level, mention)
    }

    fn datadog() -> DatadogNotifier {
        DatadogNotifier::new(DatadogConfig::new("api", "app"))
    }

    async fn spawn_datadog(status: StatusCode, reply: Value) -> (SocketAddr, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route(
                "/api/v1/events",
                post(
                    |State((captured, status, reply)): State<(Captured, StatusCode, Value)>,
                     headers: HeaderMap,
                     Json(body): Json<Value>| async move {
                        captured.lock().push((headers, body));
                        (status, Json(reply))
                    },
                ),
            )
            .with_state((captured.clone(), status, reply));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, captured)
    }

    mod payload {
        use super::*;
        use test_case::test_case;

        #[test]
        fn title_uses_service_name() {
            let event = datadog().event(&notification(Level::Error, "")).unwrap();
            assert_eq!(event.title, "`BackOff` event for `checkout-api` on `prod`");
        }

        #[test]
        fn title_with_mention() {
            let event = datadog().event(&notification(Level::Error, "payments")).unwrap();
            assert_eq!(
                event.title,
                "Alerting [payments] concerning `BackOff` event for `checkout-api` on `prod`"
            );
        }

        #[test]
        fn tags_cover_event_fields() {
            let event = datadog().event(&notification(Level::Warn, "payments")).unwrap();

            assert_eq!(event.tags.len(), 14);
            for tag in [
                "team:payments",
                "cluster:prod",
                "type:Warning",
                "level:WARN",
                "node:node-a",
                "count:2",
                "object-kind:Pod",
                "mentioned:payments",
                "service:checkout-api",
            ] {
                assert!(event.tags.iter().any(|t| t == tag), "missing {tag}");
            }
        }

        #[test]
        fn text_is_markdown_with_json_blocks() {
            let event = datadog().event(&notification(Level::Error, "")).unwrap();

            assert!(event.text.starts_with("%%% \n#### Message Details\n\t{"));
            assert!(event.text.ends_with("\n %%%"));
            assert!(event.text.contains(r#""cluster":"prod""#));
            assert!(event.text.contains(r#""first_occurrence":"Fri, 01 Mar 2024 10:05:00 UTC""#));
            assert!(event.text.contains(r#"{"kind":"Pod","name":"checkout-api-5d8f7c9b6-x2k4q"}"#));
            assert_eq!(event.source_type_name, "kubernetes");
        }

        #[test_case(Level::Debug, "info", "low")]
        #[test_case(Level::Info, "info", "low")]
        #[test_case(Level::Warn, "warning", "normal")]
        #[test_case(Level::Error, "error", "normal")]
        fn alert_type_and_priority(level: Level, alert_type: &str, priority: &str) {
            let event = datadog().event(&notification(level, "")).unwrap();
            assert_eq!(event.alert_type, alert_type);
            assert_eq!(event.priority, priority);
        }

        #[test]
        fn debug_redacts_keys() {
            let debug = format!("{:?}", DatadogConfig::new("api-secret", "app-secret"));
            assert!(!debug.contains("api-secret"));
            assert!(!debug.contains("app-secret"));
        }
    }

    mod delivery {
        use super::*;

        #[tokio::test]
        async fn posts_with_key_headers() {
            let (addr, captured) =
                spawn_datadog(StatusCode::ACCEPTED, json!({"status": "ok", "event": {"id": 42}})).await;
            let notifier = DatadogNotifier::new(
                DatadogConfig::new("api-key", "app-key").with_base_url(format!("http://{addr}")),
            );

            notifier.send(&notification(Level::Error, "here")).await.unwrap();

            let captured = captured.lock();
            let (headers, body) = &captured[0];
            assert_eq!(headers["dd-api-key"], "api-key");
            assert_eq!(headers["dd-application-key"], "app-key");
            assert_eq!(body["alert_type"], "error");
            assert_eq!(body["source_type_name"], "kubernetes");
        }

        #[tokio::test]
        async fn forbidden_is_rejected() {
            let (addr, _captured) =
                spawn_datadog(StatusCode::FORBIDDEN, json!({"errors": ["Forbidden"]})).await;
            let notifier = DatadogNotifier::new(
                DatadogConfig::new("bad", "bad").with_base_url(format!("http://{addr}")),
            );

            let err = notifier.send(&notification(Level::Error, "")).await.unwrap_err();

            assert_eq!(err.to_string(), "rejected by channel: HTTP 403 Forbidden: Forbidden");
        }
    }
}
