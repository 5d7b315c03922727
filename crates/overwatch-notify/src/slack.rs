//! Slack channel using `chat.postMessage`.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use overwatch_core::{BoxFuture, Level, Notification, Notifier, NotifyError};

use crate::format::{headline, rfc1123};

/// Default Slack Web API host.
pub const SLACK_API_URL: &str = "https://slack.com";

/// Slack channel settings.
#[derive(Clone)]
pub struct SlackConfig {
    /// Bot or user token.
    pub token: String,
    /// Channel name or id to post to.
    pub channel: String,
    /// Post as the token's user rather than as a bot.
    pub as_user: bool,
    /// Display name for bot posts.
    pub username: String,
    /// API host, overridable for testing.
    pub base_url: String,
}

impl fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackConfig")
            .field("token", &"<redacted>")
            .field("channel", &self.channel)
            .field("as_user", &self.as_user)
            .field("username", &self.username)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl SlackConfig {
    /// Creates settings for posting to `channel`.
    #[must_use]
    pub fn new(token: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            channel: channel.into(),
            as_user: false,
            username: "overwatch".to_string(),
            base_url: SLACK_API_URL.to_string(),
        }
    }

    /// Sets whether to post as the token's user.
    #[must_use]
    pub const fn with_as_user(mut self, as_user: bool) -> Self {
        self.as_user = as_user;
        self
    }

    /// Overrides the API host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// A `chat.postMessage` request body.
#[derive(Debug, Clone, Serialize)]
pub struct PostMessage {
    /// Target channel.
    pub channel: String,
    /// Message text.
    pub text: String,
    /// Display name.
    pub username: String,
    /// Post as the authed user.
    pub as_user: bool,
    /// Turn `@name` into mentions.
    pub link_names: bool,
    /// Attachments.
    pub attachments: Vec<Attachment>,
}

/// A message attachment.
#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    /// Plain-text summary for clients that cannot render attachments.
    pub fallback: String,
    /// Attachment heading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Side bar colour.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Key/value fields.
    pub fields: Vec<Field>,
}

/// One attachment field.
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    /// Field label.
    pub title: String,
    /// Field value.
    pub value: String,
    /// Render side by side with other short fields.
    pub short: bool,
}

impl Field {
    fn long(title: &str, value: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            value: value.into(),
            short: false,
        }
    }

    fn short(title: &str, value: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            value: value.into(),
            short: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Attachment colour for a level.
#[must_use]
pub const fn color_for(level: Level) -> Option<&'static str> {
    match level {
        Level::Debug => None,
        Level::Info => Some("good"),
        Level::Warn => Some("warning"),
        Level::Error => Some("danger"),
    }
}

/// Posts notifications to a Slack channel.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    http: reqwest::Client,
    config: SlackConfig,
}

impl SlackNotifier {
    /// Creates a Slack channel.
    #[must_use]
    pub fn new(config: SlackConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Builds the request body for a notification.
    #[must_use]
    pub fn message(&self, notification: &Notification) -> PostMessage {
        let event = &notification.event;

        let mut text = headline(&event.reason, &event.object_name, &notification.cluster);
        if let Some(mention) = notification.mention() {
            text = format!("Alerting @{mention} concerning {text}");
        }

        let summary = Attachment {
            fallback: event.message.clone(),
            title: None,
            color: color_for(notification.level).map(str::to_string),
            fields: vec![
                Field::long("Message", event.message.as_str()),
                Field::short("Cluster", notification.cluster.as_str()),
                Field::short("Reason", event.reason.as_str()),
                Field::short("Type", event.event_type.as_str()),
                Field::short("Level", notification.level.as_str()),
            ],
        };

        let details = Attachment {
            fallback: event.message.clone(),
            title: Some("Details".to_string()),
            color: None,
            fields: vec![
                Field::long("Name", event.object_name.as_str()),
                Field::short("Node", event.source.host.as_str()),
                Field::short("Namespace", event.namespace.as_str()),
                Field::short("Component", event.source.component.as_str()),
                Field::short("Count", event.count.to_string()),
                Field::short("First Occurrence", rfc1123(&event.first_seen)),
                Field::short("Latest Occurrence", rfc1123(&event.last_seen)),
            ],
        };

        let object = &event.involved_object;
        let involved = Attachment {
            fallback: format!("{} {}", object.kind, object.name),
            title: Some("Involved Object".to_string()),
            color: None,
            fields: vec![
                Field::short("Kind", object.kind.as_str()),
                Field::short("Name", object.name.as_str()),
            ],
        };

        PostMessage {
            channel: self.config.channel.clone(),
            text,
            username: self.config.username.clone(),
            as_user: self.config.as_user,
            link_names: true,
            attachments: vec![summary, details, involved],
        }
    }

    async fn post(&self, notification: &Notification) -> Result<(), NotifyError> {
        let url = format!("{}/api/chat.postMessage", self.config.base_url);
        let body = self.message(notification);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(format!("HTTP {status}")));
        }

        let reply: PostMessageResponse = response
            .json()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        if !reply.ok {
            return Err(NotifyError::Rejected(
                reply.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        info!(
            reason = %notification.event.reason,
            channel = reply.channel.as_deref().unwrap_or_default(),
            ts = reply.ts.as_deref().unwrap_or_default(),
            "posted to slack"
        );
        Ok(())
    }
}

impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        "slack"
    }

    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(self.post(notification))
    }
}
