//! Command-line and environment configuration.
//!
//! Every option can be given as a flag or as an `OVERWATCH_*` environment
//! variable. [`Settings::validate`] checks the raw values once at startup
//! and produces the immutable [`Config`] the rest of the process runs on.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use overwatch_core::{FailurePolicy, Level, SeverityTable, WatcherConfig};
use overwatch_notify::{DATADOG_API_URL, DatadogConfig, SLACK_API_URL, SlackConfig};

static LISTEN_ADDRESS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[^\s]+)?:\d+$").unwrap_or_else(|_| unreachable!()));

/// Configuration problems found at startup.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// One or more settings are invalid.
    #[error("{}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Raw settings as given on the command line or in the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "overwatch")]
#[command(version, about = "Watches Kubernetes events and forwards them to log, Slack and Datadog")]
pub struct Settings {
    /// Enable debug logging.
    #[arg(long, env = "OVERWATCH_DEBUG")]
    pub debug: bool,

    /// Log output format.
    #[arg(long, env = "OVERWATCH_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Address of the status HTTP server, e.g. `:8080` or `127.0.0.1:8080`.
    #[arg(long, env = "OVERWATCH_LISTEN_ADDRESS", default_value = ":8080")]
    pub listen_address: String,

    /// Namespace to watch. Empty watches all namespaces.
    #[arg(long, env = "OVERWATCH_NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Use the pod's service account to reach the API server.
    #[arg(long, env = "OVERWATCH_IN_CLUSTER")]
    pub in_cluster: bool,

    /// Cluster name shown in notifications.
    #[arg(long, env = "OVERWATCH_CLUSTER_NAME", default_value = "local")]
    pub cluster_name: String,

    /// API server address when not running in-cluster.
    #[arg(long, env = "OVERWATCH_CLUSTER_HOST", default_value = "http://127.0.0.1:8001")]
    pub cluster_host: String,

    /// Minimum level a notification needs to be delivered.
    #[arg(long, env = "OVERWATCH_NOTIFICATION_LEVEL", default_value = "DEBUG")]
    pub notification_level: String,

    /// Label on the involved object holding the mention. Empty disables lookups.
    #[arg(long, env = "OVERWATCH_MENTION_LABEL", default_value = "")]
    pub mention_label: String,

    /// Mention used when the label is missing.
    #[arg(long, env = "OVERWATCH_MENTION_DEFAULT", default_value = "here")]
    pub mention_default: String,

    /// Write notifications to the log.
    #[arg(long, env = "OVERWATCH_NOTIFY_LOG", action = ArgAction::Set, default_value_t = true)]
    pub notify_log: bool,

    /// Post notifications to Slack.
    #[arg(long, env = "OVERWATCH_NOTIFY_SLACK")]
    pub notify_slack: bool,

    /// Slack API token.
    #[arg(long, env = "OVERWATCH_NOTIFY_SLACK_TOKEN", hide_env_values = true)]
    pub slack_token: Option<String>,

    /// Slack channel to post to.
    #[arg(long, env = "OVERWATCH_NOTIFY_SLACK_CHANNEL")]
    pub slack_channel: Option<String>,

    /// Post to Slack as the token's user.
    #[arg(long, env = "OVERWATCH_NOTIFY_SLACK_AS_USER")]
    pub slack_as_user: bool,

    /// Slack API host.
    #[arg(long, env = "OVERWATCH_NOTIFY_SLACK_API_URL", default_value = SLACK_API_URL)]
    pub slack_api_url: String,

    /// Post notifications as Datadog events.
    #[arg(long, env = "OVERWATCH_NOTIFY_DATADOG")]
    pub notify_datadog: bool,

    /// Datadog API key.
    #[arg(long, env = "OVERWATCH_NOTIFY_DATADOG_API_KEY", hide_env_values = true)]
    pub datadog_api_key: Option<String>,

    /// Datadog application key.
    #[arg(long, env = "OVERWATCH_NOTIFY_DATADOG_APP_KEY", hide_env_values = true)]
    pub datadog_app_key: Option<String>,

    /// Datadog API host.
    #[arg(long, env = "OVERWATCH_NOTIFY_DATADOG_API_URL", default_value = DATADOG_API_URL)]
    pub datadog_api_url: String,

    /// Maximum deliveries running at once.
    #[arg(long, env = "OVERWATCH_MAX_IN_FLIGHT", default_value_t = 64)]
    pub max_in_flight: usize,

    /// Seconds before a channel delivery is abandoned.
    #[arg(long, env = "OVERWATCH_DELIVERY_TIMEOUT_SECS", default_value_t = 30)]
    pub delivery_timeout_secs: u64,

    /// What a failed delivery does: `exit` or `log`.
    #[arg(long, env = "OVERWATCH_ON_NOTIFY_FAILURE", default_value = "exit")]
    pub on_notify_failure: String,

    /// Reason levels to override, e.g. `BackOff=WARN,Killing=DEBUG`.
    #[arg(long, env = "OVERWATCH_SEVERITY_OVERRIDES")]
    pub severity_overrides: Option<String>,

    /// Also relist events on this interval, in seconds.
    #[arg(long, env = "OVERWATCH_RESYNC_INTERVAL_SECS")]
    pub resync_interval_secs: Option<u64>,
}

/// Where the Kubernetes API lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterTarget {
    /// Use the pod's service account.
    InCluster,
    /// Connect to an explicit host.
    Host(String),
}

/// Enabled notification channels.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    /// Log channel.
    pub log: bool,
    /// Slack channel, when enabled.
    pub slack: Option<SlackConfig>,
    /// Datadog channel, when enabled.
    pub datadog: Option<DatadogConfig>,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Status server address.
    pub listen_addr: SocketAddr,
    /// API server target.
    pub cluster: ClusterTarget,
    /// Watch loop settings.
    pub watcher: WatcherConfig,
    /// Dispatch threshold.
    pub min_level: Level,
    /// Mention label key.
    pub mention_label: String,
    /// Fallback mention.
    pub mention_default: String,
    /// Reason classification.
    pub severity: SeverityTable,
    /// Per-channel delivery timeout.
    pub delivery_timeout: Duration,
    /// Enabled channels.
    pub channels: ChannelSettings,
}

impl Settings {
    /// Checks every setting and builds the runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] listing every problem found.
    pub fn validate(&self) -> Result<Config, SettingsError> {
        let mut problems = Vec::new();

        let listen_addr = match parse_listen_address(&self.listen_address) {
            Ok(addr) => Some(addr),
            Err(problem) => {
                problems.push(problem);
                None
            }
        };

        let min_level = self
            .notification_level
            .parse::<Level>()
            .map_err(|_| problems.push(format!("invalid notification level '{}'", self.notification_level)))
            .ok();

        let failure_policy = self
            .on_notify_failure
            .parse::<FailurePolicy>()
            .map_err(|e| problems.push(e))
            .ok();

        let mut severity = SeverityTable::default();
        if let Some(overrides) = &self.severity_overrides {
            match parse_overrides(overrides) {
                Ok(entries) => severity.extend(entries),
                Err(mut errors) => problems.append(&mut errors),
            }
        }

        let slack = if self.notify_slack {
            let token = required(self.slack_token.as_deref(), "OVERWATCH_NOTIFY_SLACK_TOKEN", "slack", &mut problems);
            let channel = required(self.slack_channel.as_deref(), "OVERWATCH_NOTIFY_SLACK_CHANNEL", "slack", &mut problems);
            token.zip(channel).map(|(token, channel)| {
                SlackConfig::new(token, channel)
                    .with_as_user(self.slack_as_user)
                    .with_base_url(self.slack_api_url.as_str())
            })
        } else {
            None
        };

        let datadog = if self.notify_datadog {
            let api_key = required(self.datadog_api_key.as_deref(), "OVERWATCH_NOTIFY_DATADOG_API_KEY", "datadog", &mut problems);
            let app_key = required(self.datadog_app_key.as_deref(), "OVERWATCH_NOTIFY_DATADOG_APP_KEY", "datadog", &mut problems);
            api_key
                .zip(app_key)
                .map(|(api, app)| DatadogConfig::new(api, app).with_base_url(self.datadog_api_url.as_str()))
        } else {
            None
        };

        if self.max_in_flight == 0 {
            problems.push("max in-flight deliveries must be at least 1".to_string());
        }
        if self.delivery_timeout_secs == 0 {
            problems.push("delivery timeout must be at least 1 second".to_string());
        }
        if self.resync_interval_secs == Some(0) {
            problems.push("resync interval must be at least 1 second".to_string());
        }

        let (Some(listen_addr), Some(min_level), Some(failure_policy)) = (listen_addr, min_level, failure_policy)
        else {
            return Err(SettingsError::Invalid(problems));
        };
        if !problems.is_empty() {
            return Err(SettingsError::Invalid(problems));
        }

        let cluster = if self.in_cluster {
            ClusterTarget::InCluster
        } else {
            ClusterTarget::Host(self.cluster_host.clone())
        };

        let mut watcher = WatcherConfig::new(self.namespace.clone(), self.cluster_name.clone())
            .with_failure_policy(failure_policy)
            .with_max_in_flight(self.max_in_flight);
        if let Some(secs) = self.resync_interval_secs {
            watcher = watcher.with_resync_interval(Duration::from_secs(secs));
        }

        Ok(Config {
            listen_addr,
            cluster,
            watcher,
            min_level,
            mention_label: self.mention_label.clone(),
            mention_default: self.mention_default.clone(),
            severity,
            delivery_timeout: Duration::from_secs(self.delivery_timeout_secs),
            channels: ChannelSettings {
                log: self.notify_log,
                slack,
                datadog,
            },
        })
    }
}

fn required(value: Option<&str>, env: &str, channel: &str, problems: &mut Vec<String>) -> Option<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Some(v.to_string()),
        _ => {
            problems.push(format!("{channel} notifier requires {env}"));
            None
        }
    }
}

/// Parses a listen address such as `:8080`, `0.0.0.0:8080` or
/// `localhost:8080`. A missing host binds every interface.
///
/// # Errors
///
/// Returns a description of the problem if the address is malformed or
/// cannot be resolved.
pub fn parse_listen_address(input: &str) -> Result<SocketAddr, String> {
    if !LISTEN_ADDRESS_REGEX.is_match(input) {
        return Err(format!("invalid listen address '{input}'"));
    }

    let full = if input.starts_with(':') {
        format!("0.0.0.0{input}")
    } else {
        input.to_string()
    };

    full.to_socket_addrs()
        .map_err(|e| format!("unable to resolve listen address '{input}': {e}"))?
        .next()
        .ok_or_else(|| format!("listen address '{input}' resolved to nothing"))
}

/// Parses `Reason=LEVEL` pairs separated by commas.
///
/// # Errors
///
/// Returns one message per malformed entry.
pub fn parse_overrides(input: &str) -> Result<Vec<(String, Level)>, Vec<String>> {
    let mut entries = Vec::new();
    let mut errors = Vec::new();

    for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.split_once('=') {
            Some((reason, level)) if !reason.trim().is_empty() => match level.parse::<Level>() {
                Ok(level) => entries.push((reason.trim().to_string(), level)),
                Err(e) => errors.push(format!("invalid severity override '{entry}': {e}")),
            },
            _ => errors.push(format!("invalid severity override '{entry}'")),
        }
    }

    if errors.is_empty() { Ok(entries) } else { Err(errors) }
}
