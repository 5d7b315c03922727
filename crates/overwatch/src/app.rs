//! Process assembly: builds the channels, dispatcher and watcher from a
//! validated [`Config`] and runs them next to the status server.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use overwatch_core::{Dispatcher, EventSource, MentionResolver, Watcher};
use overwatch_kube::{ClusterConfig, KubeClient};
use overwatch_notify::{DatadogNotifier, LogNotifier, SlackNotifier};

use crate::settings::{ClusterTarget, Config, Settings};
use crate::status::StatusServer;

/// Builds a dispatcher with every enabled channel.
#[must_use]
pub fn build_dispatcher(config: &Config) -> Dispatcher {
    let mut dispatcher = Dispatcher::new()
        .with_min_level(config.min_level)
        .with_delivery_timeout(config.delivery_timeout);

    if config.channels.log {
        dispatcher = dispatcher.with_channel(Arc::new(LogNotifier::default()));
    }
    if let Some(slack) = &config.channels.slack {
        dispatcher = dispatcher.with_channel(Arc::new(SlackNotifier::new(slack.clone())));
    }
    if let Some(datadog) = &config.channels.datadog {
        dispatcher = dispatcher.with_channel(Arc::new(DatadogNotifier::new(datadog.clone())));
    }

    dispatcher
}

/// Builds the watch loop over `source`.
#[must_use]
pub fn build_watcher(config: &Config, source: Arc<dyn EventSource>, dispatcher: Dispatcher) -> Watcher {
    let resolver = MentionResolver::new(
        source.clone(),
        config.watcher.namespace.clone(),
        config.mention_label.clone(),
        config.mention_default.clone(),
    );

    Watcher::new(config.watcher.clone(), source, dispatcher)
        .with_severity_table(config.severity.clone())
        .with_resolver(resolver)
}

/// Runs the watcher and the status server until the watcher stops.
///
/// Cancelling `shutdown` stops the watcher cleanly and then the server.
///
/// # Errors
///
/// Fails if the status address cannot be bound, if the watcher stops on a
/// fatal condition or if the server stops on its own.
pub async fn serve(config: Config, source: Arc<dyn EventSource>, shutdown: CancellationToken) -> anyhow::Result<()> {
    let server = StatusServer::bind(config.listen_addr).await?;
    let dispatcher = build_dispatcher(&config);
    info!(
        channels = ?dispatcher.channel_names(),
        min_level = %config.min_level,
        "notification channels ready"
    );
    let watcher = build_watcher(&config, source, dispatcher);

    let server_stop = CancellationToken::new();
    let status = server.serve_with_shutdown(server_stop.clone().cancelled_owned());
    tokio::pin!(status);

    tokio::select! {
        watched = watcher.run(shutdown) => {
            server_stop.cancel();
            (&mut status).await?;
            watched.context("watcher stopped")?;
            info!("shut down cleanly");
            Ok(())
        }
        served = &mut status => {
            served?;
            anyhow::bail!("status server stopped unexpectedly")
        }
    }
}

/// Validates `settings`, connects to the cluster and serves until Ctrl-C
/// or a fatal error.
///
/// # Errors
///
/// Returns configuration, connection and watcher failures.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let config = settings.validate()?;

    let cluster = match &config.cluster {
        ClusterTarget::InCluster => ClusterConfig::in_cluster().context("loading in-cluster configuration")?,
        ClusterTarget::Host(host) => ClusterConfig::from_host(host.as_str()),
    };
    let client = KubeClient::new(cluster)?;
    info!(
        api = %client.base_url(),
        namespace = %config.watcher.namespace,
        cluster = %config.watcher.cluster_name,
        "starting overwatch"
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    let ctrl_c = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received SIGINT, initiating shutdown");
                signal.cancel();
            }
            Err(e) => warn!(error = %e, "unable to listen for SIGINT"),
        }
    });

    let result = serve(config, Arc::new(client), shutdown).await;
    ctrl_c.abort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use overwatch_core::Level;

    fn config(args: &[&str]) -> Config {
        let mut argv = vec!["overwatch"];
        argv.extend_from_slice(args);
        Settings::try_parse_from(argv).unwrap().validate().unwrap()
    }

    #[test]
    fn log_only_by_default() {
        let dispatcher = build_dispatcher(&config(&[]));

        assert_eq!(dispatcher.channel_names(), vec!["log"]);
        assert_eq!(dispatcher.min_level(), Level::Debug);
    }

    #[test]
    fn every_enabled_channel_is_registered() {
        let dispatcher = build_dispatcher(&config(&[
            "--notification-level",
            "warn",
            "--notify-slack",
            "--slack-token",
            "t",
            "--slack-channel",
            "c",
            "--notify-datadog",
            "--datadog-api-key",
            "k",
            "--datadog-app-key",
            "a",
        ]));

        assert_eq!(dispatcher.channel_names(), vec!["log", "slack", "datadog"]);
        assert_eq!(dispatcher.min_level(), Level::Warn);
    }

    #[test]
    fn no_channels() {
        let dispatcher = build_dispatcher(&config(&["--notify-log", "false"]));
        assert!(dispatcher.channel_names().is_empty());
    }

    #[tokio::test]
    async fn run_rejects_invalid_settings() {
        let settings = Settings::try_parse_from(["overwatch", "--listen-address", "nowhere"]).unwrap();

        let err = run(settings).await.unwrap_err();

        assert_eq!(err.to_string(), "invalid listen address 'nowhere'");
    }
}
