//! overwatch - Kubernetes event notifier
//!
//! Watches cluster events and forwards them to the configured channels.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use overwatch::{LogFormat, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();

    let level = if settings.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!(
            "overwatch={level},overwatch_core={level},overwatch_kube={level},overwatch_notify={level}"
        ))
    })?;

    match settings.log_format {
        LogFormat::Text => tracing_subscriber::registry().with(fmt::layer()).with(filter).init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
    }

    overwatch::run(settings).await
}
