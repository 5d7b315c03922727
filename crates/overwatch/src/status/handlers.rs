//! Request handlers.

/// Body returned by the health check.
pub const HEALTHY_BODY: &str = "Everything is peachy!";

/// Text served at `/`.
pub const USAGE: &str = "\
overwatch watches Kubernetes events and forwards them to log, Slack and Datadog.

Routes:
  GET /             this text
  GET /version      the running version
  GET /healthcheck  200 while the process is up

Configure with flags or OVERWATCH_* environment variables; run with --help for the full list.
";

/// The version string served at `/version`.
#[must_use]
pub fn version_line() -> String {
    format!("overwatch: {}", env!("CARGO_PKG_VERSION"))
}

/// Handle GET / - usage text.
pub async fn home() -> &'static str {
    USAGE
}

/// Handle GET /version.
pub async fn version() -> String {
    version_line()
}

/// Handle GET /healthcheck.
pub async fn healthcheck() -> &'static str {
    HEALTHY_BODY
}
