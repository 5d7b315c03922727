//! Cluster connection settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConnectError, Result};

/// Directory holding the pod's service-account credentials.
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Default timeout for list and lookup requests. Watches are not bounded.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How to reach the Kubernetes API.
#[derive(Clone)]
pub struct ClusterConfig {
    /// API base URL without a trailing slash.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Extra root certificate (PEM) trusted for the API server.
    pub ca_pem: Option<Vec<u8>>,
    /// Timeout for non-watch requests.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("ca_pem", &self.ca_pem.as_ref().map(Vec::len))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ClusterConfig {
    /// Connects to an explicit host, e.g. a `kubectl proxy`.
    #[must_use]
    pub fn from_host(host: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            base_url: host.trim_end_matches('/').to_string(),
            token: None,
            ca_pem: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Loads the in-cluster configuration from the pod environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the service host variables are unset or the
    /// service-account files cannot be read.
    pub fn in_cluster() -> Result<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| ConnectError::MissingEnv("KUBERNETES_SERVICE_HOST"))?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT")
            .map_err(|_| ConnectError::MissingEnv("KUBERNETES_SERVICE_PORT"))?;
        Self::from_service_account(Path::new(SERVICE_ACCOUNT_DIR), &host, &port)
    }

    /// Builds an in-cluster configuration from a service-account directory
    /// and the API service address.
    ///
    /// # Errors
    ///
    /// Returns an error if `token` or `ca.crt` cannot be read from `dir`.
    pub fn from_service_account(dir: &Path, host: &str, port: &str) -> Result<Self> {
        let token = read(&dir.join("token"))?;
        let ca_pem = read(&dir.join("ca.crt"))?;

        let host = if host.contains(':') {
            format!("[{host}]")
        } else {
            host.to_string()
        };

        Ok(Self {
            base_url: format!("https://{host}:{port}"),
            token: Some(String::from_utf8_lossy(&token).trim().to_string()),
            ca_pem: Some(ca_pem),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the timeout for non-watch requests.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| ConnectError::ReadFile {
        path: PathBuf::from(path),
        source,
    })
}
