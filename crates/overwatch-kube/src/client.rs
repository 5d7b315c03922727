//! The Kubernetes API client.

use std::fmt;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use overwatch_core::{
    BoxFuture, Event, EventSource, ResourceKind, ResourceMeta, SignalKind, SignalStream,
    SourceError, WatchSignal,
};

use crate::config::ClusterConfig;
use crate::error::{ConnectError, Result};
use crate::wire::{EventList, KubeEvent, MetadataOnly, WatchFrame};

/// Path of the event collection for `namespace`, or for the whole cluster
/// when `namespace` is empty.
#[must_use]
pub fn events_path(namespace: &str) -> String {
    if namespace.is_empty() {
        "/api/v1/events".to_string()
    } else {
        format!("/api/v1/namespaces/{namespace}/events")
    }
}

/// Path of a single resource.
#[must_use]
pub fn resource_path(kind: ResourceKind, namespace: &str, name: &str) -> String {
    let (prefix, plural) = match kind {
        ResourceKind::Pod => ("/api/v1", "pods"),
        ResourceKind::Service => ("/api/v1", "services"),
        ResourceKind::Node => ("/api/v1", "nodes"),
        ResourceKind::Deployment => ("/apis/apps/v1", "deployments"),
        ResourceKind::ReplicaSet => ("/apis/apps/v1", "replicasets"),
        ResourceKind::DaemonSet => ("/apis/apps/v1", "daemonsets"),
        ResourceKind::Job => ("/apis/batch/v1", "jobs"),
    };

    if kind.is_namespaced() && !namespace.is_empty() {
        format!("{prefix}/namespaces/{namespace}/{plural}/{name}")
    } else {
        format!("{prefix}/{plural}/{name}")
    }
}

/// Longest watch frame accepted before the stream fails. Kubernetes caps
/// stored objects well below this.
pub const DEFAULT_MAX_WATCH_FRAME: usize = 4 * 1024 * 1024;

/// An [`EventSource`] backed by the Kubernetes REST API.
#[derive(Clone)]
pub struct KubeClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    request_timeout: Duration,
    max_watch_frame: usize,
}

impl fmt::Debug for KubeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .field("request_timeout", &self.request_timeout)
            .field("max_watch_frame", &self.max_watch_frame)
            .finish_non_exhaustive()
    }
}

impl KubeClient {
    /// Creates a client for the given cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the CA bundle is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: ClusterConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(pem) = &config.ca_pem {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| ConnectError::Certificate(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder
            .build()
            .map_err(|e| ConnectError::Client(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url,
            token: config.token,
            request_timeout: config.request_timeout,
            max_watch_frame: DEFAULT_MAX_WATCH_FRAME,
        })
    }

    /// Sets the longest watch frame accepted, in bytes.
    #[must_use]
    pub const fn with_max_watch_frame(mut self, bytes: usize) -> Self {
        self.max_watch_frame = bytes;
        self
    }

    /// The API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.http.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> std::result::Result<reqwest::Response, SourceError> {
        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            })
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> std::result::Result<T, SourceError> {
        let url = format!("{}{path}", self.base_url);
        let request = self.get(&url).timeout(self.request_timeout);
        let response = self.send(request, &url).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))
    }

    /// Lists the events in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body does not decode.
    pub async fn list_events(&self, namespace: &str) -> std::result::Result<Vec<Event>, SourceError> {
        let list: EventList = self.fetch(&events_path(namespace)).await?;
        debug!(namespace = %namespace, count = list.items.len(), "listed events");
        Ok(list.items.into_iter().map(KubeEvent::into_event).collect())
    }

    /// Opens a watch on the events in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch request is refused.
    pub async fn watch_events(&self, namespace: &str) -> std::result::Result<SignalStream, SourceError> {
        let url = format!("{}{}", self.base_url, events_path(namespace));
        let request = self
            .get(&url)
            .query(&[("watch", "true"), ("resourceVersion", "0")]);
        let response = self.send(request, &url).await?;

        let body = response.bytes_stream().map_err(std::io::Error::other);
        let codec = LinesCodec::new_with_max_length(self.max_watch_frame);
        let lines = FramedRead::new(StreamReader::new(body), codec);

        let signals = lines.filter_map(|line| async move {
            match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some(parse_frame(&line)),
                Err(e) => Some(Err(SourceError::Transport(e.to_string()))),
            }
        });

        Ok(Box::pin(signals))
    }

    /// Fetches the metadata of one resource.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NotFound`] when the API answers 404.
    pub async fn resource_meta(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> std::result::Result<ResourceMeta, SourceError> {
        let object: MetadataOnly = match self.fetch(&resource_path(kind, namespace, name)).await {
            Ok(object) => object,
            Err(SourceError::Status { status: 404, .. }) => {
                return Err(SourceError::NotFound {
                    kind: kind.to_string(),
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        Ok(ResourceMeta {
            name: object.metadata.name,
            labels: object.metadata.labels,
        })
    }
}

fn parse_frame(line: &str) -> std::result::Result<WatchSignal, SourceError> {
    let frame: WatchFrame =
        serde_json::from_str(line).map_err(|e| SourceError::Decode(e.to_string()))?;
    if frame.kind == SignalKind::Error {
        warn!(
            status = frame.status_message().unwrap_or_default(),
            "watch reported an error"
        );
    }
    Ok(WatchSignal::new(frame.kind))
}

impl EventSource for KubeClient {
    fn watch<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, std::result::Result<SignalStream, SourceError>> {
        Box::pin(self.watch_events(namespace))
    }

    fn list<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, std::result::Result<Vec<Event>, SourceError>> {
        Box::pin(self.list_events(namespace))
    }

    fn get_resource<'a>(
        &'a self,
        kind: ResourceKind,
        namespace: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, std::result::Result<ResourceMeta, SourceError>> {
        Box::pin(self.resource_meta(kind, namespace, name))
    }
}
