//! Status server.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use super::error::{StatusError, StatusResult};
use super::routes::create_router;

/// Serves the status routes until shut down.
#[derive(Debug)]
pub struct StatusServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl StatusServer {
    /// Binds the listen address.
    ///
    /// # Errors
    ///
    /// Returns [`StatusError::BindFailed`] if the address cannot be bound.
    pub async fn bind(addr: SocketAddr) -> StatusResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| StatusError::BindFailed(addr, e))?;
        let addr = listener.local_addr().map_err(|e| StatusError::BindFailed(addr, e))?;
        Ok(Self { listener, addr })
    }

    /// The bound address. Differs from the requested one when port 0 was asked for.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns [`StatusError::Serve`] if the server stops with an I/O error.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> StatusResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(addr = %self.addr, "status server listening");

        axum::serve(self.listener, create_router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| StatusError::Serve(e.to_string()))?;

        info!("status server shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn serves_until_cancelled() {
        let server = StatusServer::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = server.local_addr();
        let token = CancellationToken::new();
        let handle = tokio::spawn(server.serve_with_shutdown(token.clone().cancelled_owned()));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /healthcheck HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with("Everything is peachy!"));

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let first = StatusServer::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let err = StatusServer::bind(first.local_addr()).await.unwrap_err();

        assert!(matches!(err, StatusError::BindFailed(addr, _) if addr == first.local_addr()));
    }
}
