//! TLS transport connector handed to the gRPC channel

use super::tls::{server_name, TlsConfig};
use futures::future::BoxFuture;
use http::Uri;
use hyper_util::rt::TokioIo;
use std::io;
use std::task::{Context, Poll};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// Default port when the target URI carries none
const DEFAULT_TLS_PORT: u16 = 443;

/// Dials TCP and performs the rustls handshake for every (re)connect of a channel.
#[derive(Clone)]
pub struct TlsConnector {
    connector: tokio_rustls::TlsConnector,
    tcp_nodelay: bool,
}

impl TlsConnector {
    /// Create a connector from a TLS configuration
    pub fn new(tls: &TlsConfig) -> Self {
        Self {
            connector: tokio_rustls::TlsConnector::from(tls.client_config()),
            tcp_nodelay: true,
        }
    }

    /// Set TCP_NODELAY on dialed sockets (default: enabled)
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    async fn connect(self, uri: Uri) -> io::Result<TokioIo<TlsStream<TcpStream>>> {
        let host = uri
            .host()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target URI has no host"))?;
        let port = uri.port_u16().unwrap_or(DEFAULT_TLS_PORT);
        let name = server_name(host)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

        // IPv6 literals arrive bracketed from the URI
        let dial_host = host.trim_start_matches('[').trim_end_matches(']');
        let tcp_stream = TcpStream::connect((dial_host, port)).await?;
        tcp_stream.set_nodelay(self.tcp_nodelay)?;

        let tls_stream = self.connector.connect(name, tcp_stream).await.map_err(|e| {
            tracing::debug!(host = %host, port, error = %e, "TLS handshake failed");
            e
        })?;

        tracing::debug!(host = %host, port, "TLS transport established");
        Ok(TokioIo::new(tls_stream))
    }
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector")
            .field("tcp_nodelay", &self.tcp_nodelay)
            .finish_non_exhaustive()
    }
}

impl tower::Service<Uri> for TlsConnector {
    type Response = TokioIo<TlsStream<TcpStream>>;
    type Error = io::Error;
    type Future = BoxFuture<'static, io::Result<Self::Response>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        Box::pin(self.clone().connect(uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::Service;

    fn connector() -> TlsConnector {
        TlsConnector::new(&TlsConfig::builder().build().unwrap())
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let uri: Uri = format!("https://127.0.0.1:{}", addr.port()).parse().unwrap();
        let result = connector().call(uri).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_handshake_failure_is_io_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and hang up without speaking TLS
            if let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let uri: Uri = format!("https://127.0.0.1:{}", addr.port()).parse().unwrap();
        let result = connector().call(uri).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_uri_without_host_rejected() {
        let uri = Uri::from_static("/relative/path");
        let err = connector().call(uri).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_tcp_nodelay_toggle() {
        let c = connector().tcp_nodelay(false);
        assert!(!c.tcp_nodelay);
        assert!(format!("{:?}", c).contains("tcp_nodelay: false"));
    }
}
