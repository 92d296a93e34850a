//! Core connection type

use super::tls::TlsConfig;
use super::transport::TlsConnector;
use crate::client::{CredentialInterceptor, ResolvedOptions};
use crate::metrics::{counters, histograms, labels};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::{Channel, Endpoint};
use tracing::Instrument;

/// Channel with per-call credential injection applied
pub type AuthenticatedChannel = InterceptedService<Channel, CredentialInterceptor>;

/// The single multiplexed transport shared by every domain stub.
///
/// Cloning is cheap: clones refer to the same underlying HTTP/2 connection.
#[derive(Clone)]
pub struct Connection {
    target: Arc<str>,
    user_agent: Arc<str>,
    tls: TlsConfig,
    authenticated: bool,
    channel: AuthenticatedChannel,
}

impl Connection {
    /// Open a connection without waiting for the handshake.
    ///
    /// The transport is dialed on the first call. Must be invoked from within a
    /// tokio runtime, since the channel spawns its request buffer task.
    pub(crate) fn open_lazy(resolved: &ResolvedOptions) -> Result<Self> {
        let (endpoint, connector) = build_endpoint(resolved)?;
        let channel = endpoint.connect_with_connector_lazy(connector);

        counters::connection_opened(labels::MODE_LAZY);
        tracing::info!(endpoint = %resolved.target(), "gRPC channel created (lazy)");

        Ok(Self::from_channel(resolved, channel))
    }

    /// Open a connection and wait until the transport is established.
    pub(crate) async fn open(resolved: &ResolvedOptions) -> Result<Self> {
        let target = resolved.target().to_string();
        async {
            let (endpoint, connector) = build_endpoint(resolved)?;
            let started = Instant::now();

            let channel = endpoint
                .connect_with_connector(connector)
                .await
                .map_err(|source| Error::Connection {
                    target: resolved.target().to_string(),
                    source,
                })?;

            histograms::connect_duration(started.elapsed());
            counters::connection_opened(labels::MODE_EAGER);
            tracing::info!("gRPC connection established");

            Ok::<_, Error>(Self::from_channel(resolved, channel))
        }
        .instrument(tracing::info_span!("connect", endpoint = %target))
        .await
        .map_err(|e: Error| {
            counters::connection_failed(e.category());
            tracing::warn!(endpoint = %target, error = %e, "connection failed");
            e
        })
    }

    fn from_channel(resolved: &ResolvedOptions, channel: Channel) -> Self {
        let interceptor = CredentialInterceptor::new(resolved.auth().cloned());
        Self {
            target: Arc::from(resolved.target()),
            user_agent: Arc::from(resolved.user_agent()),
            tls: resolved.tls().clone(),
            authenticated: interceptor.is_authenticated(),
            channel: InterceptedService::new(channel, interceptor),
        }
    }

    /// Target address (`host:port`) this connection was opened against
    pub fn target(&self) -> &str {
        &self.target
    }

    /// User agent sent with every call
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// TLS policy of the transport
    pub fn tls(&self) -> &TlsConfig {
        &self.tls
    }

    /// Whether a credential provider is attached
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Handle to the authenticated channel
    pub fn channel(&self) -> AuthenticatedChannel {
        self.channel.clone()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("target", &self.target)
            .field("user_agent", &self.user_agent)
            .field("tls", &self.tls)
            .field("authenticated", &self.authenticated)
            .finish_non_exhaustive()
    }
}

/// Assemble the tonic endpoint and TLS connector from resolved options
fn build_endpoint(resolved: &ResolvedOptions) -> Result<(Endpoint, TlsConnector)> {
    let uri = resolved.target_uri()?;

    let mut endpoint = Endpoint::from_shared(uri).map_err(|source| Error::Connection {
        target: resolved.target().to_string(),
        source,
    })?;
    endpoint = endpoint
        .user_agent(resolved.user_agent().to_string())
        .map_err(|e| Error::Config(format!("invalid user agent: {}", e)))?;

    let mut connector = TlsConnector::new(resolved.tls());
    for option in resolved.transport_options() {
        (endpoint, connector) = option.apply(endpoint, connector);
    }

    Ok((endpoint, connector))
}

#[cfg(test)]
mod tests {
    use crate::client::{BearerToken, ClientConfig};
    use crate::connection::TlsVersion;

    #[tokio::test]
    async fn test_open_lazy_carries_resolved_state() {
        let resolved = ClientConfig::builder()
            .endpoint("test.local:443")
            .version("9.9.9")
            .auth(BearerToken::new("token"))
            .build()
            .resolve()
            .unwrap();

        let conn = super::Connection::open_lazy(&resolved).unwrap();
        assert_eq!(conn.target(), "test.local:443");
        assert!(conn.user_agent().contains("9.9.9"));
        assert!(conn.is_authenticated());
        assert_eq!(conn.tls().min_version(), TlsVersion::Tls12);
    }

    #[tokio::test]
    async fn test_open_unreachable_fails_with_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let resolved = ClientConfig::builder()
            .endpoint(format!("127.0.0.1:{}", port))
            .build()
            .resolve()
            .unwrap();

        let err = super::Connection::open(&resolved).await.unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(err.category(), "connection");
    }

    #[tokio::test]
    async fn test_debug_hides_channel() {
        let resolved = ClientConfig::default().resolve().unwrap();
        let conn = super::Connection::open_lazy(&resolved).unwrap();
        let debug_str = format!("{:?}", conn);
        assert!(debug_str.contains("grpc.gpcore.io:443"));
        assert!(!debug_str.contains("token"));
    }
}
