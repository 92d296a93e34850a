//! Client implementation

use super::options::ClientConfig;
use crate::connection::{AuthenticatedChannel, Connection};
use crate::metrics::counters;
use crate::services::{
    AdminServiceClient, AuthServiceClient, CloudServiceClient, MetadataServiceClient,
    NetworkServiceClient, PaymentServiceClient,
};
use crate::Result;

/// GPCORE API client
///
/// Owns one connection; every accessor returns a fresh stub bound to it.
#[derive(Debug, Clone)]
pub struct Client {
    conn: Connection,
}

impl Client {
    /// Create a client without waiting for the transport.
    ///
    /// The TLS handshake happens on the first call, so an unreachable server
    /// shows up as a failed call rather than here. Must be called from within a
    /// tokio runtime.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example() -> gpcore_client::Result<()> {
    /// use gpcore_client::{BearerToken, Client, ClientConfig};
    ///
    /// let client = Client::new(
    ///     ClientConfig::builder()
    ///         .auth(BearerToken::new("my-access-token"))
    ///         .build(),
    /// )?;
    /// let _cloud = client.cloud();
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: ClientConfig) -> Result<Self> {
        let conn = config
            .resolve()
            .and_then(|resolved| Connection::open_lazy(&resolved))
            .map_err(|e| {
                counters::connection_failed(e.category());
                tracing::warn!(error = %e, "failed to create client");
                e
            })?;
        Ok(Self { conn })
    }

    /// Create a client and wait until the transport is established.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example() -> gpcore_client::Result<()> {
    /// use gpcore_client::{Client, ClientConfig};
    /// use std::time::Duration;
    ///
    /// let client = Client::connect(
    ///     ClientConfig::builder()
    ///         .endpoint("grpc.gpcore.io:443")
    ///         .connect_timeout(Duration::from_secs(5))
    ///         .build(),
    /// )
    /// .await?;
    /// # let _ = client;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let resolved = config.resolve().map_err(|e| {
            counters::connection_failed(e.category());
            e
        })?;
        let conn = Connection::open(&resolved).await?;
        Ok(Self { conn })
    }

    /// Admin service stub
    pub fn admin(&self) -> AdminServiceClient {
        AdminServiceClient::new(&self.conn)
    }

    /// Cloud service stub
    pub fn cloud(&self) -> CloudServiceClient {
        CloudServiceClient::new(&self.conn)
    }

    /// Auth service stub
    pub fn auth(&self) -> AuthServiceClient {
        AuthServiceClient::new(&self.conn)
    }

    /// Metadata service stub
    pub fn metadata(&self) -> MetadataServiceClient {
        MetadataServiceClient::new(&self.conn)
    }

    /// Network service stub
    pub fn network(&self) -> NetworkServiceClient {
        NetworkServiceClient::new(&self.conn)
    }

    /// Payment service stub
    pub fn payment(&self) -> PaymentServiceClient {
        PaymentServiceClient::new(&self.conn)
    }

    /// The underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Authenticated channel for calls not covered by a domain stub
    pub fn channel(&self) -> AuthenticatedChannel {
        self.conn.channel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{BearerToken, ClientOption, DEFAULT_ENDPOINT};
    use crate::connection::TlsVersion;

    #[tokio::test]
    async fn test_new_with_no_options() {
        let client = Client::new(ClientConfig::default()).unwrap();
        let conn = client.connection();

        assert_eq!(conn.target(), DEFAULT_ENDPOINT);
        assert_eq!(conn.tls().min_version(), TlsVersion::Tls12);
        assert!(conn.user_agent().contains(env!("CARGO_PKG_VERSION")));
        assert!(!conn.is_authenticated());
    }

    #[tokio::test]
    async fn test_new_with_endpoint_override() {
        let client =
            Client::new(ClientConfig::new([ClientOption::endpoint("test.local:443")])).unwrap();
        assert_eq!(client.connection().target(), "test.local:443");
    }

    #[tokio::test]
    async fn test_accessors_share_connection() {
        let client = Client::new(
            ClientConfig::builder()
                .endpoint("test.local:443")
                .auth(BearerToken::new("token"))
                .build(),
        )
        .unwrap();

        let target = client.connection().target();
        assert_eq!(client.admin().target(), target);
        assert_eq!(client.cloud().target(), target);
        assert_eq!(client.auth().target(), target);
        assert_eq!(client.metadata().target(), target);
        assert_eq!(client.network().target(), target);
        assert_eq!(client.payment().target(), target);
        assert!(client.admin().connection().is_authenticated());
    }

    #[tokio::test]
    async fn test_new_with_malformed_endpoint() {
        let err = Client::new(ClientConfig::new([ClientOption::endpoint("no:port:here")]))
            .unwrap_err();
        assert!(err.is_connection_error());
    }
}
