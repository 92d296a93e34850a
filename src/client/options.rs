//! Client options and their resolution
//!
//! A client is configured from a list of [`ClientOption`] values:
//! * `Transport` - raw transport setting, applied in the order supplied
//! * `Endpoint` - replaces the default `host:port` target
//! * `Auth` - credential provider; only the first one is honored

use super::auth::AuthProvider;
use crate::connection::{TlsConfig, TlsConnector};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::Endpoint;

/// Address used when no endpoint override is supplied
pub const DEFAULT_ENDPOINT: &str = "grpc.gpcore.io:443";

/// Version stamped into the user agent unless overridden
pub const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Render the user agent for a client version
pub fn user_agent(version: &str) -> String {
    format!("GPCORE Rust Client [{}]", version)
}

/// Raw transport setting passed through to the gRPC channel unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOption {
    /// Timeout for establishing the transport
    ConnectTimeout(Duration),
    /// Deadline applied to every request
    Timeout(Duration),
    /// Maximum in-flight requests
    ConcurrencyLimit(usize),
    /// At most `requests` per `per`
    RateLimit {
        /// Requests allowed per window
        requests: u64,
        /// Window length
        per: Duration,
    },
    /// HTTP/2 per-stream flow control window
    InitialStreamWindowSize(u32),
    /// HTTP/2 connection-level flow control window
    InitialConnectionWindowSize(u32),
    /// Interval of HTTP/2 keep-alive pings
    Http2KeepAliveInterval(Duration),
    /// How long to wait for a keep-alive acknowledgement
    KeepAliveTimeout(Duration),
    /// Send keep-alive pings while no calls are active
    KeepAliveWhileIdle(bool),
    /// HTTP/2 adaptive flow control
    Http2AdaptiveWindow(bool),
    /// Capacity of the channel's request buffer
    BufferSize(usize),
    /// TCP_NODELAY on the dialed socket
    TcpNodelay(bool),
}

impl TransportOption {
    /// Apply this option to the channel endpoint or the TLS connector
    pub(crate) fn apply(
        &self,
        endpoint: Endpoint,
        connector: TlsConnector,
    ) -> (Endpoint, TlsConnector) {
        match *self {
            Self::ConnectTimeout(d) => (endpoint.connect_timeout(d), connector),
            Self::Timeout(d) => (endpoint.timeout(d), connector),
            Self::ConcurrencyLimit(limit) => (endpoint.concurrency_limit(limit), connector),
            Self::RateLimit { requests, per } => (endpoint.rate_limit(requests, per), connector),
            Self::InitialStreamWindowSize(size) => {
                (endpoint.initial_stream_window_size(size), connector)
            }
            Self::InitialConnectionWindowSize(size) => {
                (endpoint.initial_connection_window_size(size), connector)
            }
            Self::Http2KeepAliveInterval(d) => (endpoint.http2_keep_alive_interval(d), connector),
            Self::KeepAliveTimeout(d) => (endpoint.keep_alive_timeout(d), connector),
            Self::KeepAliveWhileIdle(enabled) => {
                (endpoint.keep_alive_while_idle(enabled), connector)
            }
            Self::Http2AdaptiveWindow(enabled) => {
                (endpoint.http2_adaptive_window(enabled), connector)
            }
            Self::BufferSize(size) => (endpoint.buffer_size(size), connector),
            Self::TcpNodelay(enabled) => (endpoint, connector.tcp_nodelay(enabled)),
        }
    }
}

/// One construction-time option.
#[derive(Clone)]
pub enum ClientOption {
    /// Raw transport setting, appended in order
    Transport(TransportOption),
    /// Replacement for [`DEFAULT_ENDPOINT`]
    Endpoint(String),
    /// Credential provider; later providers are ignored
    Auth(Arc<dyn AuthProvider>),
}

impl ClientOption {
    /// Endpoint override option
    pub fn endpoint(target: impl Into<String>) -> Self {
        Self::Endpoint(target.into())
    }

    /// Authentication provider option
    pub fn auth(provider: impl AuthProvider + 'static) -> Self {
        Self::Auth(Arc::new(provider))
    }
}

impl From<TransportOption> for ClientOption {
    fn from(option: TransportOption) -> Self {
        Self::Transport(option)
    }
}

impl std::fmt::Debug for ClientOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(option) => f.debug_tuple("Transport").field(option).finish(),
            Self::Endpoint(target) => f.debug_tuple("Endpoint").field(target).finish(),
            Self::Auth(_) => f.debug_tuple("Auth").field(&"<AuthProvider>").finish(),
        }
    }
}

/// Client configuration
///
/// Holds the client version stamped into the user agent, an optional TLS
/// override, and the option list. Use `ClientConfig::builder()` for a fluent API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    version: String,
    tls: Option<TlsConfig>,
    options: Vec<ClientOption>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            tls: None,
            options: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration from an option list
    pub fn new(options: impl IntoIterator<Item = ClientOption>) -> Self {
        Self {
            options: options.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Create a builder
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = ClientConfig::builder()
    ///     .endpoint("grpc.staging.gpcore.io:443")
    ///     .auth(BearerToken::new("token"))
    ///     .connect_timeout(Duration::from_secs(10))
    ///     .build();
    /// ```
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Version stamped into the user agent
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Options in the order supplied
    pub fn options(&self) -> &[ClientOption] {
        &self.options
    }

    /// Resolve the option list into the settings used to open a connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the target address is malformed or the default trust
    /// store cannot be loaded.
    pub fn resolve(&self) -> Result<ResolvedOptions> {
        let mut target = DEFAULT_ENDPOINT.to_string();
        let mut auth: Option<Arc<dyn AuthProvider>> = None;
        let mut transport = Vec::new();

        for option in &self.options {
            match option {
                ClientOption::Transport(t) => transport.push(*t),
                ClientOption::Endpoint(e) => target = e.clone(),
                ClientOption::Auth(provider) => {
                    if auth.is_none() {
                        auth = Some(provider.clone());
                    } else {
                        tracing::debug!("authentication provider already set, ignoring");
                    }
                }
            }
        }

        validate_target(&target)?;

        let tls = match &self.tls {
            Some(tls) => tls.clone(),
            None => TlsConfig::builder().build()?,
        };

        let resolved = ResolvedOptions {
            target,
            user_agent: user_agent(&self.version),
            auth,
            transport,
            tls,
        };
        tracing::debug!(
            endpoint = %resolved.target,
            authenticated = resolved.auth.is_some(),
            transport_options = resolved.transport.len(),
            "client options resolved"
        );
        Ok(resolved)
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the version stamped into the user agent
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    /// Override the trust configuration (default: platform trust store)
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.config.tls = Some(tls);
        self
    }

    /// Append an option
    pub fn option(mut self, option: ClientOption) -> Self {
        self.config.options.push(option);
        self
    }

    /// Append several options in order
    pub fn options(mut self, options: impl IntoIterator<Item = ClientOption>) -> Self {
        self.config.options.extend(options);
        self
    }

    /// Override the target address
    pub fn endpoint(self, target: impl Into<String>) -> Self {
        self.option(ClientOption::endpoint(target))
    }

    /// Attach a credential provider (only the first one is used)
    pub fn auth(self, provider: impl AuthProvider + 'static) -> Self {
        self.option(ClientOption::auth(provider))
    }

    /// Attach a shared credential provider
    pub fn auth_provider(self, provider: Arc<dyn AuthProvider>) -> Self {
        self.option(ClientOption::Auth(provider))
    }

    /// Append a raw transport option
    pub fn transport(self, option: TransportOption) -> Self {
        self.option(ClientOption::Transport(option))
    }

    /// Set the connect timeout
    pub fn connect_timeout(self, timeout: Duration) -> Self {
        self.transport(TransportOption::ConnectTimeout(timeout))
    }

    /// Set the per-request timeout
    pub fn timeout(self, timeout: Duration) -> Self {
        self.transport(TransportOption::Timeout(timeout))
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Settings a connection is opened with.
#[derive(Clone)]
pub struct ResolvedOptions {
    target: String,
    user_agent: String,
    auth: Option<Arc<dyn AuthProvider>>,
    transport: Vec<TransportOption>,
    tls: TlsConfig,
}

impl ResolvedOptions {
    /// Target address (`host[:port]`)
    pub fn target(&self) -> &str {
        &self.target
    }

    /// User agent sent with every call
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// The honored credential provider
    pub fn auth(&self) -> Option<&Arc<dyn AuthProvider>> {
        self.auth.as_ref()
    }

    /// Raw transport options in the order supplied
    pub fn transport_options(&self) -> &[TransportOption] {
        &self.transport
    }

    /// TLS policy
    pub fn tls(&self) -> &TlsConfig {
        &self.tls
    }

    /// URI handed to the gRPC channel
    pub(crate) fn target_uri(&self) -> Result<String> {
        validate_target(&self.target)?;
        Ok(format!("https://{}", self.target))
    }
}

impl std::fmt::Debug for ResolvedOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedOptions")
            .field("target", &self.target)
            .field("user_agent", &self.user_agent)
            .field("authenticated", &self.auth.is_some())
            .field("transport", &self.transport)
            .field("tls", &self.tls)
            .finish()
    }
}

/// Check that a target is `host`, `host:port`, or `[ipv6]:port`
fn validate_target(target: &str) -> Result<()> {
    if target.is_empty() {
        return Err(Error::invalid_endpoint(target, "empty address"));
    }
    if target.contains("://") {
        return Err(Error::invalid_endpoint(
            target,
            "expected host:port without a scheme",
        ));
    }

    let (host, port) = if let Some(rest) = target.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| Error::invalid_endpoint(target, "unterminated IPv6 literal"))?;
        if host.parse::<std::net::Ipv6Addr>().is_err() {
            return Err(Error::invalid_endpoint(target, "invalid IPv6 literal"));
        }
        match after {
            "" => (host, None),
            _ => match after.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None => return Err(Error::invalid_endpoint(target, "unexpected text after ']'")),
            },
        }
    } else {
        match target.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (target, None),
        }
    };

    if host.is_empty() {
        return Err(Error::invalid_endpoint(target, "missing host"));
    }
    if !target.starts_with('[')
        && !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
    {
        return Err(Error::invalid_endpoint(target, "invalid host"));
    }
    if let Some(port) = port {
        match port.parse::<u16>() {
            Ok(p) if p > 0 => {}
            _ => return Err(Error::invalid_endpoint(target, "invalid port")),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BearerToken;

    fn resolve(options: Vec<ClientOption>) -> ResolvedOptions {
        ClientConfig::new(options).resolve().unwrap()
    }

    #[test]
    fn test_no_options_uses_defaults() {
        let resolved = resolve(vec![]);
        assert_eq!(resolved.target(), DEFAULT_ENDPOINT);
        assert!(resolved.auth().is_none());
        assert!(resolved.transport_options().is_empty());
        assert_eq!(
            resolved.user_agent(),
            format!("GPCORE Rust Client [{}]", DEFAULT_VERSION)
        );
    }

    #[test]
    fn test_endpoint_override() {
        let resolved = resolve(vec![ClientOption::endpoint("test.local:443")]);
        assert_eq!(resolved.target(), "test.local:443");
    }

    #[test]
    fn test_endpoint_override_position_independent() {
        let timeout = TransportOption::Timeout(Duration::from_secs(5));
        let resolved = resolve(vec![
            timeout.into(),
            ClientOption::auth(BearerToken::new("t")),
            ClientOption::endpoint("test.local:443"),
        ]);
        assert_eq!(resolved.target(), "test.local:443");

        let resolved = resolve(vec![
            ClientOption::endpoint("test.local:443"),
            timeout.into(),
            ClientOption::auth(BearerToken::new("t")),
        ]);
        assert_eq!(resolved.target(), "test.local:443");
    }

    #[test]
    fn test_first_auth_provider_wins() {
        let first: Arc<dyn AuthProvider> = Arc::new(BearerToken::new("a"));
        let second: Arc<dyn AuthProvider> = Arc::new(BearerToken::new("b"));

        let both = resolve(vec![
            ClientOption::Auth(first.clone()),
            ClientOption::Auth(second.clone()),
        ]);
        let only_first = resolve(vec![ClientOption::Auth(first.clone())]);

        assert!(Arc::ptr_eq(both.auth().unwrap(), &first));
        assert!(Arc::ptr_eq(only_first.auth().unwrap(), &first));
        assert_eq!(
            both.auth().unwrap().authorization().unwrap(),
            only_first.auth().unwrap().authorization().unwrap()
        );
    }

    #[test]
    fn test_transport_options_kept_in_order() {
        let options = vec![
            TransportOption::ConnectTimeout(Duration::from_secs(3)),
            TransportOption::ConcurrencyLimit(16),
            TransportOption::ConnectTimeout(Duration::from_secs(7)),
            TransportOption::TcpNodelay(false),
        ];
        let resolved = resolve(options.iter().copied().map(ClientOption::from).collect());
        assert_eq!(resolved.transport_options(), options.as_slice());
    }

    #[test]
    fn test_version_stamped_into_user_agent() {
        let resolved = ClientConfig::builder()
            .version("1.4.2")
            .build()
            .resolve()
            .unwrap();
        assert_eq!(resolved.user_agent(), "GPCORE Rust Client [1.4.2]");
    }

    #[test]
    fn test_malformed_endpoint_is_connection_error() {
        for target in [
            "",
            "https://grpc.gpcore.io:443",
            "host:notaport",
            "host:0",
            "host:70000",
            ":443",
            "bad host:443",
            "[::1:443",
            "[not-ip]:443",
            "höst.local:443",
        ] {
            let err = ClientConfig::new([ClientOption::endpoint(target)])
                .resolve()
                .unwrap_err();
            assert!(err.is_connection_error(), "{target} should be rejected");
        }
    }

    #[test]
    fn test_valid_endpoints() {
        for target in [
            "grpc.gpcore.io:443",
            "localhost",
            "127.0.0.1:50051",
            "[::1]:443",
            "[::1]",
            "internal_host:8443",
        ] {
            assert!(validate_target(target).is_ok(), "{target} should be accepted");
        }
    }

    #[test]
    fn test_accepted_hosts_yield_server_names() {
        for target in [
            "grpc.gpcore.io:443",
            "localhost",
            "127.0.0.1:50051",
            "[::1]:443",
            "internal_host:8443",
            "edge-1.internal_zone.local",
        ] {
            validate_target(target).unwrap();
            let uri: http::Uri = format!("https://{}", target).parse().unwrap();
            let host = uri.host().unwrap();
            assert!(
                crate::connection::server_name(host).is_ok(),
                "{target} passes validation but has no TLS server name"
            );
        }
    }

    #[test]
    fn test_non_ascii_host_is_invalid_endpoint() {
        let err = ClientConfig::new([ClientOption::endpoint("höst.local:443")])
            .resolve()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_target_uri() {
        let resolved = resolve(vec![ClientOption::endpoint("test.local:443")]);
        assert_eq!(resolved.target_uri().unwrap(), "https://test.local:443");
    }

    #[test]
    fn test_builder_appends_in_order() {
        let config = ClientConfig::builder()
            .connect_timeout(Duration::from_secs(1))
            .endpoint("a.local:443")
            .timeout(Duration::from_secs(2))
            .build();

        assert_eq!(config.options().len(), 3);
        assert!(matches!(
            config.options()[0],
            ClientOption::Transport(TransportOption::ConnectTimeout(_))
        ));
        assert!(matches!(config.options()[1], ClientOption::Endpoint(_)));
        assert!(matches!(
            config.options()[2],
            ClientOption::Transport(TransportOption::Timeout(_))
        ));
    }

    #[test]
    fn test_debug_hides_credentials() {
        let config = ClientConfig::new([ClientOption::auth(BearerToken::new("hidden"))]);
        let debug_str = format!("{:?}", config);
        assert!(debug_str.contains("<AuthProvider>"));
        assert!(!debug_str.contains("hidden"));
    }
}
