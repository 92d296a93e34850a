//! TLS configuration for the gRPC transport.
//!
//! Every connection is TLS-protected. The policy accepts TLS 1.2 and TLS 1.3,
//! validates the server against the platform trust store (or a custom CA), and
//! advertises `h2` through ALPN. No certificate pinning is performed.

use crate::{Error, Result};
use rustls::{ClientConfig, ProtocolVersion, RootCertStore};
use rustls_pemfile::Item;
use rustls_pki_types::ServerName;
use std::fs;
use std::net::IpAddr;
use std::sync::Arc;

/// ALPN protocol identifier for HTTP/2
const ALPN_H2: &[u8] = b"h2";

/// Lowest TLS protocol version a connection will negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl std::fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tls12 => write!(f, "TLSv1.2"),
            Self::Tls13 => write!(f, "TLSv1.3"),
        }
    }
}

/// Where the trust anchors of a [`TlsConfig`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustSource {
    /// Platform certificate store
    Native,
    /// Bundled Mozilla root program (used when the platform store is empty)
    WebPki,
    /// Custom CA file only
    CustomCa,
}

/// TLS configuration for GPCORE connections.
///
/// # Examples
///
/// ```ignore
/// use gpcore_client::connection::TlsConfig;
///
/// // Platform trust store (default)
/// let tls = TlsConfig::builder().build()?;
///
/// // Private deployment with its own CA
/// let tls = TlsConfig::builder()
///     .ca_cert_path("/etc/gpcore/ca.pem")
///     .native_roots(false)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TlsConfig {
    /// Path to CA certificate file (None = platform roots only)
    ca_cert_path: Option<String>,
    /// Origin of the trust anchors
    trust_source: TrustSource,
    /// Number of trust anchors loaded
    trust_anchors: usize,
    /// Compiled rustls ClientConfig
    client_config: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Create a new TLS configuration builder.
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// Get the rustls ClientConfig for this TLS configuration.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }

    /// Lowest protocol version the compiled config will negotiate.
    pub fn min_version(&self) -> TlsVersion {
        if self.client_config.supports_version(ProtocolVersion::TLSv1_2) {
            TlsVersion::Tls12
        } else {
            TlsVersion::Tls13
        }
    }

    /// Where the trust anchors came from.
    pub fn trust_source(&self) -> TrustSource {
        self.trust_source
    }

    /// Number of trust anchors in the root store.
    pub fn trust_anchors(&self) -> usize {
        self.trust_anchors
    }

    /// Custom CA file, if one was configured.
    pub fn ca_cert_path(&self) -> Option<&str> {
        self.ca_cert_path.as_deref()
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("ca_cert_path", &self.ca_cert_path)
            .field("min_version", &self.min_version())
            .field("trust_source", &self.trust_source)
            .field("trust_anchors", &self.trust_anchors)
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Builder for TLS configuration.
pub struct TlsConfigBuilder {
    ca_cert_path: Option<String>,
    native_roots: bool,
}

impl Default for TlsConfigBuilder {
    fn default() -> Self {
        Self {
            ca_cert_path: None,
            native_roots: true,
        }
    }
}

impl TlsConfigBuilder {
    /// Add a custom CA certificate file (PEM format) to the trust store.
    pub fn ca_cert_path(mut self, path: impl Into<String>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// Load the platform trust store (default: enabled).
    ///
    /// Disable it to trust only the CA given through [`Self::ca_cert_path`].
    pub fn native_roots(mut self, enabled: bool) -> Self {
        self.native_roots = enabled;
        self
    }

    /// Build the TLS configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - CA certificate file cannot be read or holds no certificates
    /// - no trust anchors could be loaded at all
    /// - rustls rejects the protocol version set
    pub fn build(self) -> Result<TlsConfig> {
        let mut root_store = RootCertStore::empty();
        let mut trust_source = TrustSource::CustomCa;

        if let Some(ca_path) = &self.ca_cert_path {
            load_custom_ca(ca_path, &mut root_store)?;
        }

        if self.native_roots {
            let result = rustls_native_certs::load_native_certs();
            let (added, _ignored) = root_store.add_parsable_certificates(result.certs);
            if !result.errors.is_empty() {
                tracing::debug!(
                    errors = result.errors.len(),
                    "some platform certificates could not be loaded"
                );
            }

            if added > 0 {
                trust_source = TrustSource::Native;
            } else if self.ca_cert_path.is_none() {
                tracing::debug!("platform trust store is empty, using bundled webpki roots");
                root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                trust_source = TrustSource::WebPki;
            }
        }

        if root_store.is_empty() {
            return Err(Error::Tls("no trust anchors available".to_string()));
        }

        let trust_anchors = root_store.len();
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let mut client_config = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
            .map_err(|e| Error::Tls(format!("unsupported protocol versions: {}", e)))?
            .with_root_certificates(root_store)
            .with_no_client_auth();
        client_config.alpn_protocols = vec![ALPN_H2.to_vec()];

        Ok(TlsConfig {
            ca_cert_path: self.ca_cert_path,
            trust_source,
            trust_anchors,
            client_config: Arc::new(client_config),
        })
    }
}

/// Load a custom CA certificate from a PEM file into `root_store`.
fn load_custom_ca(ca_path: &str, root_store: &mut RootCertStore) -> Result<()> {
    let ca_cert_data = fs::read(ca_path)?;

    let mut reader = std::io::Cursor::new(&ca_cert_data);
    let mut found_certs = 0;

    loop {
        match rustls_pemfile::read_one(&mut reader) {
            Ok(Some(Item::X509Certificate(cert))) => {
                let (added, _) = root_store.add_parsable_certificates(std::iter::once(cert));
                found_certs += added;
            }
            Ok(Some(_)) => {
                // Keys and other PEM items are not trust anchors
            }
            Ok(None) => break,
            Err(_) => {
                return Err(Error::Tls(format!(
                    "Failed to parse CA certificate from '{}'",
                    ca_path
                )));
            }
        }
    }

    if found_certs == 0 {
        return Err(Error::Tls(format!(
            "No valid certificates found in '{}'",
            ca_path
        )));
    }

    Ok(())
}

/// Build the TLS server name (SNI) for a host taken from a target URI.
///
/// Accepts DNS names and IP literals; IPv6 literals may keep their brackets.
/// DNS names follow the rustls rules, which allow `_` in labels.
pub fn server_name(host: &str) -> Result<ServerName<'static>> {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host = host.trim_end_matches('.');

    if host.is_empty() {
        return Err(Error::Tls(format!("Invalid hostname for TLS: '{}'", host)));
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ServerName::IpAddress(ip.into()));
    }

    ServerName::try_from(host.to_string())
        .map_err(|_| Error::Tls(format!("Invalid hostname for TLS: '{}'", host)))
}
