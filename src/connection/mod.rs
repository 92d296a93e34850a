//! Connection management
//!
//! This module handles:
//! * TLS configuration (minimum TLS 1.2, platform trust store)
//! * The TLS connector dialed by the gRPC channel
//! * The shared, authenticated connection handed to domain stubs

mod conn;
mod tls;
mod transport;

pub use conn::{AuthenticatedChannel, Connection};
pub use tls::{server_name, TlsConfig, TlsConfigBuilder, TlsVersion, TrustSource};
pub use transport::TlsConnector;
