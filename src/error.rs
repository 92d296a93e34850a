//! Error types

use thiserror::Error;

/// Result alias for client construction
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or opening a client connection.
///
/// Calls made through a domain stub fail with [`tonic::Status`] instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport could not be initialized or reached
    #[error("connection to '{target}' failed: {source}")]
    Connection {
        /// Address the connection was opened against
        target: String,
        /// Underlying transport failure
        #[source]
        source: tonic::transport::Error,
    },

    /// The target address could not be parsed
    #[error("invalid endpoint '{target}': {reason}")]
    InvalidEndpoint {
        /// Address as supplied
        target: String,
        /// Why it was rejected
        reason: String,
    },

    /// Trust store or TLS client configuration failure
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// Invalid option value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means no usable connection could be established
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection { .. } | Error::InvalidEndpoint { .. })
    }

    /// Stable label for metrics and logs
    pub fn category(&self) -> &'static str {
        match self {
            Error::Connection { .. } => "connection",
            Error::InvalidEndpoint { .. } => "invalid_endpoint",
            Error::Tls(_) => "tls",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }

    pub(crate) fn invalid_endpoint(target: &str, reason: impl Into<String>) -> Self {
        Error::InvalidEndpoint {
            target: target.to_string(),
            reason: reason.into(),
        }
    }
}
