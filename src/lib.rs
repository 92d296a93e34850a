//! gpcore-client: typed gRPC client for the GPCORE API
//!
//! One TLS-protected, multiplexed HTTP/2 connection is opened per [`Client`].
//! Every domain stub (admin, cloud, auth, metadata, network, payment) shares it.
//!
//! ```no_run
//! # async fn example() -> gpcore_client::Result<()> {
//! use gpcore_client::{BearerToken, Client, ClientConfig};
//! use std::time::Duration;
//!
//! let config = ClientConfig::builder()
//!     .auth(BearerToken::new("my-access-token"))
//!     .connect_timeout(Duration::from_secs(10))
//!     .build();
//!
//! let client = Client::connect(config).await?;
//! let mut admin = client.admin();
//! # let _ = &mut admin;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod connection;
pub mod error;
pub mod services;

mod metrics;

pub use client::{
    AuthProvider, BearerToken, Client, ClientConfig, ClientConfigBuilder, ClientOption,
    CredentialInterceptor, ResolvedOptions, TransportOption, DEFAULT_ENDPOINT,
};
pub use connection::{AuthenticatedChannel, Connection, TlsConfig, TlsVersion};
pub use error::{Error, Result};
pub use services::{
    AdminServiceClient, AuthServiceClient, CloudServiceClient, MetadataServiceClient,
    NetworkServiceClient, PaymentServiceClient,
};
