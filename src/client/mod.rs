//! High-level client API

mod auth;
mod gpcore_client;
mod options;

pub use auth::{AuthProvider, BearerToken, CredentialInterceptor, AUTHORIZATION_HEADER};
pub use gpcore_client::Client;
pub use options::{
    user_agent, ClientConfig, ClientConfigBuilder, ClientOption, ResolvedOptions,
    TransportOption, DEFAULT_ENDPOINT, DEFAULT_VERSION,
};
