//! Per-call credential injection

use std::sync::Arc;
use tonic::metadata::{AsciiMetadataValue, MetadataKey};
use tonic::service::Interceptor;
use tonic::{Request, Status};

/// Metadata key carrying the credential on every call
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Source of authentication material attached to every outgoing call.
///
/// `authorization` returns the complete header value (for example
/// `Bearer <token>`). It is invoked once per call, so implementations may hand
/// out refreshed credentials. An error aborts the call with that status.
///
/// Any `Fn() -> Result<String, Status>` closure is a provider.
pub trait AuthProvider: Send + Sync {
    /// Header value for the `authorization` metadata entry
    fn authorization(&self) -> Result<String, Status>;
}

impl<F> AuthProvider for F
where
    F: Fn() -> Result<String, Status> + Send + Sync,
{
    fn authorization(&self) -> Result<String, Status> {
        self()
    }
}

/// Static access token sent as `Bearer <token>`
#[derive(Clone)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    /// Wrap an access token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl AuthProvider for BearerToken {
    fn authorization(&self) -> Result<String, Status> {
        Ok(format!("Bearer {}", self.token))
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Interceptor inserting the provider's credential into each request.
///
/// Without a provider, requests pass through untouched.
#[derive(Clone, Default)]
pub struct CredentialInterceptor {
    provider: Option<Arc<dyn AuthProvider>>,
}

impl CredentialInterceptor {
    /// Create an interceptor around an optional provider
    pub fn new(provider: Option<Arc<dyn AuthProvider>>) -> Self {
        Self { provider }
    }

    /// Whether a provider is attached
    pub fn is_authenticated(&self) -> bool {
        self.provider.is_some()
    }

    /// The attached provider
    pub fn provider(&self) -> Option<&Arc<dyn AuthProvider>> {
        self.provider.as_ref()
    }
}

impl Interceptor for CredentialInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let Some(provider) = &self.provider else {
            return Ok(request);
        };

        let value: AsciiMetadataValue = provider
            .authorization()?
            .parse()
            .map_err(|_| Status::unauthenticated("credential is not a valid header value"))?;
        request
            .metadata_mut()
            .insert(MetadataKey::from_static(AUTHORIZATION_HEADER), value);
        Ok(request)
    }
}

impl std::fmt::Debug for CredentialInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialInterceptor")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
