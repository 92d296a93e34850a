//! Domain service stubs
//!
//! Each stub is a lightweight view over the client's shared [`Connection`]:
//! creating one allocates nothing beyond cloning the channel handle, and every
//! stub issues calls on the same multiplexed transport. Request and response
//! messages are the prost types generated from the GPCORE API definitions.

use crate::connection::{AuthenticatedChannel, Connection};
use crate::metrics::counters;
use http::uri::PathAndQuery;
use tonic::client::Grpc;
use tonic::codec::Streaming;
use tonic::{IntoRequest, Response, Status};

/// Build the `/<service>/<method>` path of a call
fn method_path(service: &str, method: &str) -> Result<PathAndQuery, Status> {
    if method.is_empty()
        || !method
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(Status::invalid_argument(format!(
            "invalid method name '{}'",
            method
        )));
    }

    PathAndQuery::try_from(format!("/{}/{}", service, method))
        .map_err(|e| Status::internal(format!("invalid method path: {}", e)))
}

macro_rules! domain_client {
    ($(#[$doc:meta])* $name:ident, $service:literal, $label:literal) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $name {
            inner: Grpc<AuthenticatedChannel>,
            connection: Connection,
        }

        impl $name {
            /// Fully qualified gRPC service name
            pub const SERVICE_NAME: &'static str = $service;

            /// Bind a stub to a connection
            pub fn new(connection: &Connection) -> Self {
                counters::stub_created($label);
                Self {
                    inner: Grpc::new(connection.channel()),
                    connection: connection.clone(),
                }
            }

            /// Limit the size of decoded responses (default: 4MB)
            #[must_use]
            pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
                self.inner = self.inner.max_decoding_message_size(limit);
                self
            }

            /// Limit the size of encoded requests (default: `usize::MAX`)
            #[must_use]
            pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
                self.inner = self.inner.max_encoding_message_size(limit);
                self
            }

            /// Target address of the bound connection
            pub fn target(&self) -> &str {
                self.connection.target()
            }

            /// The bound connection
            pub fn connection(&self) -> &Connection {
                &self.connection
            }

            /// Issue a unary call to `method` of this service
            pub async fn unary<Req, Resp>(
                &mut self,
                method: &str,
                request: impl IntoRequest<Req>,
            ) -> Result<Response<Resp>, Status>
            where
                Req: prost::Message + Send + Sync + 'static,
                Resp: prost::Message + Default + Send + Sync + 'static,
            {
                let path = method_path(Self::SERVICE_NAME, method)?;
                self.inner
                    .ready()
                    .await
                    .map_err(|e| Status::unknown(format!("Service was not ready: {}", e)))?;
                let codec = tonic_prost::ProstCodec::<Req, Resp>::default();
                self.inner.unary(request.into_request(), path, codec).await
            }

            /// Issue a server-streaming call to `method` of this service
            pub async fn server_streaming<Req, Resp>(
                &mut self,
                method: &str,
                request: impl IntoRequest<Req>,
            ) -> Result<Response<Streaming<Resp>>, Status>
            where
                Req: prost::Message + Send + Sync + 'static,
                Resp: prost::Message + Default + Send + Sync + 'static,
            {
                let path = method_path(Self::SERVICE_NAME, method)?;
                self.inner
                    .ready()
                    .await
                    .map_err(|e| Status::unknown(format!("Service was not ready: {}", e)))?;
                let codec = tonic_prost::ProstCodec::<Req, Resp>::default();
                self.inner
                    .server_streaming(request.into_request(), path, codec)
                    .await
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("service", &Self::SERVICE_NAME)
                    .field("target", &self.connection.target())
                    .finish()
            }
        }
    };
}

domain_client!(
    /// Stub for `gpcore.api.admin.v1.AdminService`
    AdminServiceClient,
    "gpcore.api.admin.v1.AdminService",
    "admin"
);

domain_client!(
    /// Stub for `gpcore.api.cloud.v1.CloudService`
    CloudServiceClient,
    "gpcore.api.cloud.v1.CloudService",
    "cloud"
);

domain_client!(
    /// Stub for `gpcore.api.auth.v1.AuthService`
    AuthServiceClient,
    "gpcore.api.auth.v1.AuthService",
    "auth"
);

domain_client!(
    /// Stub for `gpcore.api.metadata.v1.MetadataService`
    MetadataServiceClient,
    "gpcore.api.metadata.v1.MetadataService",
    "metadata"
);

domain_client!(
    /// Stub for `gpcore.api.network.v1.NetworkService`
    NetworkServiceClient,
    "gpcore.api.network.v1.NetworkService",
    "network"
);

domain_client!(
    /// Stub for `gpcore.api.payment.v1.PaymentService`
    PaymentServiceClient,
    "gpcore.api.payment.v1.PaymentService",
    "payment"
);
