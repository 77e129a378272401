//! HTTP transport used to reach the API server.

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use http::{Request, Response};
use http_body_util::BodyExt;
use kube::client::Body;
use kube::{Client, Config};

use crate::error::{BoxError, Error, Result};

/// A response body delivered as a stream of chunks.
pub type ByteStream = BoxStream<'static, std::result::Result<Bytes, BoxError>>;

/// Sends requests to the API server and streams back response bodies.
///
/// Dropping the returned future or body stream aborts the request.
pub trait Transport: Send + Sync + 'static {
    /// Sends a request whose URI holds only a path and query.
    fn execute(
        &self,
        request: Request<Vec<u8>>,
    ) -> BoxFuture<'static, std::result::Result<Response<ByteStream>, BoxError>>;
}

/// Transport backed by a [`kube::Client`].
#[derive(Clone)]
pub struct KubeTransport {
    client: Client,
}

impl KubeTransport {
    /// Creates a transport for the API server at `api_url`.
    ///
    /// Authentication headers are added per request, so the client carries no credentials.
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL is invalid or the client cannot be built.
    pub fn new(api_url: &str, accept_invalid_certs: bool) -> Result<Self> {
        let cluster_url = api_url
            .parse()
            .map_err(|e| Error::Config(format!("invalid API server URL {api_url}: {e}")))?;

        let mut config = Config::new(cluster_url);
        config.accept_invalid_certs = accept_invalid_certs;

        let client = Client::try_from(config)
            .map_err(|e| Error::Config(format!("failed to build Kubernetes client: {e}")))?;

        Ok(Self::from_client(client))
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for KubeTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeTransport").finish_non_exhaustive()
    }
}

impl Transport for KubeTransport {
    fn execute(
        &self,
        request: Request<Vec<u8>>,
    ) -> BoxFuture<'static, std::result::Result<Response<ByteStream>, BoxError>> {
        let client = self.client.clone();

        Box::pin(async move {
            let response = client.send(request.map(Body::from)).await?;

            Ok(response.map(|body| body.into_data_stream().map_err(BoxError::from).boxed()))
        })
    }
}
