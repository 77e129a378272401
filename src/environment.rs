//! Detection of the in-cluster environment.

use std::io;

use futures::FutureExt;
use futures::future::BoxFuture;

/// Environment variable holding the API server host inside a pod.
pub const SERVICE_HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";

/// Environment variable holding the API server port inside a pod.
pub const SERVICE_PORT_ENV: &str = "KUBERNETES_SERVICE_PORT";

/// Location of the service account token mounted into pods.
pub const TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Source of the process environment and service account credentials.
///
/// Injected into discovery so tests can substitute a fake cluster.
pub trait Environment: Send + Sync + 'static {
    /// Returns the value of an environment variable.
    fn var(&self, key: &str) -> Option<String>;

    /// Reads the service account bearer token, if one is mounted.
    ///
    /// Called for every request, so rotated tokens are picked up.
    fn bearer_token(&self) -> BoxFuture<'static, Option<String>>;

    /// Whether the process runs inside a Kubernetes pod.
    fn running_in_cluster(&self) -> bool {
        self.var(SERVICE_HOST_ENV).is_some()
    }

    /// The API server URL advertised to pods, if both host and port are set.
    ///
    /// The scheme is `https` only when the port is 443.
    fn service_endpoint(&self) -> Option<String> {
        let host = self.var(SERVICE_HOST_ENV)?;
        let port = self.var(SERVICE_PORT_ENV)?;
        let scheme = if port == "443" { "https" } else { "http" };

        if host.contains(':') {
            Some(format!("{scheme}://[{host}]:{port}"))
        } else {
            Some(format!("{scheme}://{host}:{port}"))
        }
    }
}

/// The real process environment and token file.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn bearer_token(&self) -> BoxFuture<'static, Option<String>> {
        async {
            match tokio::fs::read_to_string(TOKEN_PATH).await {
                Ok(token) => Some(token.trim().to_string()).filter(|t| !t.is_empty()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                Err(e) => {
                    tracing::warn!("failed to read service account token from {TOKEN_PATH}: {e}");
                    None
                }
            }
        }
        .boxed()
    }
}
