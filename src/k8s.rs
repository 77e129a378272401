//! Pod discovery against the Kubernetes API server.
//!
//! Lookups list the pods matching a [`Target`]'s label selector. Subscriptions
//! open a watch on the same query and report each pod the first time it is seen
//! with an IP address.
//!
//! # How It Works
//!
//! 1. Builds `GET /api/v1/namespaces/{namespace}/pods?labelSelector=...` for the target
//! 2. Adds a service account bearer token when running inside a pod
//! 3. Lookups decode the full `PodList` response
//! 4. Watches split the streamed body into newline-delimited events and report
//!    new instances as each chunk arrives
//!
//! # Example
//!
//! ```ignore
//! use k8s_pod_discovery::{DiscoveryConfig, K8sDiscovery, ServiceDiscovery, Target};
//!
//! let discovery = K8sDiscovery::new(DiscoveryConfig::new())?;
//! let target = Target::new([("app", "nginx")]).in_namespace("web");
//!
//! let pods = discovery.lookup_with_default_timeout(&target).await?;
//!
//! let token = discovery.subscribe(
//!     &target,
//!     |result| println!("new pods: {result:?}"),
//!     |reason| println!("watch ended: {reason}"),
//! );
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use http::header::{AUTHORIZATION, HeaderValue};
use http::Request;
use tokio::time::Instant;

use crate::discovery::{CancellationToken, ServiceDiscovery};
use crate::environment::{Environment, SystemEnvironment};
use crate::error::{CompletionReason, Error, Result};
use crate::instance::Instance;
use crate::lookup::lookup;
use crate::session;
use crate::target::Target;
use crate::transport::{KubeTransport, Transport};

/// Configuration for Kubernetes pod discovery.
#[derive(Clone, Debug)]
pub struct DiscoveryConfig {
    /// Base URL of the API server, e.g. `https://10.96.0.1:443`.
    /// If `None`, uses the endpoint advertised to pods through the environment.
    pub api_url: Option<String>,

    /// Deadline used by [`ServiceDiscovery::lookup_with_default_timeout`].
    pub default_lookup_timeout: Duration,

    /// Skip TLS certificate verification of the API server.
    pub accept_invalid_certs: bool,
}

impl DiscoveryConfig {
    /// Lookup deadline used unless configured otherwise.
    pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(1);

    /// Creates a configuration that discovers the API server from the environment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_url: None,
            default_lookup_timeout: Self::DEFAULT_LOOKUP_TIMEOUT,
            accept_invalid_certs: false,
        }
    }

    /// Sets an explicit API server URL.
    #[must_use]
    pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    /// Sets the default lookup deadline.
    #[must_use]
    pub fn default_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.default_lookup_timeout = timeout;
        self
    }

    /// Sets whether invalid API server certificates are accepted.
    #[must_use]
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Discovers pods through the Kubernetes API server.
pub struct K8sDiscovery<T = KubeTransport, E = SystemEnvironment> {
    transport: Arc<T>,
    environment: E,
    default_lookup_timeout: Duration,
    shutdown: tokio_util::sync::CancellationToken,
}

impl K8sDiscovery {
    /// Creates discovery for the process environment.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no API server URL is configured and the process
    /// does not run inside a cluster, or if the client cannot be built.
    pub fn new(config: DiscoveryConfig) -> Result<Self> {
        Self::with_environment(config, SystemEnvironment)
    }
}

impl<E: Environment> K8sDiscovery<KubeTransport, E> {
    /// Creates discovery using the given environment for endpoint and token lookup.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no API server URL is configured or advertised,
    /// or if the client cannot be built.
    pub fn with_environment(config: DiscoveryConfig, environment: E) -> Result<Self> {
        let api_url = config
            .api_url
            .clone()
            .or_else(|| environment.service_endpoint())
            .ok_or_else(|| {
                Error::Config("no API server URL configured and not running in a cluster".into())
            })?;

        let transport = KubeTransport::new(&api_url, config.accept_invalid_certs)?;
        tracing::debug!("discovering pods through {api_url}");

        Ok(Self::from_parts(transport, environment, &config))
    }
}

impl<T: Transport, E: Environment> K8sDiscovery<T, E> {
    /// Creates discovery over an existing transport.
    ///
    /// `config.api_url` and `config.accept_invalid_certs` are not used; the transport
    /// already decides where and how requests are sent.
    #[must_use]
    pub fn from_parts(transport: T, environment: E, config: &DiscoveryConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            environment,
            default_lookup_timeout: config.default_lookup_timeout,
            shutdown: tokio_util::sync::CancellationToken::new(),
        }
    }

    // Only starts the token read; the file is read when the returned future runs.
    fn bearer_token(&self) -> Option<BoxFuture<'static, Option<String>>> {
        self.environment
            .running_in_cluster()
            .then(|| self.environment.bearer_token())
    }
}

async fn build_request(
    path: String,
    token: Option<BoxFuture<'static, Option<String>>>,
) -> Result<Request<Vec<u8>>> {
    let mut builder = Request::get(path);

    let token = match token {
        Some(token) => token.await,
        None => None,
    };

    if let Some(token) = token {
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                builder = builder.header(AUTHORIZATION, value);
            }
            Err(_) => tracing::warn!("ignoring service account token with invalid characters"),
        }
    }

    Ok(builder.body(Vec::new())?)
}

impl<T, E> std::fmt::Debug for K8sDiscovery<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("K8sDiscovery")
            .field("default_lookup_timeout", &self.default_lookup_timeout)
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<T: Transport, E: Environment> ServiceDiscovery for K8sDiscovery<T, E> {
    type Target = Target;
    type Instance = Instance;

    fn default_lookup_timeout(&self) -> Duration {
        self.default_lookup_timeout
    }

    fn lookup(
        &self,
        target: &Target,
        deadline: Option<Duration>,
    ) -> BoxFuture<'static, Result<Vec<Instance>>> {
        if self.shutdown.is_cancelled() {
            return futures::future::ready(Err(Error::Cancelled)).boxed();
        }

        let deadline = deadline.map(|d| Instant::now() + d);
        let path = target.path();
        let token = self.bearer_token();
        let transport = self.transport.clone();
        let shutdown = self.shutdown.clone();
        tracing::debug!("looking up pods for {target}");

        let fetch = async move {
            let request = build_request(path, token).await?;
            lookup(transport.as_ref(), request, deadline).await
        };

        async move {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => Err(Error::Cancelled),
                result = fetch => result,
            }
        }
        .boxed()
    }

    fn subscribe<N, C>(&self, target: &Target, on_next: N, on_complete: C) -> CancellationToken
    where
        N: FnMut(Result<Vec<Instance>>) + Send + 'static,
        C: FnOnce(CompletionReason) + Send + 'static,
    {
        let token = self.shutdown.child_token();

        if token.is_cancelled() {
            on_complete(CompletionReason::Cancelled);
            return CancellationToken::new(token);
        }

        let path = target.watch_path();
        let bearer_token = self.bearer_token();
        let transport = self.transport.clone();
        let cancel = token.clone();

        tokio::spawn(async move {
            match build_request(path, bearer_token).await {
                Ok(request) => session::run(transport, request, cancel, on_next, on_complete).await,
                Err(e) => {
                    tracing::error!("failed to build watch request: {e}");
                    on_complete(CompletionReason::Unavailable);
                }
            }
        });

        CancellationToken::new(token)
    }

    fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::debug!("shutting down pod discovery");
        }

        self.shutdown.cancel();
    }
}
