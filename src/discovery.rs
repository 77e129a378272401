//! The backend-independent discovery interface.

use std::collections::HashMap;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::{CompletionReason, Error, Result};
use crate::instance::Instance;
use crate::target::Target;

/// Resolves and watches the instances behind a target.
pub trait ServiceDiscovery: Send + Sync {
    /// What to look up.
    type Target;

    /// What a lookup resolves to.
    type Instance;

    /// Deadline applied by [`lookup_with_default_timeout`](Self::lookup_with_default_timeout).
    fn default_lookup_timeout(&self) -> Duration;

    /// Resolves the current instances for `target`.
    ///
    /// The deadline runs from this call, not from when the future is first polled.
    /// Without a deadline the backend's own timeouts apply.
    fn lookup(
        &self,
        target: &Self::Target,
        deadline: Option<Duration>,
    ) -> BoxFuture<'static, Result<Vec<Self::Instance>>>;

    /// Resolves the current instances, bounded by [`default_lookup_timeout`](Self::default_lookup_timeout).
    fn lookup_with_default_timeout(
        &self,
        target: &Self::Target,
    ) -> BoxFuture<'static, Result<Vec<Self::Instance>>> {
        self.lookup(target, Some(self.default_lookup_timeout()))
    }

    /// Watches `target`, reporting newly present instances through `on_next`.
    ///
    /// `on_complete` is called exactly once when the subscription ends, and
    /// `on_next` is never called after it. Must be called within a Tokio runtime.
    fn subscribe<N, C>(
        &self,
        target: &Self::Target,
        on_next: N,
        on_complete: C,
    ) -> CancellationToken
    where
        N: FnMut(Result<Vec<Self::Instance>>) + Send + 'static,
        C: FnOnce(CompletionReason) + Send + 'static;

    /// Cancels every subscription and fails later calls with [`Error::Cancelled`].
    fn shutdown(&self);
}

/// Handle to a subscription.
///
/// Cancelling is idempotent; clones share the same subscription.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    token: tokio_util::sync::CancellationToken,
}

impl CancellationToken {
    pub(crate) fn new(token: tokio_util::sync::CancellationToken) -> Self {
        Self { token }
    }

    /// Stops the subscription. Does nothing if it is already cancelled.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the subscription was cancelled, directly or by a shutdown.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Discovery over a fixed list of instances per target.
///
/// Useful in tests and for environments without a Kubernetes API server.
#[derive(Debug, Default)]
pub struct FixedDiscovery {
    instances: HashMap<Target, Vec<Instance>>,
    shutdown: tokio_util::sync::CancellationToken,
}

impl FixedDiscovery {
    /// Lookup deadline reported by [`ServiceDiscovery::default_lookup_timeout`].
    pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(1);

    /// Creates a backend that knows no targets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend resolving `target` to one instance per host, named after the host.
    #[must_use]
    pub fn from_hosts<I, S>(target: Target, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let instances = hosts
            .into_iter()
            .map(|host| {
                let host = host.into();
                Instance::new(host.clone(), host)
            })
            .collect();

        Self::new().with_instances(target, instances)
    }

    /// Registers the instances `target` resolves to.
    #[must_use]
    pub fn with_instances(mut self, target: Target, instances: Vec<Instance>) -> Self {
        self.instances.insert(target, instances);
        self
    }

    fn resolve(&self, target: &Target) -> Result<Vec<Instance>> {
        if self.shutdown.is_cancelled() {
            return Err(Error::Cancelled);
        }

        Ok(self.instances.get(target).cloned().unwrap_or_default())
    }
}

impl ServiceDiscovery for FixedDiscovery {
    type Target = Target;
    type Instance = Instance;

    fn default_lookup_timeout(&self) -> Duration {
        Self::DEFAULT_LOOKUP_TIMEOUT
    }

    fn lookup(
        &self,
        target: &Target,
        _deadline: Option<Duration>,
    ) -> BoxFuture<'static, Result<Vec<Instance>>> {
        futures::future::ready(self.resolve(target)).boxed()
    }

    fn subscribe<N, C>(&self, target: &Target, mut on_next: N, on_complete: C) -> CancellationToken
    where
        N: FnMut(Result<Vec<Instance>>) + Send + 'static,
        C: FnOnce(CompletionReason) + Send + 'static,
    {
        let token = self.shutdown.child_token();

        let Ok(instances) = self.resolve(target) else {
            on_complete(CompletionReason::Cancelled);
            return CancellationToken::new(token);
        };

        let cancelled = token.clone();
        tokio::spawn(async move {
            if !cancelled.is_cancelled() {
                on_next(Ok(instances));
            }

            cancelled.cancelled().await;
            on_complete(CompletionReason::Cancelled);
        });

        CancellationToken::new(token)
    }

    fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
