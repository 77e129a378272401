#![deny(missing_docs)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Kubernetes pod discovery by label selector.
//!
//! Resolves the pods behind a label selector either once, by listing them, or
//! continuously, by watching the pods API and reporting each pod as soon as it
//! has been assigned an IP address.
//!
//! # Features
//!
//! - **One-shot lookups**: List the current pods with an optional deadline
//! - **Streaming watches**: Newline-delimited watch events are framed, decoded and
//!   deduplicated so each pod is reported once per appearance
//! - **Cancellation**: Every subscription returns a handle; cancelling is idempotent
//! - **Pluggable backends**: [`ServiceDiscovery`] is implemented by the Kubernetes backend
//!   and by a fixed list for tests
//!
//! # Usage
//!
//! ```ignore
//! use k8s_pod_discovery::{DiscoveryConfig, K8sDiscovery, ServiceDiscovery, Target};
//!
//! // Inside a pod the API server and token are found automatically
//! let discovery = K8sDiscovery::new(DiscoveryConfig::new())?;
//! let target = Target::new([("app", "nginx")]).in_namespace("web");
//!
//! let token = discovery.subscribe(
//!     &target,
//!     |result| {
//!         if let Ok(pods) = result {
//!             for pod in pods {
//!                 println!("{} is at {}", pod.name(), pod.address());
//!             }
//!         }
//!     },
//!     |reason| println!("watch ended ({reason}), resubscribe if still needed"),
//! );
//!
//! // Later
//! token.cancel();
//! ```
//!
//! Watches never reconnect on their own. A watch that ends as
//! [`CompletionReason::Completed`] or [`CompletionReason::Unavailable`] should be
//! re-established by the caller if still needed. Only additions are reported;
//! deletions just make a pod eligible to be reported again.

mod discovery;
mod environment;
mod error;
mod event;
mod frame;
mod instance;
mod k8s;
mod lookup;
mod membership;
mod session;
mod target;
#[cfg(test)]
mod testing;
mod transport;

pub use discovery::{CancellationToken, FixedDiscovery, ServiceDiscovery};
pub use environment::{
    Environment, SERVICE_HOST_ENV, SERVICE_PORT_ENV, SystemEnvironment, TOKEN_PATH,
};
pub use error::{BoxError, CompletionReason, Error, Result};
pub use event::{Operation, UpdateEvent, decode_event};
pub use frame::FrameBuffer;
pub use instance::Instance;
pub use k8s::{DiscoveryConfig, K8sDiscovery};
pub use membership::MembershipCache;
pub use session::{SessionState, WatchSession};
pub use target::Target;
pub use transport::{ByteStream, KubeTransport, Transport};
