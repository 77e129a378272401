//! Discovered pods and their wire representation.

use std::fmt;

use k8s_openapi::api::core::v1::Pod;
use serde::Deserialize;

/// A discovered pod: its name and the IP address it was assigned.
///
/// Name and address together form the identity. A restarted pod may come back
/// under a new name, a new address, or both, and is then a different instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Instance {
    name: String,
    address: String,
}

impl Instance {
    /// Creates an instance from a name and an address.
    #[must_use]
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// The pod name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pod IP address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Converts a pod record into an instance.
    ///
    /// Returns `None` for pods that have no name or have not been assigned an IP yet.
    pub(crate) fn from_pod(pod: Pod) -> Option<Self> {
        let name = pod.metadata.name?;
        let address = pod.status.and_then(|status| status.pod_ip)?;

        Some(Self { name, address })
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Body of a pod list response.
#[derive(Debug, Deserialize)]
pub(crate) struct PodList {
    items: Vec<Pod>,
}

impl PodList {
    /// Decodes a list response body.
    pub(crate) fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    /// Instances for every pod that has an address, in response order.
    pub(crate) fn into_instances(self) -> Vec<Instance> {
        self.items.into_iter().filter_map(Instance::from_pod).collect()
    }
}
