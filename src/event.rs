//! Decoding of individual watch events.

use k8s_openapi::api::core::v1::Pod;
use serde::Deserialize;

/// Kind of change carried by a watch event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    /// A pod started matching the selector.
    Added,
    /// A matching pod changed.
    Modified,
    /// A pod was deleted or stopped matching the selector.
    Deleted,
}

/// One decoded line of a watch stream.
#[derive(Clone, Debug, Deserialize)]
pub struct UpdateEvent {
    /// What happened to the pod.
    #[serde(rename = "type")]
    pub operation: Operation,

    /// The pod as of this event.
    #[serde(rename = "object")]
    pub pod: Pod,
}

/// Decodes a single framed watch message.
///
/// # Errors
///
/// Returns an error if the message is not a JSON object with an `ADDED`,
/// `MODIFIED` or `DELETED` type and a pod object.
pub fn decode_event(message: &[u8]) -> serde_json::Result<UpdateEvent> {
    serde_json::from_slice(message)
}
