//! One-shot resolution of the pods behind a target.

use bytes::BytesMut;
use futures::TryStreamExt;
use http::Request;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::instance::{Instance, PodList};
use crate::transport::Transport;

/// Lists the pods for `request` and returns those with an address.
///
/// `deadline` bounds the whole exchange, body included, and is checked before
/// the response so a lookup awaited past its deadline fails even if the
/// response is already available. Without one, the transport's own timeouts apply.
pub(crate) async fn lookup<T>(
    transport: &T,
    request: Request<Vec<u8>>,
    deadline: Option<Instant>,
) -> Result<Vec<Instance>>
where
    T: Transport + ?Sized,
{
    let body = match deadline {
        Some(deadline) => tokio::select! {
            biased;
            () = tokio::time::sleep_until(deadline) => {
                tracing::warn!("pod lookup exceeded its deadline");
                return Err(Error::Timeout);
            }
            body = fetch(transport, request) => body?,
        },
        None => fetch(transport, request).await?,
    };

    if body.is_empty() {
        return Ok(Vec::new());
    }

    let instances = PodList::from_slice(&body)?.into_instances();
    tracing::debug!("pod lookup found {} instances", instances.len());
    Ok(instances)
}

async fn fetch<T>(transport: &T, request: Request<Vec<u8>>) -> Result<BytesMut>
where
    T: Transport + ?Sized,
{
    let response = transport.execute(request).await.map_err(|e| {
        tracing::warn!("pod lookup request failed: {e}");
        Error::Timeout
    })?;

    let status = response.status();
    if !status.is_success() {
        tracing::error!("Kubernetes API server rejected pod lookup: {status}");
        return Err(Error::Unavailable(status));
    }

    let mut body = BytesMut::new();
    let mut chunks = response.into_body();

    while let Some(chunk) = chunks.try_next().await.map_err(|e| {
        tracing::warn!("pod lookup response failed: {e}");
        Error::Timeout
    })? {
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}
