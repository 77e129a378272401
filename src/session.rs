//! Watch sessions over a streaming pods response.
//!
//! A [`WatchSession`] is the protocol core of a watch. It frames the response body
//! into lines, decodes each line into an [`UpdateEvent`](crate::UpdateEvent) and runs
//! it through a [`MembershipCache`], yielding the instances to report. It performs no
//! I/O itself; the discovery backends drive one over a [`Transport`].
//!
//! # States
//!
//! ```text
//! Connecting --(status < 400)--> Streaming --(body ends)--> Closed(Completed)
//!     |                              |
//!     +--(status >= 400)-------------+--(transport error)--> Closed(Unavailable)
//!
//! any state --(cancel)--> Closed(Cancelled)
//! ```

use std::sync::Arc;

use futures::StreamExt;
use http::{Request, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::error::{CompletionReason, Result};
use crate::event::decode_event;
use crate::frame::FrameBuffer;
use crate::instance::Instance;
use crate::membership::MembershipCache;
use crate::transport::Transport;

/// Lifecycle state of a [`WatchSession`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    /// The request is in flight and no response head has arrived.
    #[default]
    Connecting,
    /// The API server accepted the watch and body chunks are being processed.
    Streaming,
    /// The session ended. No further notifications are produced.
    Closed(CompletionReason),
}

/// Protocol state of a single watch.
#[derive(Debug, Default)]
pub struct WatchSession {
    state: SessionState,
    frames: FrameBuffer,
    members: MembershipCache,
}

impl WatchSession {
    /// Creates a session in the [`SessionState::Connecting`] state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Instances currently known to be present.
    #[must_use]
    pub fn members(&self) -> &MembershipCache {
        &self.members
    }

    /// Handles the response status and returns the resulting state.
    ///
    /// Any status of 400 or above closes the session as unavailable.
    pub fn on_head(&mut self, status: StatusCode) -> SessionState {
        if self.state == SessionState::Connecting {
            self.state = if status.as_u16() >= 400 {
                SessionState::Closed(CompletionReason::Unavailable)
            } else {
                SessionState::Streaming
            };
        }

        self.state
    }

    /// Processes a body chunk and returns newly present instances in stream order.
    ///
    /// Malformed messages are logged and skipped. Chunks arriving outside the
    /// streaming state are ignored.
    pub fn on_chunk(&mut self, chunk: &[u8]) -> Vec<Instance> {
        if self.state != SessionState::Streaming {
            return Vec::new();
        }

        self.frames.extend(chunk);
        let mut found = Vec::new();

        for message in self.frames.extract_ready_messages() {
            if message.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match decode_event(&message) {
                Ok(event) => found.extend(self.members.observe(event)),
                Err(e) => tracing::warn!(
                    "skipping malformed watch event ({e}): {}",
                    String::from_utf8_lossy(&message)
                ),
            }
        }

        found
    }

    /// Closes the session and returns the reason it ended.
    ///
    /// Closing an already closed session keeps the original reason.
    pub fn close(&mut self, reason: CompletionReason) -> CompletionReason {
        if let SessionState::Closed(existing) = self.state {
            return existing;
        }

        if !self.frames.is_empty() {
            tracing::debug!(
                "discarding {} bytes of incomplete watch event",
                self.frames.len()
            );
        }

        self.frames.clear();
        self.members.clear();
        self.state = SessionState::Closed(reason);
        reason
    }

    async fn stream<T, N>(
        &mut self,
        transport: &T,
        request: Request<Vec<u8>>,
        on_next: &mut N,
    ) -> CompletionReason
    where
        T: Transport + ?Sized,
        N: FnMut(Result<Vec<Instance>>),
    {
        let response = match transport.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("watch request to Kubernetes API server failed: {e}");
                return CompletionReason::Unavailable;
            }
        };

        let status = response.status();
        if let SessionState::Closed(reason) = self.on_head(status) {
            tracing::error!("Kubernetes API server rejected watch: {status}");
            return reason;
        }

        tracing::debug!("watch established: {status}");
        let mut body = response.into_body();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::error!("watch stream from Kubernetes API server failed: {e}");
                    return CompletionReason::Unavailable;
                }
            };

            for instance in self.on_chunk(&chunk) {
                on_next(Ok(vec![instance]));
            }

            tracing::debug!("watch knows {} instances", self.members.len());
        }

        CompletionReason::Completed
    }
}

/// Runs a watch to completion, reporting new instances through `on_next`.
///
/// `on_complete` is called exactly once, after the last `on_next`.
pub(crate) async fn run<T, N, C>(
    transport: Arc<T>,
    request: Request<Vec<u8>>,
    cancel: CancellationToken,
    mut on_next: N,
    on_complete: C,
) where
    T: Transport + ?Sized,
    N: FnMut(Result<Vec<Instance>>),
    C: FnOnce(CompletionReason),
{
    let mut session = WatchSession::new();
    tracing::debug!("starting watch: {}", request.uri());

    let reason = tokio::select! {
        biased;
        () = cancel.cancelled() => CompletionReason::Cancelled,
        reason = session.stream(transport.as_ref(), request, &mut on_next) => reason,
    };

    let reason = session.close(reason);
    tracing::debug!("watch closed: {reason}");
    on_complete(reason);
}
