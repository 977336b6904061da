use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::decoder::decode_condition;
use crate::error::SubscriptionError;
use crate::ports::MessageSource;
use crate::types::{StreamId, StreamSpec};

// ─── Events ───────────────────────────────────────────────────────────────

/// What a worker publishes on the shared fan-in channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// One decoded condition from one message.
    Condition { stream: StreamId, holds: bool },
    /// Tombstone: the worker has stopped and will publish nothing else.
    Ended { stream: StreamId, reason: EndReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    SubscriptionClosed,
    SubscriptionFailed(String),
    DecodeFailed(String),
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndReason::SubscriptionClosed => f.write_str("subscription closed"),
            EndReason::SubscriptionFailed(e) => write!(f, "subscription failed: {e}"),
            EndReason::DecodeFailed(e) => write!(f, "decode failed: {e}"),
        }
    }
}

/// How a worker reacts to a message it cannot decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    /// Log and stop the worker.
    #[default]
    Terminate,
    /// Log, drop the message, and keep receiving.
    Skip,
}

/// Why [`StreamWorker::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    Cancelled,
    /// The control loop dropped its receiver.
    Detached,
    Ended(EndReason),
}

// ─── StreamWorker ─────────────────────────────────────────────────────────

/// Owns one subscription exclusively and turns its messages into conditions.
///
/// The only suspension points are the subscription receive and the channel
/// send; both also observe the cancellation token. Back-pressure comes solely
/// from the bounded channel: a full channel blocks this worker and, through
/// it, reading from the subscription.
pub struct StreamWorker<S> {
    id: StreamId,
    spec: StreamSpec,
    source: S,
    policy: DecodePolicy,
}

impl<S> StreamWorker<S>
where
    S: MessageSource + 'static,
{
    pub fn new(id: StreamId, spec: StreamSpec, source: S, policy: DecodePolicy) -> Self {
        Self {
            id,
            spec,
            source,
            policy,
        }
    }

    pub fn spawn(
        self,
        tx: mpsc::Sender<WorkerEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<WorkerExit> {
        tokio::spawn(self.run(tx, cancel))
    }

    pub async fn run(
        mut self,
        tx: mpsc::Sender<WorkerEvent>,
        cancel: CancellationToken,
    ) -> WorkerExit {
        let stream = self.id;
        let name = self.spec.name.clone();
        tracing::info!(stream = %name, feed = %self.spec.feed, "stream worker started");

        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return WorkerExit::Cancelled,
                next = self.source.next() => next,
            };

            let bytes = match next {
                None | Some(Err(SubscriptionError::Closed)) => break EndReason::SubscriptionClosed,
                Some(Err(e)) => break EndReason::SubscriptionFailed(e.to_string()),
                Some(Ok(bytes)) => bytes,
            };

            let holds = match decode_condition(&bytes, &self.spec.label, &self.spec.predicate) {
                Ok(holds) => holds,
                Err(e) => match self.policy {
                    DecodePolicy::Skip => {
                        tracing::warn!(stream = %name, error = %e, "dropping undecodable message");
                        continue;
                    }
                    DecodePolicy::Terminate => break EndReason::DecodeFailed(e.to_string()),
                },
            };
            tracing::debug!(stream = %name, holds, "condition decoded");

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return WorkerExit::Cancelled,
                sent = tx.send(WorkerEvent::Condition { stream, holds }) => sent,
            };
            if sent.is_err() {
                tracing::debug!(stream = %name, "aggregation channel closed; worker detaching");
                return WorkerExit::Detached;
            }
        };

        tracing::warn!(stream = %name, reason = %reason, "stream worker terminated");

        let tombstone = WorkerEvent::Ended {
            stream,
            reason: reason.clone(),
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return WorkerExit::Cancelled,
            sent = tx.send(tombstone) => {
                if sent.is_err() {
                    return WorkerExit::Detached;
                }
            }
        }

        WorkerExit::Ended(reason)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
