use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::actuator::ActuatorDriver;
use crate::control::{ControlLoop, ControlSummary};
use crate::error::{Result, SynthError};
use crate::ports::{BoxedSource, CommandSink};
use crate::types::{StreamId, StreamSpec};
use crate::worker::{DecodePolicy, StreamWorker};

/// A stream together with its live subscription.
pub struct FollowedStream {
    pub spec: StreamSpec,
    pub source: BoxedSource,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AgentOptions {
    /// Fan-in channel capacity. Raised to the number of streams when smaller
    /// or absent.
    pub channel_capacity: Option<usize>,
    pub decode_policy: DecodePolicy,
}

/// Run one synthesiser: N stream workers feeding one control loop.
///
/// Returns when `cancel` fires or when every stream has ended. Workers still
/// running at that point are cancelled and joined before returning.
pub async fn run_agent<S>(
    streams: Vec<FollowedStream>,
    driver: ActuatorDriver<S>,
    options: AgentOptions,
    cancel: CancellationToken,
) -> Result<ControlSummary>
where
    S: CommandSink,
{
    if streams.is_empty() {
        return Err(SynthError::NoStreams);
    }

    let n = streams.len();
    let capacity = match options.channel_capacity {
        Some(cap) if cap >= n => cap,
        Some(cap) => {
            tracing::warn!(requested = cap, streams = n, "channel capacity raised to stream count");
            n
        }
        None => n,
    };
    let (tx, rx) = mpsc::channel(capacity);

    let workers_cancel = cancel.child_token();
    let mut ids = Vec::with_capacity(n);
    let mut handles = Vec::with_capacity(n);
    for (i, followed) in streams.into_iter().enumerate() {
        let id = StreamId(i);
        ids.push(id);
        let worker = StreamWorker::new(id, followed.spec, followed.source, options.decode_policy);
        handles.push(worker.spawn(tx.clone(), workers_cancel.clone()));
    }
    // Only workers hold senders: the channel closes once they have all gone.
    drop(tx);

    let summary = ControlLoop::new(rx, ids, driver).run(cancel).await;

    workers_cancel.cancel();
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "stream worker panicked");
        }
    }

    Ok(summary)
}
