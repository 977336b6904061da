use std::collections::BTreeSet;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::actuator::ActuatorDriver;
use crate::ports::CommandSink;
use crate::types::{ActuatorState, StreamId};
use crate::worker::WorkerEvent;

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Outcome of offering one event to the [`Aggregator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The current cycle still needs more values.
    Pending,
    /// A cycle completed; `desired` is the AND of its values.
    Cycle { desired: bool, values: usize },
    /// The last active stream ended.
    Exhausted,
}

/// Fan-in reducer: one cycle is N received conditions, N being the number of
/// streams still alive.
///
/// Arrival order is irrelevant and values are not matched to streams, so a
/// fast stream may contribute twice to one cycle while a slow one contributes
/// nothing. Tombstones shrink N; if the values already held for the current
/// cycle meet the new N, the cycle completes immediately.
#[derive(Debug)]
pub struct Aggregator {
    active: BTreeSet<StreamId>,
    pending: Vec<bool>,
}

impl Aggregator {
    pub fn new(streams: impl IntoIterator<Item = StreamId>) -> Self {
        Self {
            active: streams.into_iter().collect(),
            pending: Vec::new(),
        }
    }

    /// Number of streams still contributing.
    pub fn active(&self) -> usize {
        self.active.len()
    }

    pub fn offer(&mut self, event: WorkerEvent) -> Step {
        match event {
            WorkerEvent::Condition { stream, holds } => {
                if !self.active.contains(&stream) {
                    tracing::debug!(stream = %stream, "ignoring condition from ended stream");
                    return Step::Pending;
                }
                self.pending.push(holds);
            }
            WorkerEvent::Ended { stream, reason } => {
                if !self.active.remove(&stream) {
                    return Step::Pending;
                }
                tracing::warn!(
                    stream = %stream,
                    reason = %reason,
                    remaining = self.active.len(),
                    "stream removed from aggregation"
                );
                if self.active.is_empty() {
                    self.pending.clear();
                    return Step::Exhausted;
                }
            }
        }
        self.try_complete()
    }

    fn try_complete(&mut self) -> Step {
        if self.pending.is_empty() || self.pending.len() < self.active.len() {
            return Step::Pending;
        }
        let values = self.pending.len();
        let desired = self.pending.drain(..).all(|holds| holds);
        Step::Cycle { desired, values }
    }
}

// ---------------------------------------------------------------------------
// ControlLoop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopExit {
    Cancelled,
    /// Every stream ended; nothing is left to aggregate.
    AllStreamsEnded,
    /// All senders dropped without tombstones.
    ChannelClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlSummary {
    pub exit: LoopExit,
    pub cycles: u64,
    pub commands_sent: u64,
    pub failed_sends: u64,
    pub final_state: ActuatorState,
}

/// Drains the fan-in channel, reduces each cycle with AND, and drives the
/// actuator on edges only.
///
/// `state` is the last command that was *successfully* sent. A failed send
/// leaves it untouched, so the next cycle that computes the same decision
/// attempts the same transition again; if the decision flips back first, the
/// failed command is simply abandoned. Repeated identical decisions never
/// re-send.
pub struct ControlLoop<S> {
    rx: mpsc::Receiver<WorkerEvent>,
    aggregator: Aggregator,
    driver: ActuatorDriver<S>,
    state: ActuatorState,
    cycles: u64,
    commands_sent: u64,
    failed_sends: u64,
}

impl<S: CommandSink> ControlLoop<S> {
    pub fn new(
        rx: mpsc::Receiver<WorkerEvent>,
        streams: impl IntoIterator<Item = StreamId>,
        driver: ActuatorDriver<S>,
    ) -> Self {
        Self {
            rx,
            aggregator: Aggregator::new(streams),
            driver,
            state: ActuatorState::Off,
            cycles: 0,
            commands_sent: 0,
            failed_sends: 0,
        }
    }

    /// Run until cancelled, until every stream has ended, or until the
    /// channel closes.
    pub async fn run(mut self, cancel: CancellationToken) -> ControlSummary {
        tracing::info!(
            streams = self.aggregator.active(),
            destination = %self.driver.destination(),
            "control loop started"
        );

        let exit = loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break LoopExit::Cancelled,
                event = self.rx.recv() => event,
            };
            let Some(event) = event else {
                break LoopExit::ChannelClosed;
            };

            match self.aggregator.offer(event) {
                Step::Pending => {}
                Step::Exhausted => break LoopExit::AllStreamsEnded,
                Step::Cycle { desired, values } => {
                    self.cycles += 1;
                    tracing::debug!(
                        cycle = self.cycles,
                        values,
                        desired,
                        state = %self.state,
                        "cycle complete"
                    );
                    if !self.apply(desired, &cancel).await {
                        break LoopExit::Cancelled;
                    }
                }
            }
        };

        let summary = self.summary(exit);
        tracing::info!(
            exit = ?summary.exit,
            cycles = summary.cycles,
            sent = summary.commands_sent,
            failed = summary.failed_sends,
            state = %summary.final_state,
            "control loop stopped"
        );
        summary
    }

    /// Apply one cycle's decision. Returns `false` if cancelled mid-send.
    async fn apply(&mut self, desired: bool, cancel: &CancellationToken) -> bool {
        let Some(turn_on) = self.state.transition_to(desired) else {
            return true;
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            result = self.driver.actuate(turn_on) => result,
        };

        match result {
            Ok(()) => {
                self.state = ActuatorState::from_on(turn_on);
                self.commands_sent += 1;
            }
            Err(e) => {
                self.failed_sends += 1;
                tracing::warn!(
                    error = %e,
                    turn_on,
                    state = %self.state,
                    "actuation failed; state unchanged until a later cycle succeeds"
                );
            }
        }
        true
    }

    fn summary(&self, exit: LoopExit) -> ControlSummary {
        ControlSummary {
            exit,
            cycles: self.cycles,
            commands_sent: self.commands_sent,
            failed_sends: self.failed_sends,
            final_state: self.state,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
