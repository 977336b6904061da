//! `synth-core` - the decision core of a twin synthesiser.
//!
//! Follows N independently updating feeds, reduces them to one boolean per
//! cycle, and drives a single actuator only when that boolean changes.
//!
//! # Architecture
//!
//! ```text
//! MessageSource ─▶ StreamWorker ─┐
//! MessageSource ─▶ StreamWorker ─┼─▶ bounded mpsc ─▶ ControlLoop ─▶ ActuatorDriver ─▶ CommandSink
//! MessageSource ─▶ StreamWorker ─┘   (WorkerEvent)     (AND, edges)
//! ```
//!
//! Each worker owns its subscription exclusively and decodes messages with
//! [`decoder::decode_condition`]. The bounded channel is the only shared
//! structure. Workers announce their own termination with a tombstone so the
//! control loop shrinks its cycle instead of waiting forever.
//!
//! Platform specifics (subscription transport, REST actuation, twin search)
//! live behind the traits in [`ports`]; see the `synth-link` crate.

pub mod actuator;
pub mod agent;
pub mod config;
pub mod control;
pub mod decoder;
pub mod discovery;
pub mod error;
pub mod ports;
pub mod types;
pub mod worker;

pub use actuator::ActuatorDriver;
pub use agent::{run_agent, AgentOptions, FollowedStream};
pub use control::{Aggregator, ControlLoop, ControlSummary, LoopExit};
pub use discovery::{
    discover_input, discover_streams, DiscoveredTwin, DiscoveryQuery, PropertyFilter, SearchScope,
};
pub use error::{DecodeError, Result, SendError, SubscriptionError, SynthError};
pub use ports::{BoxedSource, CommandSink, MessageSource, TwinSearch};
pub use types::{
    ActuatorState, CommandPayload, Comparison, Envelope, FeedRef, InputRef, Predicate, StreamId,
    StreamSpec, TwinRef,
};
pub use worker::{DecodePolicy, StreamWorker, WorkerEvent};
