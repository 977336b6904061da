//! Port traits - the boundary between the core and the platform.
//!
//! ```text
//!   subscription ──▶ MessageSource ──▶ StreamWorker
//!   ControlLoop  ──▶ ActuatorDriver ──▶ CommandSink ──▶ actuator input
//!   startup      ──▶ TwinSearch ──▶ [FeedRef], InputRef
//! ```
//!
//! Adapters in `synth-link` implement these against the real platform; tests
//! implement them with channels and recorders.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;

use crate::discovery::{DiscoveredTwin, DiscoveryQuery};
use crate::error::{Result, SendError, SubscriptionError};
use crate::types::{CommandPayload, InputRef};

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// A live subscription to one feed.
///
/// Yields raw message bytes until the subscription ends. `None` or
/// `Some(Err(_))` both end the owning worker.
pub trait MessageSource:
    Stream<Item = std::result::Result<Vec<u8>, SubscriptionError>> + Send + Unpin
{
}

impl<T> MessageSource for T where
    T: Stream<Item = std::result::Result<Vec<u8>, SubscriptionError>> + Send + Unpin + ?Sized
{
}

/// Type-erased source, for agents following heterogeneous subscriptions.
pub type BoxedSource =
    Pin<Box<dyn Stream<Item = std::result::Result<Vec<u8>, SubscriptionError>> + Send>>;

// ---------------------------------------------------------------------------
// Actuation
// ---------------------------------------------------------------------------

/// One-shot delivery of a command payload to an actuator input.
///
/// Implementations must not retry internally. A failed send is reported as
/// [`SendError`] and the control loop re-attempts the transition on the next
/// cycle that still wants it.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn send_command(
        &self,
        destination: &InputRef,
        payload: &CommandPayload,
    ) -> std::result::Result<(), SendError>;
}

#[async_trait]
impl<T: CommandSink + ?Sized> CommandSink for Box<T> {
    async fn send_command(
        &self,
        destination: &InputRef,
        payload: &CommandPayload,
    ) -> std::result::Result<(), SendError> {
        (**self).send_command(destination, payload).await
    }
}

#[async_trait]
impl<T: CommandSink + ?Sized> CommandSink for Arc<T> {
    async fn send_command(
        &self,
        destination: &InputRef,
        payload: &CommandPayload,
    ) -> std::result::Result<(), SendError> {
        (**self).send_command(destination, payload).await
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Metadata search over twins. Used once at startup.
#[async_trait]
pub trait TwinSearch: Send + Sync {
    async fn search(&self, query: &DiscoveryQuery) -> Result<Vec<DiscoveredTwin>>;
}
