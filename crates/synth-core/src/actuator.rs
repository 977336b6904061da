use crate::error::SendError;
use crate::ports::CommandSink;
use crate::types::{CommandPayload, InputRef};

/// Serialise a command payload to the agreed wire bytes: `{"turn_on": <bool>}`.
pub fn encode_command(payload: &CommandPayload) -> Result<Vec<u8>, SendError> {
    Ok(serde_json::to_vec(payload)?)
}

/// Delivers on/off commands to one fixed actuator input.
///
/// The driver is stateless: deciding *whether* to send is the control loop's
/// job. Each [`actuate`](Self::actuate) call is exactly one send attempt with
/// no retry and no acknowledgement read back.
pub struct ActuatorDriver<S> {
    sink: S,
    destination: InputRef,
}

impl<S: CommandSink> ActuatorDriver<S> {
    pub fn new(sink: S, destination: InputRef) -> Self {
        Self { sink, destination }
    }

    pub fn destination(&self) -> &InputRef {
        &self.destination
    }

    pub async fn actuate(&self, turn_on: bool) -> Result<(), SendError> {
        let payload = CommandPayload { turn_on };
        self.sink.send_command(&self.destination, &payload).await?;
        tracing::info!(destination = %self.destination, turn_on, "actuation command sent");
        Ok(())
    }
}
