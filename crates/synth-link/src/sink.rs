use std::io::Write;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use synth_core::actuator::encode_command;
use synth_core::{CommandPayload, CommandSink, InputRef, SendError};

use crate::error::LinkError;
use crate::rest::{check_status, RestClient};

// ─── RestCommandSink ──────────────────────────────────────────────────────

/// Sends commands as input messages from the synthesiser twin to the
/// actuator's input.
///
/// Body: `{"message": {"data": base64({"turn_on": bool}), "mime": "application/json"}}`.
pub struct RestCommandSink {
    client: RestClient,
    sender_twin: String,
}

impl RestCommandSink {
    pub fn new(client: RestClient, sender_twin: impl Into<String>) -> Self {
        Self {
            client,
            sender_twin: sender_twin.into(),
        }
    }

    async fn post(
        &self,
        destination: &InputRef,
        payload: &CommandPayload,
    ) -> Result<(), SendError> {
        let data = BASE64.encode(encode_command(payload)?);
        let body = serde_json::json!({
            "message": { "data": data, "mime": "application/json" }
        });
        let url = self.client.input_message_url(&self.sender_twin, destination);

        let resp = self
            .client
            .http()
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(LinkError::from)?;
        check_status(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl CommandSink for RestCommandSink {
    async fn send_command(
        &self,
        destination: &InputRef,
        payload: &CommandPayload,
    ) -> Result<(), SendError> {
        self.post(destination, payload).await
    }
}

// ─── LogSink ──────────────────────────────────────────────────────────────

/// Dry-run sink: prints each payload as one JSON line on stdout.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl CommandSink for LogSink {
    async fn send_command(
        &self,
        destination: &InputRef,
        payload: &CommandPayload,
    ) -> Result<(), SendError> {
        let bytes = encode_command(payload)?;
        tracing::debug!(destination = %destination, "dry run: command not delivered");
        write_line(&mut std::io::stdout().lock(), &bytes)
            .map_err(|e| SendError::Transport(format!("stdout: {e}")))
    }
}

fn write_line(out: &mut impl Write, bytes: &[u8]) -> std::io::Result<()> {
    out.write_all(bytes)?;
    out.write_all(b"\n")?;
    out.flush()
}

// ─── Tests ────────────────────────────────────────────────────────────────
