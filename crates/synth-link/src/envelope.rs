use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;
use synth_core::Envelope;

use crate::error::LinkError;

/// Strip the transport wrapper from one feed message.
///
/// `FeedData` frames look like `{"feedData": {"data": "<base64 json>", ...}}`,
/// optionally nested one level deeper under `"payload"`.
pub fn unwrap_envelope(envelope: Envelope, raw: &[u8]) -> Result<Vec<u8>, LinkError> {
    match envelope {
        Envelope::Raw => Ok(raw.to_vec()),
        Envelope::FeedData => unwrap_feed_data(raw),
    }
}

fn unwrap_feed_data(raw: &[u8]) -> Result<Vec<u8>, LinkError> {
    let frame: Value = serde_json::from_slice(raw)
        .map_err(|e| LinkError::Envelope(format!("frame is not JSON: {e}")))?;

    let data = frame
        .pointer("/feedData/data")
        .or_else(|| frame.pointer("/payload/feedData/data"))
        .ok_or_else(|| LinkError::Envelope("no feedData.data in frame".into()))?;

    let encoded = data
        .as_str()
        .ok_or_else(|| LinkError::Envelope("feedData.data is not a string".into()))?;

    BASE64
        .decode(encoded.trim())
        .map_err(|e| LinkError::Envelope(format!("feedData.data is not base64: {e}")))
}
