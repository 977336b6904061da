use synth_core::{SendError, SubscriptionError, SynthError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("host returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response line: {source}\n  line: {line}")]
    Parse {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed feed envelope: {0}")]
    Envelope(String),

    #[error("Process error: {0}")]
    Process(String),
}

impl From<LinkError> for SendError {
    fn from(e: LinkError) -> Self {
        match e {
            LinkError::Status { status, body } => SendError::Rejected { status, body },
            other => SendError::Transport(other.to_string()),
        }
    }
}

impl From<LinkError> for SubscriptionError {
    fn from(e: LinkError) -> Self {
        SubscriptionError::Transport(e.to_string())
    }
}

impl From<LinkError> for SynthError {
    fn from(e: LinkError) -> Self {
        SynthError::Discovery(e.to_string())
    }
}
