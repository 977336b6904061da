use thiserror::Error;

/// A feed message could not be turned into a condition.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("label '{0}' not present in payload")]
    MissingLabel(String),

    #[error("label '{label}' holds {found}, expected {expected}")]
    WrongType {
        label: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// The subscription behind a stream ended or broke.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("subscription closed")]
    Closed,

    #[error("subscription transport failed: {0}")]
    Transport(String),
}

/// An actuation command could not be delivered.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("failed to encode command payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("destination rejected command with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("command transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("config not found: {0}")]
    ConfigNotFound(String),

    #[error("no streams to follow")]
    NoStreams,

    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SynthError>;
