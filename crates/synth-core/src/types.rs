use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Twin / feed / input references
// ---------------------------------------------------------------------------

/// A twin on some host. `host_id` is `None` for twins on the local host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TwinRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<String>,
    pub twin_id: String,
}

impl TwinRef {
    pub fn local(twin_id: impl Into<String>) -> Self {
        Self {
            host_id: None,
            twin_id: twin_id.into(),
        }
    }

    pub fn remote(host_id: impl Into<String>, twin_id: impl Into<String>) -> Self {
        Self {
            host_id: Some(host_id.into()),
            twin_id: twin_id.into(),
        }
    }
}

impl fmt::Display for TwinRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host_id {
            Some(host) => write!(f, "{host}/{}", self.twin_id),
            None => f.write_str(&self.twin_id),
        }
    }
}

/// One feed of one twin: the thing a stream worker subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedRef {
    #[serde(flatten)]
    pub twin: TwinRef,
    pub feed_id: String,
}

impl fmt::Display for FeedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.twin, self.feed_id)
    }
}

/// One input of one twin: where actuation commands are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputRef {
    #[serde(flatten)]
    pub twin: TwinRef,
    pub input_id: String,
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.twin, self.input_id)
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    /// Evaluate `value <op> threshold`.
    pub fn apply(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::Lt => value < threshold,
            Comparison::Le => value <= threshold,
            Comparison::Gt => value > threshold,
            Comparison::Ge => value >= threshold,
            Comparison::Eq => value == threshold,
            Comparison::Ne => value != threshold,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }
}

/// Threshold test applied to the labelled value of each message.
///
/// In YAML this is either `{ op: le, threshold: 15 }` for numeric fields or
/// `{ expect: true }` for boolean fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Predicate {
    Compare { op: Comparison, threshold: f64 },
    Flag { expect: bool },
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { op, threshold } => write!(f, "{} {threshold}", op.as_str()),
            Predicate::Flag { expect } => write!(f, "== {expect}"),
        }
    }
}

/// A value pulled out of a feed message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Number(f64),
    Flag(bool),
}

impl Reading {
    pub fn kind(&self) -> &'static str {
        match self {
            Reading::Number(_) => "a number",
            Reading::Flag(_) => "a boolean",
        }
    }
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// How feed bytes are wrapped when they arrive from the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Envelope {
    /// The message is the JSON object itself.
    #[default]
    Raw,
    /// Platform feed-data wrapper with base64 JSON under `feedData.data`.
    FeedData,
}

/// Dense index of a stream within one agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(pub usize);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One remote feed to follow, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSpec {
    pub name: String,
    pub feed: FeedRef,
    /// Key of the value to extract from each message.
    pub label: String,
    pub predicate: Predicate,
    pub envelope: Envelope,
}

// ---------------------------------------------------------------------------
// Actuation
// ---------------------------------------------------------------------------

/// The actuator state the control loop believes is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorState {
    #[default]
    Off,
    On,
}

impl ActuatorState {
    pub fn from_on(on: bool) -> Self {
        if on {
            ActuatorState::On
        } else {
            ActuatorState::Off
        }
    }

    /// The command needed to reach `desired`, or `None` when already there.
    pub fn transition_to(self, desired: bool) -> Option<bool> {
        match (self, desired) {
            (ActuatorState::Off, true) => Some(true),
            (ActuatorState::On, false) => Some(false),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActuatorState::Off => "off",
            ActuatorState::On => "on",
        }
    }
}

impl fmt::Display for ActuatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire payload delivered to the actuator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPayload {
    pub turn_on: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
