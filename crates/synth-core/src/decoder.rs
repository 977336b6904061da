//! Condition decoding: one feed message in, one boolean out.
//!
//! Pure functions with no retained state. Envelope unwrapping (base64
//! feed-data wrappers and the like) happens in the source adapter; by the time
//! bytes reach [`decode_condition`] they must be a plain JSON object.

use serde_json::Value;

use crate::error::DecodeError;
use crate::types::{Predicate, Reading};

/// Parse `payload`, extract `label`, and apply `predicate`.
pub fn decode_condition(
    payload: &[u8],
    label: &str,
    predicate: &Predicate,
) -> Result<bool, DecodeError> {
    let reading = extract_reading(payload, label)?;
    evaluate(label, reading, predicate)
}

/// Parse `payload` as a JSON object and pull out the value under `label`.
pub fn extract_reading(payload: &[u8], label: &str) -> Result<Reading, DecodeError> {
    let value: Value = serde_json::from_slice(payload)?;
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;
    let field = object
        .get(label)
        .ok_or_else(|| DecodeError::MissingLabel(label.to_string()))?;

    match field {
        Value::Bool(b) => Ok(Reading::Flag(*b)),
        Value::Number(n) => n.as_f64().map(Reading::Number).ok_or(DecodeError::WrongType {
            label: label.to_string(),
            expected: "a finite number",
            found: "an unrepresentable number",
        }),
        other => Err(DecodeError::WrongType {
            label: label.to_string(),
            expected: "a number or boolean",
            found: json_kind(other),
        }),
    }
}

/// Apply `predicate` to an extracted reading.
///
/// Numeric comparisons require a number and flag predicates require a
/// boolean; mixing the two is a [`DecodeError::WrongType`].
pub fn evaluate(label: &str, reading: Reading, predicate: &Predicate) -> Result<bool, DecodeError> {
    match (predicate, reading) {
        (Predicate::Compare { op, threshold }, Reading::Number(v)) => Ok(op.apply(v, *threshold)),
        (Predicate::Flag { expect }, Reading::Flag(b)) => Ok(b == *expect),
        (Predicate::Compare { .. }, other) => Err(DecodeError::WrongType {
            label: label.to_string(),
            expected: "a number",
            found: other.kind(),
        }),
        (Predicate::Flag { .. }, other) => Err(DecodeError::WrongType {
            label: label.to_string(),
            expected: "a boolean",
            found: other.kind(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
