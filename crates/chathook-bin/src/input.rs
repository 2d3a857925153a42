//! Event lines read from stdin.
//!
//! One JSON object per line:
//!
//! ```text
//! {"player": "Nova", "message": "hi", "timestamp": "2025-06-01T12:00:00Z", "world": "overworld"}
//! ```
//!
//! `timestamp` is optional (defaults to the time the line was read); any
//! other fields are carried through as extra payload fields.

use chat_event_record::{EventRecord, MESSAGE_FIELD, SENDER_FIELD, TIMESTAMP_FIELD};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("not a JSON object: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object")]
    NotAnObject,

    #[error("missing or non-string field '{0}'")]
    MissingField(&'static str),

    #[error("invalid timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Turn one input line into a chat-message record.
pub fn parse_event_line(line: &str, now: DateTime<Utc>) -> Result<EventRecord, InputError> {
    let value: Value = serde_json::from_str(line)?;
    let Value::Object(mut fields) = value else {
        return Err(InputError::NotAnObject);
    };

    let player = take_string(&mut fields, SENDER_FIELD)?;
    let message = take_string(&mut fields, MESSAGE_FIELD)?;
    let at = match fields.remove(TIMESTAMP_FIELD) {
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|source| InputError::Timestamp { value: raw, source })?,
        Some(_) => return Err(InputError::MissingField(TIMESTAMP_FIELD)),
        None => now,
    };

    let record = EventRecord::chat_message(player, message, at);
    if fields.is_empty() {
        return Ok(record);
    }

    let mut payload = record.payload().clone();
    for (name, value) in fields {
        let text = match value {
            Value::String(text) => text,
            other => other.to_string(),
        };
        payload.set(name, text);
    }
    Ok(EventRecord::with_id(
        record.id(),
        record.source_key(),
        payload,
        record.created_at(),
    ))
}

fn take_string(fields: &mut Map<String, Value>, name: &'static str) -> Result<String, InputError> {
    match fields.remove(name) {
        Some(Value::String(text)) if !text.is_empty() || name == MESSAGE_FIELD => Ok(text),
        _ => Err(InputError::MissingField(name)),
    }
}
