//! Event records handed from the host application to the relay.
//!
//! An [`EventRecord`] describes one captured chat message. It is immutable
//! once built: the host constructs it, hands it to an [`EventListener`]
//! and from then on the relay owns its delivery lifecycle.

mod payload;

pub use payload::Payload;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Canonical payload field holding the sender's name.
///
/// The relay may rename it on the wire (see `sender_field` in the relay config).
pub const SENDER_FIELD: &str = "player";
/// Canonical payload field holding the message text.
pub const MESSAGE_FIELD: &str = "message";
/// Canonical payload field holding the event time (RFC 3339, UTC).
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// One outbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    id: Uuid,
    source_key: String,
    payload: Payload,
    created_at: DateTime<Utc>,
}

impl EventRecord {
    /// Build a record with a fresh v4 id.
    pub fn new(source_key: impl Into<String>, payload: Payload, created_at: DateTime<Utc>) -> Self {
        Self::with_id(Uuid::new_v4(), source_key, payload, created_at)
    }

    /// Build a record with a caller-chosen id.
    pub fn with_id(
        id: Uuid,
        source_key: impl Into<String>,
        payload: Payload,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            source_key: source_key.into(),
            payload,
            created_at,
        }
    }

    /// Build the canonical chat-message record: `player`, `message`, `timestamp`.
    ///
    /// The sender's name doubles as the source key, so each sender gets
    /// their own delivery log.
    pub fn chat_message(
        sender: impl Into<String>,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let sender = sender.into();
        let payload = Payload::new()
            .with(SENDER_FIELD, sender.clone())
            .with(MESSAGE_FIELD, message)
            .with(
                TIMESTAMP_FIELD,
                at.to_rfc3339_opts(SecondsFormat::Millis, true),
            );
        Self::new(sender, payload, at)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Identity used to pick the record's log file.
    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Receiver of host events.
///
/// The host owns dispatch threading: implementors must not assume which
/// thread calls `on_event`, and must return without blocking it.
pub trait EventListener: Send + Sync {
    fn on_event(&self, record: EventRecord);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[test]
    fn chat_message_builds_canonical_payload() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let record = EventRecord::chat_message("Nova", "hi", at);

        assert_eq!(record.source_key(), "Nova");
        assert_eq!(record.payload().get(SENDER_FIELD), Some("Nova"));
        assert_eq!(record.payload().get(MESSAGE_FIELD), Some("hi"));
        assert_eq!(
            record.payload().get(TIMESTAMP_FIELD),
            Some("2025-06-01T12:00:00.000Z")
        );
        assert_eq!(record.created_at(), at);
    }

    #[test]
    fn each_record_gets_a_fresh_id() {
        let a = EventRecord::chat_message("Nova", "hi", Utc::now());
        let b = EventRecord::chat_message("Nova", "hi", Utc::now());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn with_id_keeps_caller_id() {
        let id = Uuid::new_v4();
        let record = EventRecord::with_id(id, "Nova", Payload::new(), Utc::now());
        assert_eq!(record.id(), id);
    }

    #[test]
    fn listener_is_object_safe() {
        struct Collect(Mutex<Vec<String>>);
        impl EventListener for Collect {
            fn on_event(&self, record: EventRecord) {
                self.0.lock().unwrap().push(record.source_key().to_string());
            }
        }

        let collector = Collect(Mutex::new(Vec::new()));
        let listener: &dyn EventListener = &collector;
        listener.on_event(EventRecord::chat_message("Nova", "hi", Utc::now()));
        assert_eq!(*collector.0.lock().unwrap(), vec!["Nova".to_string()]);
    }
}
