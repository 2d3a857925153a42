//! JSON body sent to the endpoint.
//!
//! ```text
//! {"id": "<uuid>", "player": "<string>", "message": "<string>", "timestamp": "<ISO-8601>"}
//! ```
//!
//! The record id always comes first, followed by the payload fields in the
//! order the host built them. The canonical `player` field is renamed to the
//! configured sender field.

use chat_event_record::{EventRecord, SENDER_FIELD};
use serde::ser::{Serialize, SerializeMap, Serializer};

const ID_FIELD: &str = "id";

/// Borrowed view of a record as it goes over the wire.
pub struct WirePayload<'a> {
    record: &'a EventRecord,
    sender_field: &'a str,
}

impl<'a> WirePayload<'a> {
    pub fn from_record(record: &'a EventRecord, sender_field: &'a str) -> Self {
        Self {
            record,
            sender_field,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    fn wire_name<'n>(&'n self, name: &'n str) -> Option<&'n str> {
        if name == ID_FIELD {
            return None;
        }
        if name == SENDER_FIELD {
            return Some(self.sender_field);
        }
        // A host field sharing the renamed sender's name would duplicate the key.
        if name == self.sender_field && self.record.payload().get(SENDER_FIELD).is_some() {
            return None;
        }
        Some(name)
    }
}

impl Serialize for WirePayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(ID_FIELD, &self.record.id().to_string())?;
        for (name, value) in self.record.payload().iter() {
            if let Some(wire_name) = self.wire_name(name) {
                map.serialize_entry(wire_name, value)?;
            }
        }
        map.end()
    }
}
