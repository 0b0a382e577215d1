//! The push event envelope.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Dotted-type prefix for bookmark change events.
pub const BOOKMARK_EVENT_PREFIX: &str = "bookmark.";

/// Dotted-type prefix for group change events.
pub const GROUP_EVENT_PREFIX: &str = "group.";

/// The kind of change an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// An entity was created.
    Created,
    /// An entity was updated.
    Updated,
    /// An entity was deleted.
    Deleted,
}

impl ChangeKind {
    /// Returns the dotted suffix for this kind.
    pub fn suffix(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// A push event as carried in an SSE `data:` payload.
///
/// `id` is a monotonic per-connection counter assigned by the stream
/// session, not a durable global sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Monotonic per-connection counter.
    #[serde(default)]
    pub id: u64,
    /// Dotted event name, e.g. `bookmark.created`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// The user this event belongs to.
    pub user_id: String,
    /// Entity kind, e.g. `bookmark` or `group`.
    pub entity: String,
    /// Identity of the changed entity, or `*` for coarse invalidation.
    pub target_id: String,
    /// Event time, unix milliseconds.
    pub timestamp: i64,
    /// Optional opaque payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

impl EventEnvelope {
    /// Creates an envelope for a bookmark change.
    pub fn bookmark(
        kind: ChangeKind,
        user_id: impl Into<String>,
        target_id: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: 0,
            event_type: format!("{BOOKMARK_EVENT_PREFIX}{}", kind.suffix()),
            user_id: user_id.into(),
            entity: "bookmark".into(),
            target_id: target_id.into(),
            timestamp,
            data: None,
        }
    }

    /// Creates an envelope for a group change.
    pub fn group(
        kind: ChangeKind,
        user_id: impl Into<String>,
        target_id: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: 0,
            event_type: format!("{GROUP_EVENT_PREFIX}{}", kind.suffix()),
            user_id: user_id.into(),
            entity: "group".into(),
            target_id: target_id.into(),
            timestamp,
            data: None,
        }
    }

    /// Attaches an opaque payload.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    /// Parses and validates an envelope from an SSE `data:` payload.
    ///
    /// Anything failing validation is malformed per the error taxonomy;
    /// callers drop such events and keep the stream alive.
    pub fn parse(payload: &str) -> ProtocolResult<Self> {
        let envelope: Self = serde_json::from_str(payload).map_err(ProtocolError::event)?;
        if envelope.event_type.is_empty() {
            return Err(ProtocolError::event("empty event type"));
        }
        if envelope.user_id.is_empty() {
            return Err(ProtocolError::event("empty user id"));
        }
        Ok(envelope)
    }

    /// True when this event should trigger a client reconciliation:
    /// a bookmark- or group-scoped change with a non-empty target.
    pub fn is_change_event(&self) -> bool {
        (self.event_type.starts_with(BOOKMARK_EVENT_PREFIX)
            || self.event_type.starts_with(GROUP_EVENT_PREFIX))
            && !self.target_id.is_empty()
    }

    /// Serializes the envelope for an SSE `data:` line.
    pub fn to_json(&self) -> String {
        // Serialization of a plain struct with string/number fields
        // cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bookmark_envelope_type() {
        let event = EventEnvelope::bookmark(ChangeKind::Created, "u1", "b1", 1000);
        assert_eq!(event.event_type, "bookmark.created");
        assert_eq!(event.entity, "bookmark");
        assert!(event.is_change_event());
    }

    #[test]
    fn group_envelope_type() {
        let event = EventEnvelope::group(ChangeKind::Deleted, "u1", "g1", 1000);
        assert_eq!(event.event_type, "group.deleted");
        assert!(event.is_change_event());
    }

    #[test]
    fn parse_round_trip() {
        let event = EventEnvelope::bookmark(ChangeKind::Updated, "u1", "b1", 1000);
        let parsed = EventEnvelope::parse(&event.to_json()).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn parse_rejects_invalid_json() {
        assert!(EventEnvelope::parse("not json").is_err());
        assert!(EventEnvelope::parse("{}").is_err());
    }

    #[test]
    fn parse_rejects_empty_type() {
        let json = r#"{"type":"","userId":"u1","entity":"bookmark","targetId":"b1","timestamp":1}"#;
        assert!(EventEnvelope::parse(json).is_err());
    }

    #[test]
    fn empty_target_is_not_a_change_event() {
        let mut event = EventEnvelope::bookmark(ChangeKind::Updated, "u1", "b1", 1000);
        event.target_id.clear();
        assert!(!event.is_change_event());
    }

    #[test]
    fn foreign_event_type_is_not_a_change_event() {
        let mut event = EventEnvelope::bookmark(ChangeKind::Updated, "u1", "b1", 1000);
        event.event_type = "presence.updated".into();
        assert!(!event.is_change_event());
    }
}
