//! Serialization of drained notifications for hosts that talk JSON.

use crate::events::GameEvent;

/// Serialize a batch of drained notifications as a JSON array.
pub fn events_to_json_string(events: &[GameEvent]) -> Result<String, serde_json::Error> {
    serde_json::to_string(events)
}
