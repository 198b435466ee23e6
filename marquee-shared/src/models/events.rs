use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Topic the lifecycle feed is published on.
pub const HOLD_LIFECYCLE_TOPIC: &str = "holds.lifecycle";

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldEventKind {
    Created,
    Confirmed,
    Released,
    Expired,
}

/// Emitted once per hold state change.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
pub struct HoldEvent {
    pub hold_id: Uuid,
    pub resource_id: String,
    pub kind: HoldEventKind,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub occurred_at: i64,
}

impl HoldEvent {
    pub fn topic_key(&self) -> &str {
        &self.resource_id
    }

    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
