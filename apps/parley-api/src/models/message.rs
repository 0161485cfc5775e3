use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted chat message. Immutable once stored.
///
/// `seq` is the per-room sequence number: strictly increasing from 1 with
/// no gaps, assigned atomically at persistence time. `sender` is the display
/// name denormalized at save time so history pages are self-contained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub room_id: i64,
    pub seq: i64,
    pub sender_id: String,
    pub sender: String,
    pub body: String,
    #[serde(rename = "type")]
    pub kind: i16,
    pub status: i16,
    pub ts: DateTime<Utc>,
}
