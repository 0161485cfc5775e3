//! Gateway opcodes, event names, and wire-format messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

pub const OP_DISPATCH: u8 = 0;
pub const OP_HEARTBEAT: u8 = 1;
pub const OP_IDENTIFY: u8 = 2;
pub const OP_EVENT: u8 = 3;
pub const OP_HEARTBEAT_ACK: u8 = 6;
pub const OP_REJECT: u8 = 8;

// ---------------------------------------------------------------------------
// Server → Client message
// ---------------------------------------------------------------------------

/// A message sent from the server to the client over WebSocket.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayMessage {
    pub op: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    pub d: Value,
}

impl GatewayMessage {
    /// Build a DISPATCH message (op=0).
    pub fn dispatch(event_name: &str, seq: u64, data: Value) -> Self {
        Self {
            op: OP_DISPATCH,
            t: Some(event_name.to_string()),
            s: Some(seq),
            d: data,
        }
    }

    /// Build a REJECT message (op=8) answering one offending client event.
    pub fn reject(event_name: &str, code: &str, message: &str) -> Self {
        Self {
            op: OP_REJECT,
            t: Some(event_name.to_string()),
            s: None,
            d: serde_json::json!({ "code": code, "message": message }),
        }
    }

    /// Build a HEARTBEAT_ACK message (op=6).
    pub fn heartbeat_ack(seq: u64) -> Self {
        Self {
            op: OP_HEARTBEAT_ACK,
            t: None,
            s: None,
            d: serde_json::json!({ "ack": seq }),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server message
// ---------------------------------------------------------------------------

/// A message received from the client over WebSocket.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    pub op: u8,
    #[serde(default)]
    pub t: Option<String>,
    #[serde(default)]
    pub d: Value,
}

// ---------------------------------------------------------------------------
// Client payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct IdentifyPayload {
    pub ticket: String,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatPayload {
    #[serde(default)]
    pub seq: u64,
}

/// `join_room` / `leave_room` payload.
#[derive(Debug, Deserialize)]
pub struct RoomRefPayload {
    pub room_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ChatPayload {
    /// Defaults to the global room.
    #[serde(default)]
    pub room_id: i64,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct TypingPayload {
    #[serde(default)]
    pub room_id: i64,
    #[serde(default)]
    pub is_typing: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReadReceiptPayload {
    pub room_id: i64,
    #[serde(default)]
    pub last_read_seq: i64,
}

// ---------------------------------------------------------------------------
// Dispatch event names
// ---------------------------------------------------------------------------

/// Event names dispatched to clients.
pub struct EventName;

impl EventName {
    pub const READY: &'static str = "ready";
    pub const ONLINE: &'static str = "online";
    pub const CHAT: &'static str = "chat";
    pub const TYPING: &'static str = "typing";
    pub const READ_RECEIPT: &'static str = "read_receipt";
    pub const NEW_PRIVATE_CHAT: &'static str = "new_private_chat";
    pub const NEW_GROUP: &'static str = "new_group";
    pub const ADDED_TO_GROUP: &'static str = "added_to_group";
    pub const NEW_MEMBER: &'static str = "new_member";
    pub const OWNER_CHANGED: &'static str = "owner_changed";
    pub const MEMBER_LEFT: &'static str = "member_left";
}

/// Rejection codes carried in REJECT frames.
pub struct RejectCode;

impl RejectCode {
    pub const NOT_A_MEMBER: &'static str = "not_a_member";
    pub const INVALID_PAYLOAD: &'static str = "invalid_payload";
    pub const UNKNOWN_EVENT: &'static str = "unknown_event";
    pub const INTERNAL: &'static str = "internal";
}
