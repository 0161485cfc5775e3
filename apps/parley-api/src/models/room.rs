use serde::{Deserialize, Serialize};

/// The implicit global room. Every session joins it automatically and no
/// membership row exists for it.
pub const GLOBAL_ROOM_ID: i64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    Global,
    Private,
    Group,
}

/// A messaging scope: the global room, a two-member private chat, or a
/// named, owned group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub room_id: i64,
    pub kind: RoomKind,
    pub name: Option<String>,
    pub owner: Option<String>,
}

impl Room {
    pub fn is_group(&self) -> bool {
        self.kind == RoomKind::Group
    }
}

/// A room membership row joined with the member's display name.
#[derive(Debug, Clone, Serialize)]
pub struct RoomMember {
    pub user_id: String,
    pub username: String,
    pub last_read_seq: i64,
}
