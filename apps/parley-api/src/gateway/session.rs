//! Per-connection session state.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::fanout::{RoutedEvent, Target};

/// State for a single authenticated WebSocket connection.
///
/// The subscription set starts as every room the user is a member of plus
/// the global room, and is mutated only by `join_room`/`leave_room` events
/// handled on this session's own event loop.
pub struct ConnectionSession {
    /// Unique session identifier (`ses_` prefixed ULID).
    pub session_id: String,
    /// Authenticated user ID; set at handshake, never changes.
    pub user_id: String,
    /// Display name cached at handshake time.
    pub username: String,
    /// Room ids this session receives events for.
    rooms: RwLock<HashSet<i64>>,
    /// Monotonically increasing sequence number for dispatch events.
    seq: AtomicU64,
}

impl ConnectionSession {
    pub fn new(
        session_id: String,
        user_id: String,
        username: String,
        rooms: HashSet<i64>,
    ) -> Self {
        Self {
            session_id,
            user_id,
            username,
            rooms: RwLock::new(rooms),
            seq: AtomicU64::new(0),
        }
    }

    /// Get the next sequence number for a dispatch event.
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn subscribe(&self, room_id: i64) {
        self.rooms.write().insert(room_id);
    }

    pub fn unsubscribe(&self, room_id: i64) {
        self.rooms.write().remove(&room_id);
    }

    pub fn is_subscribed(&self, room_id: i64) -> bool {
        self.rooms.read().contains(&room_id)
    }

    /// Sorted snapshot of the current subscriptions.
    pub fn room_snapshot(&self) -> Vec<i64> {
        let mut rooms: Vec<i64> = self.rooms.read().iter().copied().collect();
        rooms.sort_unstable();
        rooms
    }

    /// Whether this session should receive a routed event.
    pub fn wants(&self, event: &RoutedEvent) -> bool {
        match &event.target {
            Target::All => true,
            Target::Room { room_id, exclude } => {
                if exclude.as_deref() == Some(self.session_id.as_str()) {
                    return false;
                }
                self.is_subscribed(*room_id)
            }
            Target::User(user_id) => *user_id == self.user_id,
        }
    }
}
