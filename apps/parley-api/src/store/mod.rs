//! Persistence gateway: durable storage for users, friendships, rooms,
//! memberships, and messages.
//!
//! The core talks to storage through the [`ChatStore`] trait and re-queries
//! membership on every check; no caching layer sits between an event and
//! the authoritative answer.

pub mod kv;
pub mod memory;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::message::Message;
use crate::models::room::{Room, RoomMember};
use crate::models::user::User;

pub use kv::{KeyValueStore, MemoryKv};
pub use memory::MemoryStore;

/// Storage operations the messaging core depends on.
///
/// Backed by an in-memory store for now; a relational implementation slots
/// in behind the same trait. Sequence allocation in [`append_message`] must
/// be atomic per room: concurrent saves into the same room may never produce
/// duplicate or skipped sequence numbers.
///
/// [`append_message`]: ChatStore::append_message
#[async_trait]
pub trait ChatStore: Send + Sync {
    // -- users (seeded by the external account layer) --

    async fn upsert_user(&self, user: User) -> Result<(), ApiError>;
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, ApiError>;

    // -- friendships (owned externally; the core only asks) --

    async fn add_friendship(&self, a: &str, b: &str) -> Result<(), ApiError>;
    async fn are_friends(&self, a: &str, b: &str) -> Result<bool, ApiError>;

    // -- rooms --

    async fn find_room(&self, room_id: i64) -> Result<Option<Room>, ApiError>;

    /// Create (or return the existing) private room for an unordered user
    /// pair. Returns `(room_id, created)`; at most one private room exists
    /// per pair, enforced at creation time.
    async fn create_private_room(&self, a: &str, b: &str) -> Result<(i64, bool), ApiError>;

    /// Create a group room owned by `owner`. `members` are added alongside
    /// the owner; duplicates are ignored.
    async fn create_group_room(
        &self,
        name: &str,
        owner: &str,
        members: &[String],
    ) -> Result<i64, ApiError>;

    /// Group rooms whose name contains `query`.
    async fn search_group_rooms(&self, query: &str) -> Result<Vec<Room>, ApiError>;

    async fn delete_room(&self, room_id: i64) -> Result<(), ApiError>;
    async fn transfer_owner(&self, room_id: i64, new_owner: &str) -> Result<(), ApiError>;

    // -- membership index --

    async fn is_member(&self, room_id: i64, user_id: &str) -> Result<bool, ApiError>;

    /// Room ids the user explicitly belongs to (the global room is implicit
    /// and never listed).
    async fn rooms_for(&self, user_id: &str) -> Result<Vec<i64>, ApiError>;

    async fn members_of(&self, room_id: i64) -> Result<Vec<RoomMember>, ApiError>;

    /// Returns `false` when the user was already a member.
    async fn add_member(&self, room_id: i64, user_id: &str) -> Result<bool, ApiError>;

    /// Returns `false` when no such membership existed.
    async fn remove_member(&self, room_id: i64, user_id: &str) -> Result<bool, ApiError>;

    /// Advance a membership's last-read sequence. Monotonic: returns `true`
    /// only when `seq` is greater than the stored value; regressions leave
    /// the row untouched.
    async fn advance_last_read(
        &self,
        room_id: i64,
        user_id: &str,
        seq: i64,
    ) -> Result<bool, ApiError>;

    // -- messages --

    /// Append a message with the next per-room sequence number.
    async fn append_message(
        &self,
        room_id: i64,
        sender: &User,
        body: &str,
    ) -> Result<Message, ApiError>;

    /// Global feed page, descending by insertion order (legacy surface).
    async fn global_page(&self, page: u32, size: u32) -> Result<Vec<Message>, ApiError>;

    /// Room history page, ascending by sequence number.
    async fn room_page(&self, room_id: i64, page: u32, size: u32)
        -> Result<Vec<Message>, ApiError>;
}
