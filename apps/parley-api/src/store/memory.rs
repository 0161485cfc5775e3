//! In-memory [`ChatStore`] implementation.
//!
//! Per-room sequence numbers are assigned under a per-room mutex, which
//! serializes the read-max-then-increment step for concurrent saves into
//! the same room. Rooms never contend with each other.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use parley_common::SnowflakeGenerator;

use crate::error::ApiError;
use crate::models::message::Message;
use crate::models::room::{Room, RoomKind, RoomMember};
use crate::models::user::User;

use super::ChatStore;

/// Normalize an unordered user pair into a stable key.
fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

pub struct MemoryStore {
    users: DashMap<String, User>,
    friendships: Mutex<HashSet<(String, String)>>,
    rooms: DashMap<i64, Room>,
    /// Uniqueness index: normalized user pair → private room id.
    private_pairs: DashMap<(String, String), i64>,
    /// room id → member user id → last-read sequence.
    members: DashMap<i64, HashMap<String, i64>>,
    /// room id → append log; `seq` of a message is its 1-based position.
    room_logs: DashMap<i64, Mutex<Vec<Message>>>,
    /// Global insertion-order feed backing the legacy history endpoint.
    feed: Mutex<Vec<Message>>,
    next_room_id: AtomicI64,
    ids: Arc<SnowflakeGenerator>,
}

impl MemoryStore {
    pub fn new(ids: Arc<SnowflakeGenerator>) -> Self {
        Self {
            users: DashMap::new(),
            friendships: Mutex::new(HashSet::new()),
            rooms: DashMap::new(),
            private_pairs: DashMap::new(),
            members: DashMap::new(),
            room_logs: DashMap::new(),
            feed: Mutex::new(Vec::new()),
            // Room 0 is the implicit global room.
            next_room_id: AtomicI64::new(1),
            ids,
        }
    }

    fn alloc_room_id(&self) -> i64 {
        self.next_room_id.fetch_add(1, Ordering::Relaxed)
    }

    fn username_of(&self, user_id: &str) -> String {
        self.users
            .get(user_id)
            .map(|u| u.username.clone())
            .unwrap_or_else(|| user_id.to_string())
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn upsert_user(&self, user: User) -> Result<(), ApiError> {
        self.users.insert(user.user_id.clone(), user);
        Ok(())
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, ApiError> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }

    async fn add_friendship(&self, a: &str, b: &str) -> Result<(), ApiError> {
        self.friendships.lock().insert(pair_key(a, b));
        Ok(())
    }

    async fn are_friends(&self, a: &str, b: &str) -> Result<bool, ApiError> {
        Ok(self.friendships.lock().contains(&pair_key(a, b)))
    }

    async fn find_room(&self, room_id: i64) -> Result<Option<Room>, ApiError> {
        Ok(self.rooms.get(&room_id).map(|r| r.clone()))
    }

    async fn create_private_room(&self, a: &str, b: &str) -> Result<(i64, bool), ApiError> {
        // The entry guard holds the pair key until the room is fully wired
        // up, so two concurrent creates for the same pair cannot both win.
        match self.private_pairs.entry(pair_key(a, b)) {
            Entry::Occupied(existing) => Ok((*existing.get(), false)),
            Entry::Vacant(slot) => {
                let room_id = self.alloc_room_id();
                self.rooms.insert(
                    room_id,
                    Room {
                        room_id,
                        kind: RoomKind::Private,
                        name: None,
                        owner: None,
                    },
                );
                let mut m = HashMap::new();
                m.insert(a.to_string(), 0);
                m.insert(b.to_string(), 0);
                self.members.insert(room_id, m);
                slot.insert(room_id);
                Ok((room_id, true))
            }
        }
    }

    async fn create_group_room(
        &self,
        name: &str,
        owner: &str,
        members: &[String],
    ) -> Result<i64, ApiError> {
        let room_id = self.alloc_room_id();
        self.rooms.insert(
            room_id,
            Room {
                room_id,
                kind: RoomKind::Group,
                name: Some(name.to_string()),
                owner: Some(owner.to_string()),
            },
        );
        let mut m = HashMap::new();
        m.insert(owner.to_string(), 0);
        for member in members {
            m.entry(member.clone()).or_insert(0);
        }
        self.members.insert(room_id, m);
        Ok(room_id)
    }

    async fn search_group_rooms(&self, query: &str) -> Result<Vec<Room>, ApiError> {
        let mut found: Vec<Room> = self
            .rooms
            .iter()
            .filter(|r| r.is_group() && r.name.as_deref().is_some_and(|n| n.contains(query)))
            .map(|r| r.clone())
            .collect();
        found.sort_by_key(|r| r.room_id);
        Ok(found)
    }

    async fn delete_room(&self, room_id: i64) -> Result<(), ApiError> {
        self.rooms.remove(&room_id);
        self.members.remove(&room_id);
        self.room_logs.remove(&room_id);
        self.private_pairs.retain(|_, v| *v != room_id);
        Ok(())
    }

    async fn transfer_owner(&self, room_id: i64, new_owner: &str) -> Result<(), ApiError> {
        let mut room = self
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| ApiError::not_found("Room not found"))?;
        room.owner = Some(new_owner.to_string());
        Ok(())
    }

    async fn is_member(&self, room_id: i64, user_id: &str) -> Result<bool, ApiError> {
        Ok(self
            .members
            .get(&room_id)
            .is_some_and(|m| m.contains_key(user_id)))
    }

    async fn rooms_for(&self, user_id: &str) -> Result<Vec<i64>, ApiError> {
        let mut rooms: Vec<i64> = self
            .members
            .iter()
            .filter(|entry| entry.value().contains_key(user_id))
            .map(|entry| *entry.key())
            .collect();
        rooms.sort_unstable();
        Ok(rooms)
    }

    async fn members_of(&self, room_id: i64) -> Result<Vec<RoomMember>, ApiError> {
        let snapshot: Vec<(String, i64)> = match self.members.get(&room_id) {
            Some(m) => m.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            None => return Ok(Vec::new()),
        };
        let mut members: Vec<RoomMember> = snapshot
            .into_iter()
            .map(|(user_id, last_read_seq)| RoomMember {
                username: self.username_of(&user_id),
                user_id,
                last_read_seq,
            })
            .collect();
        members.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(members)
    }

    async fn add_member(&self, room_id: i64, user_id: &str) -> Result<bool, ApiError> {
        let mut m = self
            .members
            .get_mut(&room_id)
            .ok_or_else(|| ApiError::not_found("Room not found"))?;
        Ok(m.insert(user_id.to_string(), 0).is_none())
    }

    async fn remove_member(&self, room_id: i64, user_id: &str) -> Result<bool, ApiError> {
        match self.members.get_mut(&room_id) {
            Some(mut m) => Ok(m.remove(user_id).is_some()),
            None => Ok(false),
        }
    }

    async fn advance_last_read(
        &self,
        room_id: i64,
        user_id: &str,
        seq: i64,
    ) -> Result<bool, ApiError> {
        let Some(mut m) = self.members.get_mut(&room_id) else {
            return Ok(false);
        };
        match m.get_mut(user_id) {
            Some(current) if seq > *current => {
                *current = seq;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_message(
        &self,
        room_id: i64,
        sender: &User,
        body: &str,
    ) -> Result<Message, ApiError> {
        let log = self
            .room_logs
            .entry(room_id)
            .or_insert_with(|| Mutex::new(Vec::new()));
        let mut log = log.lock();

        let seq = log.len() as i64 + 1;
        let message = Message {
            id: self.ids.generate(),
            room_id,
            seq,
            sender_id: sender.user_id.clone(),
            sender: sender.username.clone(),
            body: body.to_string(),
            kind: 0,
            status: 0,
            ts: Utc::now(),
        };
        log.push(message.clone());
        // Feed insertion happens under the room lock so the global feed
        // never shows one room's messages out of sequence order.
        self.feed.lock().push(message.clone());
        Ok(message)
    }

    async fn global_page(&self, page: u32, size: u32) -> Result<Vec<Message>, ApiError> {
        let page = page.max(1);
        let feed = self.feed.lock();
        Ok(feed
            .iter()
            .rev()
            .skip(((page - 1) * size) as usize)
            .take(size as usize)
            .cloned()
            .collect())
    }

    async fn room_page(
        &self,
        room_id: i64,
        page: u32,
        size: u32,
    ) -> Result<Vec<Message>, ApiError> {
        let page = page.max(1);
        let Some(log) = self.room_logs.get(&room_id) else {
            return Ok(Vec::new());
        };
        let log = log.lock();
        Ok(log
            .iter()
            .skip(((page - 1) * size) as usize)
            .take(size as usize)
            .cloned()
            .collect())
    }
}
