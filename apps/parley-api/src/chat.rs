//! Message service: validates, persists, and sequences chat messages.
//! Transport-independent: the gateway and the HTTP history endpoints both
//! go through it.

use std::sync::Arc;

use serde::Serialize;

use crate::error::ApiError;
use crate::models::message::Message;
use crate::models::room::GLOBAL_ROOM_ID;
use crate::models::user::User;
use crate::store::ChatStore;

/// Chat bodies are truncated, not rejected, past this many characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// One page of history plus a continuation hint.
#[derive(Debug, Serialize)]
pub struct HistoryPage {
    pub data: Vec<Message>,
    pub has_more: bool,
}

pub struct ChatService {
    store: Arc<dyn ChatStore>,
}

impl ChatService {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    /// Persist a chat message with an atomically assigned per-room sequence
    /// number. Non-global rooms require membership; the global room does not.
    pub async fn send(
        &self,
        sender_id: &str,
        room_id: i64,
        body: &str,
    ) -> Result<Message, ApiError> {
        let body = truncate_chars(body, MAX_MESSAGE_CHARS);

        if room_id != GLOBAL_ROOM_ID && !self.store.is_member(room_id, sender_id).await? {
            return Err(ApiError::forbidden("You are not a member of this room"));
        }

        let sender = self
            .store
            .find_user(sender_id)
            .await?
            // Unknown sender id still gets persisted; the id doubles as the
            // display name.
            .unwrap_or_else(|| User::new(sender_id, sender_id));

        self.store.append_message(room_id, &sender, body).await
    }

    /// Legacy global feed, newest first.
    pub async fn global_history(&self, page: u32, size: u32) -> Result<HistoryPage, ApiError> {
        let data = self.store.global_page(page, size).await?;
        Ok(HistoryPage {
            has_more: data.len() as u32 == size,
            data,
        })
    }

    /// Room history in ascending sequence order. Non-global rooms require
    /// membership.
    pub async fn room_history(
        &self,
        user_id: &str,
        room_id: i64,
        page: u32,
        size: u32,
    ) -> Result<HistoryPage, ApiError> {
        if room_id != GLOBAL_ROOM_ID && !self.store.is_member(room_id, user_id).await? {
            return Err(ApiError::forbidden("You are not a member of this room"));
        }
        let data = self.store.room_page(room_id, page, size).await?;
        Ok(HistoryPage {
            has_more: data.len() as u32 == size,
            data,
        })
    }
}

/// Truncate on a character boundary without allocating when already short.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
