//! In-memory presence registry: which connections are online, and whose.
//!
//! Presence is per-connection. A user may hold any number of concurrent
//! sessions; the online count counts connections, and `deregister` is
//! idempotent so a duplicate teardown can never skew it.

use std::collections::HashSet;

use dashmap::DashMap;

/// Thread-safe bidirectional session ↔ user mapping.
pub struct PresenceRegistry {
    session_users: DashMap<String, String>,
    user_sessions: DashMap<String, HashSet<String>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            session_users: DashMap::new(),
            user_sessions: DashMap::new(),
        }
    }

    /// Record a session coming online.
    pub fn register(&self, session_id: &str, user_id: &str) {
        self.session_users
            .insert(session_id.to_string(), user_id.to_string());
        self.user_sessions
            .entry(user_id.to_string())
            .or_default()
            .insert(session_id.to_string());
    }

    /// Remove a session. Returns the user it belonged to, or `None` when the
    /// session was never registered (or was already deregistered).
    pub fn deregister(&self, session_id: &str) -> Option<String> {
        let (_, user_id) = self.session_users.remove(session_id)?;
        if let Some(mut sessions) = self.user_sessions.get_mut(&user_id) {
            sessions.remove(session_id);
        }
        self.user_sessions
            .remove_if(&user_id, |_, sessions| sessions.is_empty());
        Some(user_id)
    }

    /// Number of live connections.
    pub fn count(&self) -> usize {
        self.session_users.len()
    }

    /// The user behind a session, if it is online.
    pub fn lookup_user(&self, session_id: &str) -> Option<String> {
        self.session_users.get(session_id).map(|u| u.clone())
    }

    /// All live session ids for a user.
    pub fn sessions_for(&self, user_id: &str) -> Vec<String> {
        self.user_sessions
            .get(user_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
