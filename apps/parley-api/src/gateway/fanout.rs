//! Event router: delivers named events to room subscribers, to one user's
//! sessions, or to everyone.
//!
//! Uses a single bounded `tokio::sync::broadcast` channel. Each connected
//! session subscribes once and filters events locally against its own
//! subscription set, so dispatch never blocks on any recipient and events
//! submitted for the same room reach every individual subscriber in
//! submission order. A session that falls behind sees `RecvError::Lagged`
//! and only its own copies of the missed events are dropped.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

/// Capacity of the broadcast channel. Slow receivers that fall behind will
/// skip messages (RecvError::Lagged).
const BROADCAST_CAPACITY: usize = 4096;

/// Who an event is for.
#[derive(Debug, Clone)]
pub enum Target {
    /// Every authenticated session.
    All,
    /// Sessions subscribed to `room_id`, minus an optionally excluded
    /// session (used by typing indicators).
    Room {
        room_id: i64,
        exclude: Option<String>,
    },
    /// Every session belonging to one user, regardless of room.
    User(String),
}

/// A payload routed to connected gateway sessions.
#[derive(Debug, Clone)]
pub struct RoutedEvent {
    pub target: Target,
    /// The dispatch event name (e.g. "chat").
    pub name: String,
    /// Serialized event data.
    pub data: Value,
}

/// The global event router. Cheap to clone — store in AppState.
#[derive(Clone)]
pub struct EventRouter {
    sender: broadcast::Sender<Arc<RoutedEvent>>,
}

impl EventRouter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    /// Subscribe to the routed event stream. Each gateway session should
    /// call this once to get its own receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RoutedEvent>> {
        self.sender.subscribe()
    }

    pub fn to_all(&self, name: &str, data: Value) {
        self.dispatch(Target::All, name, data);
    }

    pub fn to_room(&self, room_id: i64, name: &str, data: Value) {
        self.dispatch(
            Target::Room {
                room_id,
                exclude: None,
            },
            name,
            data,
        );
    }

    pub fn to_room_except(&self, room_id: i64, session_id: &str, name: &str, data: Value) {
        self.dispatch(
            Target::Room {
                room_id,
                exclude: Some(session_id.to_string()),
            },
            name,
            data,
        );
    }

    pub fn to_user(&self, user_id: &str, name: &str, data: Value) {
        self.dispatch(Target::User(user_id.to_string()), name, data);
    }

    fn dispatch(&self, target: Target, name: &str, data: Value) {
        // send() returns Err when no session is connected — fire and forget.
        let _ = self.sender.send(Arc::new(RoutedEvent {
            target,
            name: name.to_string(),
            data,
        }));
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_dispatch_in_submission_order() {
        let router = EventRouter::new();
        let mut rx = router.subscribe();

        router.to_room(5, "chat", serde_json::json!({ "seq": 1 }));
        router.to_room(5, "read_receipt", serde_json::json!({ "seq": 1 }));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.name, "chat");
        assert_eq!(second.name, "read_receipt");
    }

    #[tokio::test]
    async fn dispatch_without_subscribers_does_not_fail() {
        let router = EventRouter::new();
        router.to_all("online", serde_json::json!({ "count": 0 }));
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let router = EventRouter::new();
        router.to_all("online", serde_json::json!({ "count": 1 }));

        let mut rx = router.subscribe();
        router.to_all("online", serde_json::json!({ "count": 2 }));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.data["count"], 2);
        assert!(rx.try_recv().is_err());
    }
}
