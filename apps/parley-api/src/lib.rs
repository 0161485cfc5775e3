pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use chat::ChatService;
use config::Config;
use gateway::fanout::EventRouter;
use gateway::presence::PresenceRegistry;
use store::{ChatStore, KeyValueStore};

/// Shared application state available to all route handlers and gateway
/// sessions. Every collaborator is injected here at construction; nothing
/// reaches for ambient globals.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub kv: Arc<dyn KeyValueStore>,
    pub store: Arc<dyn ChatStore>,
    pub chat: Arc<ChatService>,
    pub presence: Arc<PresenceRegistry>,
    pub broadcast: Arc<EventRouter>,
}
