use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parley_api::chat::ChatService;
use parley_api::config::Config;
use parley_api::gateway::fanout::EventRouter;
use parley_api::gateway::presence::PresenceRegistry;
use parley_api::store::{ChatStore, KeyValueStore, MemoryKv, MemoryStore};
use parley_api::AppState;
use parley_common::SnowflakeGenerator;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing — env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    // In-memory storage and KV for now. The relational store and Redis slot
    // in behind the same traits when they are added.
    let ids = Arc::new(SnowflakeGenerator::new(0));
    let store: Arc<dyn ChatStore> = Arc::new(MemoryStore::new(ids));
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKv::new());

    let chat = Arc::new(ChatService::new(store.clone()));
    let presence = Arc::new(PresenceRegistry::new());
    let broadcast = Arc::new(EventRouter::new());

    let state = AppState {
        config: Arc::new(config),
        kv,
        store,
        chat,
        presence,
        broadcast,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = parley_api::routes::router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "parley-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
