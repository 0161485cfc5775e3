use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use parley_api::auth::tokens::{self, AccessData, TicketData};
use parley_api::chat::ChatService;
use parley_api::config::Config;
use parley_api::gateway::fanout::EventRouter;
use parley_api::gateway::presence::PresenceRegistry;
use parley_api::models::user::User;
use parley_api::store::{ChatStore, KeyValueStore, MemoryKv, MemoryStore};
use parley_api::AppState;
use parley_common::SnowflakeGenerator;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build a fully in-memory AppState.
pub fn test_state() -> AppState {
    let ids = Arc::new(SnowflakeGenerator::new(0));
    let store: Arc<dyn ChatStore> = Arc::new(MemoryStore::new(ids));
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKv::new());
    let chat = Arc::new(ChatService::new(store.clone()));

    AppState {
        config: Arc::new(Config {
            port: 0,
            history_page_size: 50,
        }),
        kv,
        store,
        chat,
        presence: Arc::new(PresenceRegistry::new()),
        broadcast: Arc::new(EventRouter::new()),
    }
}

/// Build the full application router wired to a fresh test state.
pub fn test_app() -> (axum::Router, AppState) {
    let state = test_state();
    let app = parley_api::routes::router().with_state(state.clone());
    (app, state)
}

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background.
pub async fn start_ws_server() -> (SocketAddr, AppState) {
    let state = test_state();
    let app = parley_api::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

pub async fn seed_user(state: &AppState, user_id: &str, username: &str) {
    state
        .store
        .upsert_user(User::new(user_id, username))
        .await
        .expect("seed user");
}

pub async fn befriend(state: &AppState, a: &str, b: &str) {
    state.store.add_friendship(a, b).await.expect("befriend");
}

/// Mint a single-use gateway connect ticket for a user.
pub async fn issue_ticket(state: &AppState, user_id: &str) -> String {
    let ticket = tokens::generate_connect_ticket();
    tokens::store_connect_ticket(
        state.kv.as_ref(),
        &ticket,
        &TicketData {
            user_id: user_id.to_string(),
        },
    )
    .await
    .expect("store ticket");
    ticket
}

/// Mint a bearer access token for the HTTP surface.
pub async fn issue_token(state: &AppState, user_id: &str) -> String {
    let token = tokens::generate_access_token();
    tokens::store_access_token(
        state.kv.as_ref(),
        &token,
        &AccessData {
            user_id: user_id.to_string(),
        },
    )
    .await
    .expect("store token");
    token
}

/// Open a raw WebSocket to the gateway without identifying.
pub async fn connect_raw(addr: SocketAddr) -> WsClient {
    let url = format!("ws://{addr}/gateway");
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws_stream
}

/// Connect, IDENTIFY with the given ticket, and assert the ready frame.
/// Returns the stream and the ready payload (`d`).
pub async fn connect_and_identify(addr: SocketAddr, ticket: &str) -> (WsClient, serde_json::Value) {
    let mut client = connect_raw(addr).await;

    let identify = serde_json::json!({
        "op": 2,
        "d": { "ticket": ticket }
    });
    client
        .send(tungstenite::Message::Text(identify.to_string().into()))
        .await
        .expect("send identify");

    let frame = recv_frame(&mut client).await;
    assert_eq!(frame["op"], 0, "ready should be op=0 (DISPATCH)");
    assert_eq!(frame["t"], "ready");
    assert!(frame["s"].as_u64().unwrap() > 0);

    let d = frame["d"].clone();
    (client, d)
}

/// Read the next text frame as JSON (5s timeout).
pub async fn recv_frame(client: &mut WsClient) -> serde_json::Value {
    let msg = time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timeout waiting for frame")
        .expect("stream ended")
        .expect("ws read error");
    let text = msg.into_text().expect("not a text frame");
    serde_json::from_str(&text).expect("parse frame")
}

/// Read frames until a DISPATCH with the given event name arrives, skipping
/// everything else (presence updates, acks). Panics after 5s.
pub async fn recv_dispatch(client: &mut WsClient, name: &str) -> serde_json::Value {
    let deadline = time::Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline
            .checked_duration_since(time::Instant::now())
            .expect("timeout waiting for dispatch");
        let msg = time::timeout(remaining, client.next())
            .await
            .unwrap_or_else(|_| panic!("timeout waiting for `{name}` dispatch"))
            .expect("stream ended")
            .expect("ws read error");
        let Ok(text) = msg.into_text() else { continue };
        let frame: serde_json::Value = serde_json::from_str(&text).expect("parse frame");
        if frame["op"] == 0 && frame["t"] == name {
            return frame["d"].clone();
        }
    }
}

/// Assert that no DISPATCH with the given event name arrives within `ms`.
pub async fn expect_no_dispatch(client: &mut WsClient, name: &str, ms: u64) {
    let deadline = time::Instant::now() + Duration::from_millis(ms);
    loop {
        let Some(remaining) = deadline.checked_duration_since(time::Instant::now()) else {
            return;
        };
        match time::timeout(remaining, client.next()).await {
            Err(_) => return, // Quiet until the deadline.
            Ok(None) => return,
            Ok(Some(Ok(msg))) => {
                if let Ok(text) = msg.into_text() {
                    if let Ok(frame) = serde_json::from_str::<serde_json::Value>(&text) {
                        assert!(
                            !(frame["op"] == 0 && frame["t"] == name),
                            "unexpected `{name}` dispatch: {frame}"
                        );
                    }
                }
            }
            Ok(Some(Err(_))) => return,
        }
    }
}

/// Send a client event frame (op=3).
pub async fn send_event(client: &mut WsClient, name: &str, data: serde_json::Value) {
    let frame = serde_json::json!({
        "op": 3,
        "t": name,
        "d": data
    });
    client
        .send(tungstenite::Message::Text(frame.to_string().into()))
        .await
        .expect("send event");
}
