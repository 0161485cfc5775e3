pub mod health;
pub mod history;
pub mod rooms;

use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest("/api/v1", history::router().merge(rooms::router()))
}
