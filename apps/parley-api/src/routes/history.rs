//! Message history endpoints: the legacy global feed and per-room history.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::middleware::AuthUser;
use crate::chat::HistoryPage;
use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/history", get(global_history))
        .route("/rooms/{room_id}/history", get(room_history))
}

// ---------------------------------------------------------------------------
// GET /api/v1/history
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GlobalHistoryParams {
    pub page: Option<u32>,
}

/// Global feed, newest first, fixed page size.
async fn global_history(
    AuthUser { user_id: _ }: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<GlobalHistoryParams>,
) -> Result<Json<HistoryPage>, ApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let history = state
        .chat
        .global_history(page, state.config.history_page_size)
        .await?;
    Ok(Json(history))
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/{room_id}/history
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RoomHistoryParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

/// Room history in ascending sequence order; members only.
async fn room_history(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Query(params): Query<RoomHistoryParams>,
) -> Result<Json<HistoryPage>, ApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let size = params.size.unwrap_or(50).clamp(1, 100);
    let history = state.chat.room_history(&user_id, room_id, page, size).await?;
    Ok(Json(history))
}
