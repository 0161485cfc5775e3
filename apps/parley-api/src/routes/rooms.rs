//! Room management endpoints. These sit outside the real-time loop but
//! route their notifications through the gateway's event router so affected
//! users hear about membership changes live.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::gateway::events::EventName;
use crate::models::room::RoomKind;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/search", get(search_rooms))
        .route("/rooms/private", post(create_private_chat))
        .route("/rooms/group", post(create_group_chat))
        .route("/rooms/{room_id}/members", post(add_member))
        .route("/rooms/{room_id}/leave", post(leave_room))
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct RoomSummary {
    pub id: i64,
    pub name: String,
    pub is_group: bool,
    pub members: Vec<MemberInfo>,
    pub last_read_seq: i64,
}

#[derive(Debug, Serialize)]
pub struct MemberInfo {
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct ListRoomsResponse {
    pub rooms: Vec<RoomSummary>,
}

/// Rooms the caller belongs to, with members and the caller's read position.
/// Private rooms display the counterpart's name.
async fn list_rooms(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ListRoomsResponse>, ApiError> {
    let room_ids = state.store.rooms_for(&user_id).await?;

    let mut rooms = Vec::with_capacity(room_ids.len());
    for room_id in room_ids {
        let Some(room) = state.store.find_room(room_id).await? else {
            continue;
        };
        let members = state.store.members_of(room_id).await?;

        let name = if room.is_group() {
            room.name.clone().unwrap_or_default()
        } else {
            members
                .iter()
                .find(|m| m.user_id != user_id)
                .map(|m| m.username.clone())
                .unwrap_or_else(|| "Unknown".to_string())
        };

        let last_read_seq = members
            .iter()
            .find(|m| m.user_id == user_id)
            .map(|m| m.last_read_seq)
            .unwrap_or(0);

        rooms.push(RoomSummary {
            id: room.room_id,
            name,
            is_group: room.is_group(),
            members: members
                .into_iter()
                .map(|m| MemberInfo {
                    user_id: m.user_id,
                    username: m.username,
                })
                .collect(),
            last_read_seq,
        });
    }

    Ok(Json(ListRoomsResponse { rooms }))
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/search
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub room_id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub rooms: Vec<SearchHit>,
}

/// Group rooms whose name contains the query. Private rooms are never
/// searchable.
async fn search_rooms(
    AuthUser { user_id: _ }: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params.query.unwrap_or_default();
    if query.is_empty() {
        return Err(ApiError::bad_request("Search query is required"));
    }

    let rooms = state.store.search_group_rooms(&query).await?;
    Ok(Json(SearchResponse {
        rooms: rooms
            .into_iter()
            .map(|r| SearchHit {
                room_id: r.room_id,
                name: r.name.unwrap_or_default(),
            })
            .collect(),
    }))
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/private
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreatePrivateRequest {
    pub target_user_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreatePrivateResponse {
    pub room_id: i64,
    pub created: bool,
}

/// Start a private chat with a friend. At most one private room exists per
/// user pair; asking again returns the existing room.
async fn create_private_chat(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreatePrivateRequest>,
) -> Result<(StatusCode, Json<CreatePrivateResponse>), ApiError> {
    let target = body.target_user_id;
    if target.is_empty() {
        return Err(ApiError::bad_request("Target user id is required"));
    }
    if target == user_id {
        return Err(ApiError::bad_request(
            "Cannot start a private chat with yourself",
        ));
    }
    if !state.store.are_friends(&user_id, &target).await? {
        return Err(ApiError::forbidden(
            "You can only start a private chat with a friend",
        ));
    }

    let (room_id, created) = state.store.create_private_room(&user_id, &target).await?;

    if created {
        state.broadcast.to_user(
            &target,
            EventName::NEW_PRIVATE_CHAT,
            json!({ "room_id": room_id, "friend_user_id": user_id }),
        );
    }

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(CreatePrivateResponse { room_id, created })))
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/group
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub room_name: String,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateGroupResponse {
    pub room_id: i64,
}

/// Create a group chat. Only the creator's friends make it into the initial
/// member list; everyone added is notified.
async fn create_group_chat(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<CreateGroupResponse>), ApiError> {
    if body.room_name.is_empty() {
        return Err(ApiError::bad_request("Group name is required"));
    }

    let mut members = Vec::new();
    for member_id in &body.member_ids {
        if *member_id != user_id && state.store.are_friends(&user_id, member_id).await? {
            members.push(member_id.clone());
        }
    }

    let room_id = state
        .store
        .create_group_room(&body.room_name, &user_id, &members)
        .await?;

    for member_id in &members {
        state.broadcast.to_user(
            member_id,
            EventName::NEW_GROUP,
            json!({
                "room_id": room_id,
                "room_name": body.room_name,
                "creator_id": user_id,
            }),
        );
    }

    Ok((StatusCode::CREATED, Json(CreateGroupResponse { room_id })))
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/{room_id}/members
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub member_id: String,
}

/// Owner adds a friend to a group room.
async fn add_member(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Json(body): Json<AddMemberRequest>,
) -> Result<StatusCode, ApiError> {
    let room = state
        .store
        .find_room(room_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Room not found"))?;

    if room.kind != RoomKind::Group {
        return Err(ApiError::bad_request(
            "Cannot add members to a private chat",
        ));
    }
    if room.owner.as_deref() != Some(user_id.as_str()) {
        return Err(ApiError::forbidden("Only the owner can add members"));
    }
    if !state.store.are_friends(&user_id, &body.member_id).await? {
        return Err(ApiError::bad_request("You can only add friends"));
    }

    if !state.store.add_member(room_id, &body.member_id).await? {
        return Err(ApiError::conflict("User is already a member"));
    }

    let username = state
        .store
        .find_user(&body.member_id)
        .await?
        .map(|u| u.username)
        .unwrap_or_else(|| body.member_id.clone());

    state.broadcast.to_user(
        &body.member_id,
        EventName::ADDED_TO_GROUP,
        json!({
            "room_id": room_id,
            "room_name": room.name,
            "added_by": user_id,
        }),
    );
    state.broadcast.to_room(
        room_id,
        EventName::NEW_MEMBER,
        json!({
            "room_id": room_id,
            "member_id": body.member_id,
            "username": username,
        }),
    );

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/{room_id}/leave
// ---------------------------------------------------------------------------

/// Leave a room. A departing group owner hands the room to another member,
/// or takes it down with them when they were the last one in it.
async fn leave_room(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let room = state
        .store
        .find_room(room_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Room not found"))?;

    if !state.store.is_member(room_id, &user_id).await? {
        return Err(ApiError::bad_request("You are not in this room"));
    }

    let username = state
        .store
        .find_user(&user_id)
        .await?
        .map(|u| u.username)
        .unwrap_or_else(|| user_id.clone());

    let mut deleted = false;
    if room.is_group() && room.owner.as_deref() == Some(user_id.as_str()) {
        let members = state.store.members_of(room_id).await?;
        let successor = members.iter().find(|m| m.user_id != user_id);

        match successor {
            Some(next) => {
                state.store.transfer_owner(room_id, &next.user_id).await?;
                state.broadcast.to_room(
                    room_id,
                    EventName::OWNER_CHANGED,
                    json!({
                        "room_id": room_id,
                        "new_owner_id": next.user_id,
                        "new_owner_name": next.username,
                    }),
                );
            }
            None => {
                // Last member out deletes the room.
                state.store.delete_room(room_id).await?;
                deleted = true;
            }
        }
    }

    if !deleted {
        state.store.remove_member(room_id, &user_id).await?;
        state.broadcast.to_room(
            room_id,
            EventName::MEMBER_LEFT,
            json!({
                "room_id": room_id,
                "user_id": user_id,
                "username": username,
            }),
        );
    }

    Ok(StatusCode::NO_CONTENT)
}
