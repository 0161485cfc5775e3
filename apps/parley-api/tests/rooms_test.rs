mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum_test::TestServer;

async fn bearer(state: &parley_api::AppState, user_id: &str) -> String {
    format!("Bearer {}", common::issue_token(state, user_id).await)
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/private
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_private_requires_friendship() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    common::seed_user(&state, "a", "alice").await;
    common::seed_user(&state, "b", "bob").await;

    let auth = bearer(&state, "a").await;
    let resp = server
        .post("/api/v1/rooms/private")
        .add_header(AUTHORIZATION, auth)
        .json(&serde_json::json!({ "target_user_id": "b" }))
        .await;
    resp.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_private_with_self_is_rejected() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    common::seed_user(&state, "a", "alice").await;

    let auth = bearer(&state, "a").await;
    let resp = server
        .post("/api/v1/rooms/private")
        .add_header(AUTHORIZATION, auth)
        .json(&serde_json::json!({ "target_user_id": "a" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_private_returns_existing_room_for_the_pair() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    common::seed_user(&state, "a", "alice").await;
    common::seed_user(&state, "b", "bob").await;
    common::befriend(&state, "a", "b").await;

    let auth_a = bearer(&state, "a").await;
    let resp = server
        .post("/api/v1/rooms/private")
        .add_header(AUTHORIZATION, auth_a)
        .json(&serde_json::json!({ "target_user_id": "b" }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let first: serde_json::Value = resp.json();
    assert_eq!(first["created"], true);

    // Asking from the other side lands on the same room.
    let auth_b = bearer(&state, "b").await;
    let resp = server
        .post("/api/v1/rooms/private")
        .add_header(AUTHORIZATION, auth_b)
        .json(&serde_json::json!({ "target_user_id": "a" }))
        .await;
    resp.assert_status_ok();
    let second: serde_json::Value = resp.json();
    assert_eq!(second["created"], false);
    assert_eq!(second["room_id"], first["room_id"]);
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/group
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_group_adds_only_the_creators_friends() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    common::seed_user(&state, "a", "alice").await;
    common::seed_user(&state, "b", "bob").await;
    common::seed_user(&state, "c", "carol").await;
    common::befriend(&state, "a", "b").await;

    let auth = bearer(&state, "a").await;
    let resp = server
        .post("/api/v1/rooms/group")
        .add_header(AUTHORIZATION, auth)
        .json(&serde_json::json!({
            "room_name": "weekend plans",
            "member_ids": ["b", "c", "a"]
        }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = resp.json();
    let room_id = body["room_id"].as_i64().unwrap();

    // Carol is not a friend and was silently skipped.
    let members = state.store.members_of(room_id).await.unwrap();
    let ids: Vec<&str> = members.iter().map(|m| m.user_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);

    let room = state.store.find_room(room_id).await.unwrap().unwrap();
    assert_eq!(room.owner.as_deref(), Some("a"));
}

#[tokio::test]
async fn create_group_requires_a_name() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    common::seed_user(&state, "a", "alice").await;

    let auth = bearer(&state, "a").await;
    let resp = server
        .post("/api/v1/rooms/group")
        .add_header(AUTHORIZATION, auth)
        .json(&serde_json::json!({ "room_name": "" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/{room_id}/members
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_member_authorization_matrix() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    common::seed_user(&state, "a", "alice").await;
    common::seed_user(&state, "b", "bob").await;
    common::seed_user(&state, "c", "carol").await;
    common::befriend(&state, "a", "b").await;

    let room = state
        .store
        .create_group_room("book club", "a", &["b".to_string()])
        .await
        .unwrap();

    // Only the owner may add.
    let auth_b = bearer(&state, "b").await;
    let resp = server
        .post(&format!("/api/v1/rooms/{room}/members"))
        .add_header(AUTHORIZATION, auth_b)
        .json(&serde_json::json!({ "member_id": "c" }))
        .await;
    resp.assert_status(StatusCode::FORBIDDEN);

    // The owner may only add friends.
    let auth_a = bearer(&state, "a").await;
    let resp = server
        .post(&format!("/api/v1/rooms/{room}/members"))
        .add_header(AUTHORIZATION, auth_a.clone())
        .json(&serde_json::json!({ "member_id": "c" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    // Friend of the owner: in.
    common::befriend(&state, "a", "c").await;
    let resp = server
        .post(&format!("/api/v1/rooms/{room}/members"))
        .add_header(AUTHORIZATION, auth_a.clone())
        .json(&serde_json::json!({ "member_id": "c" }))
        .await;
    resp.assert_status(StatusCode::NO_CONTENT);
    assert!(state.store.is_member(room, "c").await.unwrap());

    // Adding twice conflicts.
    let resp = server
        .post(&format!("/api/v1/rooms/{room}/members"))
        .add_header(AUTHORIZATION, auth_a)
        .json(&serde_json::json!({ "member_id": "c" }))
        .await;
    resp.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn add_member_rejects_private_rooms() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    common::seed_user(&state, "a", "alice").await;
    common::seed_user(&state, "c", "carol").await;
    common::befriend(&state, "a", "c").await;
    let (room, _) = state.store.create_private_room("a", "b").await.unwrap();

    let auth = bearer(&state, "a").await;
    let resp = server
        .post(&format!("/api/v1/rooms/{room}/members"))
        .add_header(AUTHORIZATION, auth)
        .json(&serde_json::json!({ "member_id": "c" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/{room_id}/leave
// ---------------------------------------------------------------------------

#[tokio::test]
async fn leaving_owner_hands_the_group_to_another_member() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    common::seed_user(&state, "a", "alice").await;
    common::seed_user(&state, "b", "bob").await;
    let room = state
        .store
        .create_group_room("handoff", "a", &["b".to_string()])
        .await
        .unwrap();

    let auth = bearer(&state, "a").await;
    let resp = server
        .post(&format!("/api/v1/rooms/{room}/leave"))
        .add_header(AUTHORIZATION, auth)
        .await;
    resp.assert_status(StatusCode::NO_CONTENT);

    let updated = state.store.find_room(room).await.unwrap().unwrap();
    assert_eq!(updated.owner.as_deref(), Some("b"));
    assert!(!state.store.is_member(room, "a").await.unwrap());
    assert!(state.store.is_member(room, "b").await.unwrap());
}

#[tokio::test]
async fn last_member_leaving_deletes_the_group() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    common::seed_user(&state, "a", "alice").await;
    let room = state.store.create_group_room("solo", "a", &[]).await.unwrap();

    let auth = bearer(&state, "a").await;
    let resp = server
        .post(&format!("/api/v1/rooms/{room}/leave"))
        .add_header(AUTHORIZATION, auth)
        .await;
    resp.assert_status(StatusCode::NO_CONTENT);

    assert!(state.store.find_room(room).await.unwrap().is_none());
}

#[tokio::test]
async fn leave_requires_membership() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    common::seed_user(&state, "c", "carol").await;
    let room = state.store.create_group_room("club", "a", &[]).await.unwrap();

    let auth = bearer(&state, "c").await;
    let resp = server
        .post(&format!("/api/v1/rooms/{room}/leave"))
        .add_header(AUTHORIZATION, auth)
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms and /api/v1/rooms/search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_rooms_shows_counterpart_names_and_read_positions() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    common::seed_user(&state, "a", "alice").await;
    common::seed_user(&state, "b", "bob").await;
    let (private, _) = state.store.create_private_room("a", "b").await.unwrap();
    let group = state
        .store
        .create_group_room("reading", "a", &["b".to_string()])
        .await
        .unwrap();
    state.store.advance_last_read(private, "a", 4).await.unwrap();

    let auth = bearer(&state, "a").await;
    let resp = server
        .get("/api/v1/rooms")
        .add_header(AUTHORIZATION, auth)
        .await;
    resp.assert_status_ok();

    let body: serde_json::Value = resp.json();
    let rooms = body["rooms"].as_array().unwrap();
    assert_eq!(rooms.len(), 2);

    let private_entry = rooms.iter().find(|r| r["id"] == private).unwrap();
    assert_eq!(private_entry["name"], "bob");
    assert_eq!(private_entry["is_group"], false);
    assert_eq!(private_entry["last_read_seq"], 4);
    assert_eq!(private_entry["members"].as_array().unwrap().len(), 2);

    let group_entry = rooms.iter().find(|r| r["id"] == group).unwrap();
    assert_eq!(group_entry["name"], "reading");
    assert_eq!(group_entry["is_group"], true);
}

#[tokio::test]
async fn search_finds_group_rooms_by_name() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    common::seed_user(&state, "a", "alice").await;
    state
        .store
        .create_group_room("rustaceans", "a", &[])
        .await
        .unwrap();
    state.store.create_private_room("a", "b").await.unwrap();

    let auth = bearer(&state, "a").await;
    let resp = server
        .get("/api/v1/rooms/search?query=rust")
        .add_header(AUTHORIZATION, auth.clone())
        .await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["rooms"].as_array().unwrap().len(), 1);
    assert_eq!(body["rooms"][0]["name"], "rustaceans");

    // Empty query is rejected.
    let resp = server
        .get("/api/v1/rooms/search")
        .add_header(AUTHORIZATION, auth)
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}
