//! Inbound event dispatch: IDENTIFY and the per-session client events.

use std::collections::HashSet;

use serde_json::{json, Value};

use crate::auth::tokens;
use crate::models::room::GLOBAL_ROOM_ID;
use crate::AppState;

use super::events::{
    ChatPayload, EventName, GatewayMessage, IdentifyPayload, ReadReceiptPayload, RejectCode,
    RoomRefPayload, TypingPayload,
};
use super::session::ConnectionSession;

/// Heartbeat interval sent to clients in the ready payload (ms).
pub const HEARTBEAT_INTERVAL_MS: u64 = 41250;

/// What the session loop should do after a client event was handled.
pub enum EventOutcome {
    /// Nothing to send back; any fan-out already happened.
    Handled,
    /// Send this frame to the calling session only.
    Reply(GatewayMessage),
    /// Client asked to log out; close the connection.
    Logout,
}

/// Process an IDENTIFY opcode. Consumes the single-use connect ticket,
/// resolves the user's rooms, and returns the session plus its ready frame.
pub async fn handle_identify(
    state: &AppState,
    payload: IdentifyPayload,
) -> Result<(ConnectionSession, GatewayMessage), &'static str> {
    let ticket = tokens::consume_connect_ticket(state.kv.as_ref(), &payload.ticket)
        .await
        .map_err(|_| "Ticket lookup failed")?
        .ok_or("Invalid or expired ticket")?;

    let user = state
        .store
        .find_user(&ticket.user_id)
        .await
        .map_err(|_| "Storage unavailable")?
        .ok_or("Unknown user")?;

    let memberships = state
        .store
        .rooms_for(&user.user_id)
        .await
        .map_err(|_| "Failed to load rooms")?;

    let mut rooms: HashSet<i64> = memberships.into_iter().collect();
    rooms.insert(GLOBAL_ROOM_ID);

    let session_id = parley_common::id::prefixed_ulid(parley_common::id::prefix::SESSION);

    let mut room_list: Vec<i64> = rooms.iter().copied().collect();
    room_list.sort_unstable();

    let ready_data = json!({
        "session_id": session_id,
        "user": {
            "id": user.user_id,
            "username": user.username,
        },
        "rooms": room_list,
        "heartbeat_interval": HEARTBEAT_INTERVAL_MS,
    });

    let session = ConnectionSession::new(session_id, user.user_id, user.username, rooms);
    let seq = session.next_seq();
    let ready = GatewayMessage::dispatch(EventName::READY, seq, ready_data);

    Ok((session, ready))
}

/// Dispatch one client event by name. Only called while the session is
/// authenticated.
pub async fn handle_client_event(
    state: &AppState,
    session: &ConnectionSession,
    name: &str,
    data: Value,
) -> EventOutcome {
    match name {
        "chat" => handle_chat(state, session, data).await,
        "typing" => handle_typing(state, session, data),
        "join_room" => handle_join_room(state, session, data).await,
        "leave_room" => handle_leave_room(session, data),
        "read_receipt" => handle_read_receipt(state, session, data).await,
        "logout" => EventOutcome::Logout,
        _ => EventOutcome::Reply(GatewayMessage::reject(
            name,
            RejectCode::UNKNOWN_EVENT,
            "Unknown event",
        )),
    }
}

async fn handle_chat(state: &AppState, session: &ConnectionSession, data: Value) -> EventOutcome {
    let payload: ChatPayload = match serde_json::from_value(data) {
        Ok(p) => p,
        Err(_) => return invalid_payload("chat"),
    };

    let message = match state
        .chat
        .send(&session.user_id, payload.room_id, &payload.body)
        .await
    {
        Ok(m) => m,
        Err(e) if e.is_forbidden() => {
            return EventOutcome::Reply(GatewayMessage::reject(
                "chat",
                RejectCode::NOT_A_MEMBER,
                &e.message,
            ));
        }
        Err(e) => {
            tracing::error!(code = %e.code, "chat persistence failed");
            return EventOutcome::Reply(GatewayMessage::reject(
                "chat",
                RejectCode::INTERNAL,
                "Message could not be saved",
            ));
        }
    };

    // Broadcast only after the save succeeded.
    state.broadcast.to_room(
        message.room_id,
        EventName::CHAT,
        json!({
            "sender_id": message.sender_id,
            "sender": message.sender,
            "body": message.body,
            "ts": message.ts,
            "room_id": message.room_id,
            "seq": message.seq,
        }),
    );

    EventOutcome::Handled
}

fn handle_typing(state: &AppState, session: &ConnectionSession, data: Value) -> EventOutcome {
    let payload: TypingPayload = match serde_json::from_value(data) {
        Ok(p) => p,
        Err(_) => return invalid_payload("typing"),
    };

    // TODO: typing is not membership-gated; tighten this once clients only
    // emit it for rooms from their joined list.
    state.broadcast.to_room_except(
        payload.room_id,
        &session.session_id,
        EventName::TYPING,
        json!({
            "user_id": session.user_id,
            "username": session.username,
            "is_typing": payload.is_typing,
        }),
    );

    EventOutcome::Handled
}

async fn handle_join_room(
    state: &AppState,
    session: &ConnectionSession,
    data: Value,
) -> EventOutcome {
    let payload: RoomRefPayload = match serde_json::from_value(data) {
        Ok(p) => p,
        Err(_) => return invalid_payload("join_room"),
    };

    if payload.room_id != GLOBAL_ROOM_ID {
        match state.store.is_member(payload.room_id, &session.user_id).await {
            Ok(true) => {}
            // Non-members are silently ignored.
            Ok(false) => return EventOutcome::Handled,
            Err(e) => {
                tracing::debug!(code = %e.code, "membership check failed");
                return EventOutcome::Handled;
            }
        }
    }

    session.subscribe(payload.room_id);
    tracing::debug!(
        session_id = %session.session_id,
        room_id = payload.room_id,
        "joined room"
    );
    EventOutcome::Handled
}

fn handle_leave_room(session: &ConnectionSession, data: Value) -> EventOutcome {
    let payload: RoomRefPayload = match serde_json::from_value(data) {
        Ok(p) => p,
        Err(_) => return invalid_payload("leave_room"),
    };

    session.unsubscribe(payload.room_id);
    tracing::debug!(
        session_id = %session.session_id,
        room_id = payload.room_id,
        "left room"
    );
    EventOutcome::Handled
}

async fn handle_read_receipt(
    state: &AppState,
    session: &ConnectionSession,
    data: Value,
) -> EventOutcome {
    let payload: ReadReceiptPayload = match serde_json::from_value(data) {
        Ok(p) => p,
        Err(_) => return invalid_payload("read_receipt"),
    };

    // The global room keeps no read state.
    if payload.room_id == GLOBAL_ROOM_ID {
        return EventOutcome::Handled;
    }

    match state.store.is_member(payload.room_id, &session.user_id).await {
        Ok(true) => {}
        // Silently ignored for non-members.
        Ok(false) => return EventOutcome::Handled,
        Err(e) => {
            tracing::debug!(code = %e.code, "membership check failed");
            return EventOutcome::Handled;
        }
    }

    let advanced = match state
        .store
        .advance_last_read(payload.room_id, &session.user_id, payload.last_read_seq)
        .await
    {
        Ok(advanced) => advanced,
        Err(e) => {
            tracing::error!(code = %e.code, "read receipt persistence failed");
            return EventOutcome::Reply(GatewayMessage::reject(
                "read_receipt",
                RejectCode::INTERNAL,
                "Read state could not be saved",
            ));
        }
    };

    // Regressions leave the stored value alone and stay silent.
    if advanced {
        state.broadcast.to_room(
            payload.room_id,
            EventName::READ_RECEIPT,
            json!({
                "user_id": session.user_id,
                "room_id": payload.room_id,
                "last_read_seq": payload.last_read_seq,
            }),
        );
    }

    EventOutcome::Handled
}

fn invalid_payload(event: &str) -> EventOutcome {
    EventOutcome::Reply(GatewayMessage::reject(
        event,
        RejectCode::INVALID_PAYLOAD,
        "Malformed payload",
    ))
}
