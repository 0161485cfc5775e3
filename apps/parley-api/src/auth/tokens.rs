//! Opaque access tokens and single-use gateway connect tickets.
//!
//! The external login flow mints these; the core only validates. Access
//! tokens authenticate the HTTP surface, connect tickets authenticate one
//! WebSocket handshake and are consumed on first use.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::store::KeyValueStore;

/// Generate an opaque random token with the given prefix.
pub fn generate_opaque_token(prefix: &str, bytes: usize) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use rand::Rng;
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(&mut buf[..]);
    format!("{}_{}", prefix, URL_SAFE_NO_PAD.encode(&buf))
}

// ---------------------------------------------------------------------------
// Access token — 1-hour TTL
// ---------------------------------------------------------------------------

pub const ACCESS_TTL_SECS: u64 = 3600;

/// Data stored alongside an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessData {
    pub user_id: String,
}

pub fn generate_access_token() -> String {
    generate_opaque_token("tok", 32)
}

pub async fn store_access_token(
    kv: &dyn KeyValueStore,
    token: &str,
    data: &AccessData,
) -> Result<(), ApiError> {
    let key = format!("parley:tok:{}", token);
    let value = serde_json::to_string(data).map_err(|_| ApiError::internal("serialization"))?;
    kv.set_ex(&key, &value, ACCESS_TTL_SECS).await
}

pub async fn lookup_access_token(
    kv: &dyn KeyValueStore,
    token: &str,
) -> Result<Option<AccessData>, ApiError> {
    let key = format!("parley:tok:{}", token);
    match kv.get(&key).await? {
        Some(v) => {
            let data: AccessData =
                serde_json::from_str(&v).map_err(|_| ApiError::internal("corrupt token data"))?;
            Ok(Some(data))
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Connect ticket — 30-second TTL, single-use
// ---------------------------------------------------------------------------

pub const CONNECT_TICKET_TTL_SECS: u64 = 30;

/// Data stored alongside a connect ticket.
#[derive(Debug, Serialize, Deserialize)]
pub struct TicketData {
    pub user_id: String,
}

pub fn generate_connect_ticket() -> String {
    generate_opaque_token("ct", 32)
}

pub async fn store_connect_ticket(
    kv: &dyn KeyValueStore,
    ticket: &str,
    data: &TicketData,
) -> Result<(), ApiError> {
    let key = format!("parley:ct:{}", ticket);
    let value = serde_json::to_string(data).map_err(|_| ApiError::internal("serialization"))?;
    kv.set_ex(&key, &value, CONNECT_TICKET_TTL_SECS).await
}

/// Look up and delete a connect ticket in one step. A second consume of the
/// same ticket returns `None`.
pub async fn consume_connect_ticket(
    kv: &dyn KeyValueStore,
    ticket: &str,
) -> Result<Option<TicketData>, ApiError> {
    let key = format!("parley:ct:{}", ticket);
    let val = kv.get(&key).await?;
    if val.is_some() {
        let _ = kv.del(&key).await;
    }
    match val {
        Some(v) => {
            let data: TicketData =
                serde_json::from_str(&v).map_err(|_| ApiError::internal("corrupt ticket data"))?;
            Ok(Some(data))
        }
        None => Ok(None),
    }
}
