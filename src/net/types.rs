//! Wire protocol for the room server.
//!
//! DESIGN
//! ======
//! Every message is one JSON object with a `type` tag, sent as a websocket text
//! frame. Tags are kebab-case (`role-set-response`), field names camelCase
//! (`targetUserId`). Inbound tags this client does not know decode to
//! [`Inbound::Unknown`] and are ignored; a known tag with missing fields is a
//! decode error, which the session logs and drops.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::error::SyncError;
use crate::tiles::TileSnapshot;

/// A user's permission level in a room. Roles this client has no name for
/// are kept verbatim in [`Role::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Owner,
    Editor,
    Viewer,
    Other(String),
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Owner => "owner",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        match name.as_str() {
            "owner" => Self::Owner,
            "editor" => Self::Editor,
            "viewer" => Self::Viewer,
            _ => Self::Other(name),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomUser {
    pub id: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub color: String,
}

/// One entry of a `room-list-response`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user_count: usize,
}

/// Sparse room settings update. Only present fields are changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    /// Role granted to users joining for the first time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_role: Option<Role>,
}

/// Messages this client sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Outbound {
    /// Identify this connection. Sent first after every connect.
    Auth { user_id: String, name: String },
    /// Enter a room; answered by `room-joined` carrying the full map.
    RoomJoin { room_id: String },
    RoomLeave,
    /// A locally-originated edit for peers to apply.
    Action { action: Action },
    /// Pointer position in world units. `painting` marks an active drag.
    Cursor {
        x: f64,
        y: f64,
        #[serde(default, skip_serializing_if = "is_false")]
        painting: bool,
    },
    RoleSet { target_user_id: String, role: Role },
    RoomList,
    RoomCreate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    RoomSettingsUpdate { room_id: String, settings: RoomSettings },
    /// Latency probe. `ts` is echoed back in `pong`.
    Ping { ts: i64 },
}

/// Messages this client consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Inbound {
    AuthOk { user_id: String },
    /// Full map snapshot on room entry and after every rejoin.
    RoomJoined {
        room_id: String,
        #[serde(default)]
        tiles: TileSnapshot,
    },
    /// Authoritative roster; replaces the previous one wholesale.
    RoomUsers { users: Vec<RoomUser> },
    /// A peer's edit.
    Action {
        action: Action,
        #[serde(default)]
        user_id: Option<String>,
    },
    Cursor {
        user_id: String,
        x: f64,
        y: f64,
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        painting: bool,
    },
    RoleSetResponse {
        success: bool,
        target_user_id: String,
        role: Role,
        #[serde(default)]
        error: Option<String>,
    },
    RoomLeft {
        #[serde(default)]
        room_id: Option<String>,
    },
    Pong { ts: i64 },
    Error { message: String },
    Saving {},
    Saved {
        #[serde(default)]
        ts: Option<i64>,
    },
    RoomListResponse { rooms: Vec<RoomSummary> },
    RoomCreated { room_id: String },
    /// Any tag this client does not handle.
    #[serde(other)]
    Unknown,
}

/// Dispatch key for an [`Inbound`] message: one per inbound tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundKind {
    AuthOk,
    RoomJoined,
    RoomUsers,
    Action,
    Cursor,
    RoleSetResponse,
    RoomLeft,
    Pong,
    Error,
    Saving,
    Saved,
    RoomListResponse,
    RoomCreated,
    Unknown,
}

impl InboundKind {
    /// The wire tag for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthOk => "auth-ok",
            Self::RoomJoined => "room-joined",
            Self::RoomUsers => "room-users",
            Self::Action => "action",
            Self::Cursor => "cursor",
            Self::RoleSetResponse => "role-set-response",
            Self::RoomLeft => "room-left",
            Self::Pong => "pong",
            Self::Error => "error",
            Self::Saving => "saving",
            Self::Saved => "saved",
            Self::RoomListResponse => "room-list-response",
            Self::RoomCreated => "room-created",
            Self::Unknown => "unknown",
        }
    }
}

impl Inbound {
    /// Dispatch key for this message.
    #[must_use]
    pub fn kind(&self) -> InboundKind {
        match self {
            Self::AuthOk { .. } => InboundKind::AuthOk,
            Self::RoomJoined { .. } => InboundKind::RoomJoined,
            Self::RoomUsers { .. } => InboundKind::RoomUsers,
            Self::Action { .. } => InboundKind::Action,
            Self::Cursor { .. } => InboundKind::Cursor,
            Self::RoleSetResponse { .. } => InboundKind::RoleSetResponse,
            Self::RoomLeft { .. } => InboundKind::RoomLeft,
            Self::Pong { .. } => InboundKind::Pong,
            Self::Error { .. } => InboundKind::Error,
            Self::Saving {} => InboundKind::Saving,
            Self::Saved { .. } => InboundKind::Saved,
            Self::RoomListResponse { .. } => InboundKind::RoomListResponse,
            Self::RoomCreated { .. } => InboundKind::RoomCreated,
            Self::Unknown => InboundKind::Unknown,
        }
    }
}

/// Serialize an outbound message to its wire text.
///
/// # Errors
///
/// Returns [`SyncError::Decode`] if serialization fails, which does not happen
/// for well-formed messages.
pub fn encode(message: &Outbound) -> Result<String, SyncError> {
    Ok(serde_json::to_string(message)?)
}

/// Parse inbound wire text.
///
/// # Errors
///
/// Returns [`SyncError::Decode`] for invalid JSON or a known tag missing
/// required fields.
pub fn decode(text: &str) -> Result<Inbound, SyncError> {
    Ok(serde_json::from_str(text)?)
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}
