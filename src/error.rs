//! Error taxonomy for the sync engine.
//!
//! Nothing here is fatal. Transport failures are turned into close events and
//! retried by the session; everything else is reported to the host as a
//! [`crate::state::room::RoomEvent::Error`] and the loop keeps running.

/// Any failure the sync engine can report.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// An inbound message was not valid JSON or was missing required fields.
    #[error("failed to decode inbound message: {0}")]
    Decode(#[from] serde_json::Error),
    /// The websocket failed to connect, read, or write.
    #[error("transport failure: {0}")]
    Transport(Box<tokio_tungstenite::tungstenite::Error>),
    /// The local user was not listed in a roster broadcast. The client is out
    /// of sync with the room; rejoining is left to the host.
    #[error("local user `{user_id}` missing from room roster")]
    LocalUserMissing { user_id: String },
    /// The server refused a role change.
    #[error("role change to `{role}` for `{target_user_id}` rejected: {reason}")]
    RoleSetRejected { target_user_id: String, role: String, reason: String },
    /// The server reported an error.
    #[error("server error: {message}")]
    Server { message: String },
    /// Reading or writing the viewport store failed.
    #[error("viewport store: {0}")]
    ViewportStore(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(Box::new(error))
    }
}
