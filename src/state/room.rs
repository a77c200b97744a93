//! Room reducer: one handler per inbound tag over [`Room`].
//!
//! DESIGN
//! ======
//! Handlers are registered on a [`Dispatcher<Room>`] by [`register_handlers`].
//! Each one is a synchronous step that mutates the tile map or presence and
//! queues [`RoomEvent`]s for the host. A handler that returns an error has
//! still applied whatever it could; the caller reports the error and moves on.
//!
//! Peer edits are applied through the engine but never enter history. Soft
//! locks are created here and only ever removed by [`Room::sweep`].
//!
//! The room remembers which connection generation its handshake went out on.
//! A `room-joined` marks the link ready only for that generation while it is
//! still live.

#[cfg(test)]
#[path = "room_test.rs"]
mod room_test;

use tracing::{debug, info, warn};

use crate::action::ActionEngine;
use crate::camera::Point;
use crate::clock;
use crate::config::PresenceConfig;
use crate::error::SyncError;
use crate::net::dispatch::Dispatcher;
use crate::net::session::{ConnectionStatus, SessionHandle};
use crate::net::types::{Inbound, InboundKind, Role, RoomSummary};
use crate::state::presence::{CursorState, Presence, RosterUpdate};

/// Notifications for the host UI.
#[derive(Debug)]
pub enum RoomEvent {
    Status(ConnectionStatus),
    Authenticated { user_id: String },
    /// The room snapshot was loaded and edits may be broadcast.
    Ready { room_id: String, tiles: usize },
    RoleChanged { previous: Option<Role>, role: Role },
    RoleSetAccepted { target_user_id: String, role: Role },
    /// A peer's edit was applied to the map.
    RemoteEdit { user_id: Option<String>, tiles: usize },
    /// Peers are painting where the local gesture just started. Advisory only.
    SoftLockConflict { user_ids: Vec<String> },
    Saving,
    Saved { ts: Option<i64> },
    RoomLeft,
    Latency { rtt_ms: i64 },
    RoomList(Vec<RoomSummary>),
    RoomCreated { room_id: String },
    Error(SyncError),
}

/// Transient server-reported status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomStatus {
    pub authenticated_as: Option<String>,
    pub joined: bool,
    pub saving: bool,
    pub last_saved: Option<i64>,
    pub last_error: Option<String>,
    pub rtt_ms: Option<i64>,
}

/// Everything the local client knows about one room.
#[derive(Debug)]
pub struct Room {
    room_id: String,
    local_user_id: String,
    engine: ActionEngine,
    presence: Presence,
    status: RoomStatus,
    session: SessionHandle,
    events: Vec<RoomEvent>,
    clock: fn() -> i64,
    connection: Option<u64>,
}

impl Room {
    #[must_use]
    pub fn new(room_id: String, local_user_id: String, presence: &PresenceConfig, session: SessionHandle) -> Self {
        Self {
            room_id,
            local_user_id,
            engine: ActionEngine::new(),
            presence: Presence::new(presence),
            status: RoomStatus::default(),
            session,
            events: Vec::new(),
            clock: clock::now_ms,
            connection: None,
        }
    }

    /// Replace the time source used for cursor timestamps and latency.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    #[must_use]
    pub fn local_user_id(&self) -> &str {
        &self.local_user_id
    }

    #[must_use]
    pub fn engine(&self) -> &ActionEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ActionEngine {
        &mut self.engine
    }

    #[must_use]
    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    #[must_use]
    pub fn status(&self) -> &RoomStatus {
        &self.status
    }

    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Record the connection generation the handshake was sent on, or `None`
    /// once that connection is gone.
    pub fn set_connection(&mut self, generation: Option<u64>) {
        self.connection = generation;
    }

    /// Whether the handshake went out on the connection that is live now.
    #[must_use]
    pub fn handshake_sent(&self) -> bool {
        self.connection.is_some_and(|generation| self.session.is_current(generation))
    }

    #[must_use]
    pub fn now_ms(&self) -> i64 {
        (self.clock)()
    }

    pub fn push_event(&mut self, event: RoomEvent) {
        self.events.push(event);
    }

    /// Drain queued events in the order they were raised.
    pub fn take_events(&mut self) -> Vec<RoomEvent> {
        std::mem::take(&mut self.events)
    }

    /// Expire soft locks older than the TTL.
    pub fn sweep(&mut self, now_ms: i64) {
        let expired = self.presence.sweep(now_ms);
        if !expired.is_empty() {
            debug!(count = expired.len(), "room: soft locks expired");
        }
    }

    /// Owners of live soft locks covering a world point.
    #[must_use]
    pub fn lock_conflicts(&self, x: f64, y: f64) -> Vec<String> {
        self.presence.lock_conflicts(Point::new(x, y), self.now_ms())
    }

    // ── handlers ────────────────────────────────────────────────

    fn on_auth_ok(&mut self, message: &Inbound) -> Result<(), SyncError> {
        let Inbound::AuthOk { user_id } = message else { return Ok(()) };
        info!(%user_id, "room: authenticated");
        self.status.authenticated_as = Some(user_id.clone());
        self.events.push(RoomEvent::Authenticated { user_id: user_id.clone() });
        Ok(())
    }

    fn on_room_joined(&mut self, message: &Inbound) -> Result<(), SyncError> {
        let Inbound::RoomJoined { room_id, tiles } = message else { return Ok(()) };
        if *room_id != self.room_id {
            warn!(expected = %self.room_id, got = %room_id, "room: snapshot for another room ignored");
            return Ok(());
        }
        self.engine.load_snapshot(tiles.clone());
        self.status.joined = true;
        let count = self.engine.tiles().len();
        let live = self.connection.is_some_and(|generation| self.session.mark_ready(generation));
        if !live {
            debug!(%room_id, tiles = count, "room: snapshot from a previous connection, not marking ready");
            return Ok(());
        }
        info!(%room_id, tiles = count, "room: snapshot loaded");
        self.events.push(RoomEvent::Ready { room_id: room_id.clone(), tiles: count });
        Ok(())
    }

    fn on_room_users(&mut self, message: &Inbound) -> Result<(), SyncError> {
        let Inbound::RoomUsers { users } = message else { return Ok(()) };
        match self.presence.replace_roster(users.clone(), &self.local_user_id) {
            RosterUpdate::Unchanged => Ok(()),
            RosterUpdate::RoleChanged { previous, role } => {
                info!(?previous, %role, "room: local role changed");
                self.events.push(RoomEvent::RoleChanged { previous, role });
                Ok(())
            }
            RosterUpdate::LocalUserMissing => {
                warn!(user_id = %self.local_user_id, "room: local user missing from roster");
                Err(SyncError::LocalUserMissing { user_id: self.local_user_id.clone() })
            }
        }
    }

    fn on_action(&mut self, message: &Inbound) -> Result<(), SyncError> {
        let Inbound::Action { action, user_id } = message else { return Ok(()) };
        if user_id.as_deref() == Some(self.local_user_id.as_str()) {
            debug!("room: ignoring echo of own edit");
            return Ok(());
        }
        self.engine.apply(Some(action));
        self.events.push(RoomEvent::RemoteEdit { user_id: user_id.clone(), tiles: action.tile_count() });
        Ok(())
    }

    fn on_cursor(&mut self, message: &Inbound) -> Result<(), SyncError> {
        let Inbound::Cursor { user_id, x, y, color, name, painting } = message else {
            return Ok(());
        };
        if *user_id == self.local_user_id {
            return Ok(());
        }
        let now = self.now_ms();
        self.presence.upsert_cursor(
            user_id,
            CursorState { x: *x, y: *y, color: color.clone(), name: name.clone(), timestamp_ms: now },
        );
        if *painting {
            self.presence.refresh_soft_lock(user_id, *x, *y, now);
        }
        Ok(())
    }

    fn on_role_set_response(&mut self, message: &Inbound) -> Result<(), SyncError> {
        let Inbound::RoleSetResponse { success, target_user_id, role, error } = message else {
            return Ok(());
        };
        if *success {
            info!(%target_user_id, %role, "room: role change accepted");
            self.events.push(RoomEvent::RoleSetAccepted { target_user_id: target_user_id.clone(), role: role.clone() });
            return Ok(());
        }
        let reason = error.clone().unwrap_or_else(|| "rejected".to_owned());
        warn!(%target_user_id, %role, %reason, "room: role change rejected");
        Err(SyncError::RoleSetRejected { target_user_id: target_user_id.clone(), role: role.to_string(), reason })
    }

    fn on_room_left(&mut self, message: &Inbound) -> Result<(), SyncError> {
        let Inbound::RoomLeft { .. } = message else { return Ok(()) };
        info!(room_id = %self.room_id, "room: left");
        self.status.joined = false;
        self.events.push(RoomEvent::RoomLeft);
        Ok(())
    }

    fn on_saving(&mut self, _message: &Inbound) -> Result<(), SyncError> {
        self.status.saving = true;
        self.events.push(RoomEvent::Saving);
        Ok(())
    }

    fn on_saved(&mut self, message: &Inbound) -> Result<(), SyncError> {
        let Inbound::Saved { ts } = message else { return Ok(()) };
        self.status.saving = false;
        self.status.last_saved = *ts;
        self.events.push(RoomEvent::Saved { ts: *ts });
        Ok(())
    }

    fn on_error(&mut self, message: &Inbound) -> Result<(), SyncError> {
        let Inbound::Error { message } = message else { return Ok(()) };
        warn!(%message, "room: server error");
        self.status.last_error = Some(message.clone());
        Err(SyncError::Server { message: message.clone() })
    }

    fn on_pong(&mut self, message: &Inbound) -> Result<(), SyncError> {
        let Inbound::Pong { ts } = message else { return Ok(()) };
        let rtt_ms = self.now_ms().saturating_sub(*ts).max(0);
        debug!(rtt_ms, "room: latency");
        self.status.rtt_ms = Some(rtt_ms);
        self.events.push(RoomEvent::Latency { rtt_ms });
        Ok(())
    }

    fn on_room_list_response(&mut self, message: &Inbound) -> Result<(), SyncError> {
        let Inbound::RoomListResponse { rooms } = message else { return Ok(()) };
        self.events.push(RoomEvent::RoomList(rooms.clone()));
        Ok(())
    }

    fn on_room_created(&mut self, message: &Inbound) -> Result<(), SyncError> {
        let Inbound::RoomCreated { room_id } = message else { return Ok(()) };
        info!(%room_id, "room: created");
        self.events.push(RoomEvent::RoomCreated { room_id: room_id.clone() });
        Ok(())
    }
}

/// Register the room handlers, one per inbound tag.
pub fn register_handlers(table: &mut Dispatcher<Room>) {
    table.on(InboundKind::AuthOk, Room::on_auth_ok);
    table.on(InboundKind::RoomJoined, Room::on_room_joined);
    table.on(InboundKind::RoomUsers, Room::on_room_users);
    table.on(InboundKind::Action, Room::on_action);
    table.on(InboundKind::Cursor, Room::on_cursor);
    table.on(InboundKind::RoleSetResponse, Room::on_role_set_response);
    table.on(InboundKind::RoomLeft, Room::on_room_left);
    table.on(InboundKind::Saving, Room::on_saving);
    table.on(InboundKind::Saved, Room::on_saved);
    table.on(InboundKind::Error, Room::on_error);
    table.on(InboundKind::Pong, Room::on_pong);
    table.on(InboundKind::RoomListResponse, Room::on_room_list_response);
    table.on(InboundKind::RoomCreated, Room::on_room_created);
}

/// A dispatcher with the room handlers already registered.
#[must_use]
pub fn room_dispatcher() -> Dispatcher<Room> {
    let mut table = Dispatcher::new();
    register_handlers(&mut table);
    table
}
