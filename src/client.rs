//! Client event loop: one room, one session, one task.
//!
//! DESIGN
//! ======
//! [`RoomClient::run`] multiplexes four sources with `tokio::select!`:
//!
//! - session events (status changes and decoded messages),
//! - host commands (pointer input, tools, undo/redo, room requests),
//! - the soft-lock sweep tick,
//! - the latency probe tick.
//!
//! Each branch is one synchronous step over the room state, after which queued
//! [`RoomEvent`]s are flushed to the host. Nothing inside a step awaits, so
//! state is never observed half-updated.
//!
//! BROADCAST GATING
//! ================
//! Cursor updates go out once the handshake has been sent on the live
//! connection. Edits (brush commits, undo, redo) additionally wait for that
//! connection's room snapshot; until then they stay local.

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;

use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::action::Action;
use crate::camera::{Camera, Point};
use crate::config::ClientConfig;
use crate::input::{InputEffect, InputTranslator, Tool};
use crate::net::dispatch::Dispatcher;
use crate::net::session::{ConnectionStatus, SessionEvent, SessionHandle, spawn_session};
use crate::net::types::{Inbound, Outbound, Role, RoomSettings};
pub use crate::state::room::RoomEvent;
use crate::state::room::{Room, room_dispatcher};
use crate::state::viewport::ViewportStore;

/// Host input to the client loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Screen-space pointer press.
    PointerDown(Point),
    PointerMove(Point),
    /// Release; the point is sampled once more before the gesture ends.
    PointerUp(Point),
    SetTool(Tool),
    SetPaintValue(NonZeroU32),
    SetSnap(bool),
    /// New viewport. Persisted for the room.
    SetCamera(Camera),
    Undo,
    Redo,
    SetRole { target_user_id: String, role: Role },
    ListRooms,
    CreateRoom { name: Option<String> },
    UpdateSettings(RoomSettings),
    Shutdown,
}

#[derive(Debug)]
pub struct RoomClient {
    room: Room,
    dispatcher: Dispatcher<Room>,
    input: InputTranslator,
    camera: Camera,
    viewports: ViewportStore,
    user_name: String,
    ping_interval: Duration,
    sweep_interval: Duration,
    events: mpsc::UnboundedSender<RoomEvent>,
}

impl RoomClient {
    #[must_use]
    pub fn new(config: &ClientConfig, session: SessionHandle, events: mpsc::UnboundedSender<RoomEvent>) -> Self {
        let viewports = config.viewport_path.clone().map_or_else(ViewportStore::in_memory, ViewportStore::open);
        let camera = viewports.get(&config.room_id).unwrap_or_default();
        Self {
            room: Room::new(config.room_id.clone(), config.user_id.clone(), &config.presence, session),
            dispatcher: room_dispatcher(),
            input: InputTranslator::new(&config.input),
            camera,
            viewports,
            user_name: config.user_name.clone(),
            ping_interval: config.session.ping_interval,
            sweep_interval: config.presence.sweep_interval,
            events,
        }
    }

    /// Replace the room's time source.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.room = self.room.with_clock(clock);
        self
    }

    #[must_use]
    pub fn room(&self) -> &Room {
        &self.room
    }

    #[must_use]
    pub fn camera(&self) -> Camera {
        self.camera
    }

    #[must_use]
    pub fn input(&self) -> &InputTranslator {
        &self.input
    }

    /// Drive the loop until shutdown, the command channel closing, or the
    /// session driver exiting.
    pub async fn run(
        mut self,
        mut session_events: mpsc::UnboundedReceiver<SessionEvent>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ping = tokio::time::interval(self.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(room_id = %self.room.room_id(), "client: running");
        loop {
            let flow = tokio::select! {
                event = session_events.recv() => match event {
                    Some(event) => {
                        self.handle_session_event(event);
                        ControlFlow::Continue(())
                    }
                    None => {
                        info!("client: session ended");
                        ControlFlow::Break(())
                    }
                },
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        info!("client: command channel closed");
                        self.room.session().close();
                        ControlFlow::Break(())
                    }
                },
                _ = sweep.tick() => {
                    let now = self.room.now_ms();
                    self.sweep(now);
                    ControlFlow::Continue(())
                }
                _ = ping.tick() => {
                    let now = self.room.now_ms();
                    self.ping(now);
                    ControlFlow::Continue(())
                }
            };
            self.flush_events();
            if flow.is_break() {
                break;
            }
        }
        info!(room_id = %self.room.room_id(), "client: stopped");
    }

    pub fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Status { status, generation } => self.on_status(status, generation),
            SessionEvent::Message(message) => self.on_message(&message),
        }
    }

    /// Apply one host command. Returns `Break` after [`Command::Shutdown`].
    pub fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::PointerDown(screen) => self.pointer_down(screen),
            Command::PointerMove(screen) => {
                let effects = self.input.pointer_move(screen, &self.camera, self.room.engine_mut());
                self.apply_effects(effects);
            }
            Command::PointerUp(screen) => {
                let mut effects = self.input.pointer_move(screen, &self.camera, self.room.engine_mut());
                effects.extend(self.input.pointer_up(self.room.engine_mut()));
                self.apply_effects(effects);
            }
            Command::SetTool(tool) => self.input.set_tool(tool),
            Command::SetPaintValue(value) => self.input.set_paint_value(value),
            Command::SetSnap(snap) => self.input.set_snap(snap),
            Command::SetCamera(camera) => self.set_camera(camera),
            Command::Undo => self.undo(),
            Command::Redo => self.redo(),
            Command::SetRole { target_user_id, role } => {
                self.request(&Outbound::RoleSet { target_user_id, role });
            }
            Command::ListRooms => self.request(&Outbound::RoomList),
            Command::CreateRoom { name } => self.request(&Outbound::RoomCreate { name }),
            Command::UpdateSettings(settings) => {
                let room_id = self.room.room_id().to_owned();
                self.request(&Outbound::RoomSettingsUpdate { room_id, settings });
            }
            Command::Shutdown => {
                info!("client: shutdown requested");
                self.room.session().close();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Expire stale soft locks.
    pub fn sweep(&mut self, now_ms: i64) {
        self.room.sweep(now_ms);
    }

    /// Send a latency probe if online.
    pub fn ping(&mut self, now_ms: i64) {
        if self.room.session().is_online() {
            self.room.session().send(&Outbound::Ping { ts: now_ms });
        }
    }

    fn on_status(&mut self, status: ConnectionStatus, generation: u64) {
        debug!(?status, generation, "client: session status");
        self.room.push_event(RoomEvent::Status(status));
        if status != ConnectionStatus::Online {
            self.room.set_connection(None);
            return;
        }
        let session = self.room.session();
        session.send(&Outbound::Auth { user_id: self.room.local_user_id().to_owned(), name: self.user_name.clone() });
        session.send(&Outbound::RoomJoin { room_id: self.room.room_id().to_owned() });
        self.room.set_connection(Some(generation));
    }

    fn on_message(&mut self, message: &Inbound) {
        let kind = message.kind();
        for error in self.dispatcher.dispatch(&mut self.room, message) {
            warn!(kind = kind.as_str(), error = %error, "client: handler failed");
            self.room.push_event(RoomEvent::Error(error));
        }
    }

    fn pointer_down(&mut self, screen: Point) {
        let world = self.camera.screen_to_world(screen);
        let user_ids = self.room.lock_conflicts(world.x, world.y);
        if !user_ids.is_empty() {
            debug!(?user_ids, "client: gesture starts inside a soft lock");
            self.room.push_event(RoomEvent::SoftLockConflict { user_ids });
        }
        let effects = self.input.pointer_down(screen, &self.camera, self.room.engine_mut());
        self.apply_effects(effects);
    }

    fn apply_effects(&mut self, effects: Vec<InputEffect>) {
        for effect in effects {
            match effect {
                InputEffect::Cursor { x, y, painting } => {
                    if self.room.handshake_sent() {
                        self.room.session().send(&Outbound::Cursor { x, y, painting });
                    }
                }
                InputEffect::Commit(action) => self.broadcast(action),
            }
        }
    }

    fn undo(&mut self) {
        if self.input.is_dragging() {
            debug!("client: undo ignored during a gesture");
            return;
        }
        if let Some(action) = self.room.engine_mut().undo() {
            self.broadcast(action.inverse());
        }
    }

    fn redo(&mut self) {
        if self.input.is_dragging() {
            debug!("client: redo ignored during a gesture");
            return;
        }
        if let Some(action) = self.room.engine_mut().redo() {
            self.broadcast(action);
        }
    }

    fn broadcast(&self, action: Action) {
        let session = self.room.session();
        if !session.can_broadcast() {
            debug!(tiles = action.tile_count(), "client: edit kept local, room not ready");
            return;
        }
        session.send(&Outbound::Action { action });
    }

    fn request(&self, message: &Outbound) {
        if !self.room.session().send(message) {
            debug!(?message, "client: request dropped while offline");
        }
    }

    fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
        if let Err(e) = self.viewports.save(self.room.room_id(), camera) {
            warn!(error = %e, "client: failed to persist viewport");
        }
    }

    fn flush_events(&mut self) {
        for event in self.room.take_events() {
            if self.events.send(event).is_err() {
                debug!("client: event receiver dropped");
                return;
            }
        }
    }
}

/// Host side of a spawned client.
#[derive(Debug)]
pub struct ClientHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedReceiver<RoomEvent>,
    session: SessionHandle,
    task: JoinHandle<()>,
}

impl ClientHandle {
    /// Queue a command. Returns `false` once the loop has stopped.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Next notification, or `None` after the loop stops.
    pub async fn next_event(&mut self) -> Option<RoomEvent> {
        self.events.recv().await
    }

    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Stop the loop and the session, and wait for both.
    ///
    /// # Errors
    ///
    /// Returns the join error if the loop task panicked.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        if !self.send(Command::Shutdown) {
            debug!("client: loop already stopped");
        }
        self.task.await
    }
}

/// Start the session driver and the client loop for `config`.
#[must_use]
pub fn spawn(config: ClientConfig) -> ClientHandle {
    let (session, session_events, driver) = spawn_session(config.server_url.clone(), config.session.backoff);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    let client = RoomClient::new(&config, session.clone(), events_tx);
    let task = tokio::spawn(async move {
        client.run(session_events, commands_rx).await;
        if let Err(e) = driver.await {
            warn!(error = %e, "client: session driver failed");
        }
    });

    ClientHandle { commands: commands_tx, events: events_rx, session, task }
}
