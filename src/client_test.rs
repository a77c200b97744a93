use serde_json::{Value, json};

use super::*;
use crate::config::{InputConfig, PresenceConfig, SessionConfig};
use crate::error::SyncError;
use crate::net::types::RoomUser;

const NOW: i64 = 50_000;

fn fixed_clock() -> i64 {
    NOW
}

fn config() -> ClientConfig {
    ClientConfig {
        server_url: "ws://127.0.0.1:9".to_owned(),
        room_id: "r1".to_owned(),
        user_id: "u1".to_owned(),
        user_name: "Ada".to_owned(),
        session: SessionConfig::default(),
        presence: PresenceConfig::default(),
        input: InputConfig { tile_size: 10.0, snap: true },
        viewport_path: None,
    }
}

fn status_event(session: &SessionHandle) -> SessionEvent {
    let link = session.link();
    SessionEvent::Status { status: link.status, generation: link.generation }
}

struct Harness {
    client: RoomClient,
    session: SessionHandle,
    wire: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedReceiver<RoomEvent>,
}

impl Harness {
    fn new() -> Self {
        let (session, wire) = SessionHandle::detached();
        let (tx, events) = mpsc::unbounded_channel();
        let client = RoomClient::new(&config(), session.clone(), tx).with_clock(fixed_clock);
        Self { client, session, wire, events }
    }

    fn online(mut self) -> Self {
        self.session.set_status(ConnectionStatus::Online);
        self.client.handle_session_event(status_event(&self.session));
        self.drain_wire();
        self
    }

    fn ready(mut self) -> Self {
        self = self.online();
        self.deliver(Inbound::RoomJoined { room_id: "r1".to_owned(), tiles: Default::default() });
        assert!(self.session.can_broadcast());
        self
    }

    fn deliver(&mut self, message: Inbound) {
        self.client.handle_session_event(SessionEvent::Message(message));
    }

    fn command(&mut self, command: Command) {
        assert!(self.client.handle_command(command).is_continue());
    }

    fn drag(&mut self, points: &[(f64, f64)]) {
        let (first, rest) = points.split_first().unwrap();
        let (last, middle) = rest.split_last().unwrap();
        self.command(Command::PointerDown(Point::new(first.0, first.1)));
        for (x, y) in middle {
            self.command(Command::PointerMove(Point::new(*x, *y)));
        }
        self.command(Command::PointerUp(Point::new(last.0, last.1)));
    }

    fn drain_wire(&mut self) -> Vec<Value> {
        let mut sent = Vec::new();
        while let Ok(text) = self.wire.try_recv() {
            sent.push(serde_json::from_str(&text).unwrap());
        }
        sent
    }

    fn sent_of_type(&mut self, tag: &str) -> Vec<Value> {
        self.drain_wire().into_iter().filter(|m| m["type"] == tag).collect()
    }

    fn drain_events(&mut self) -> Vec<RoomEvent> {
        self.client.flush_events();
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

fn sent_action(message: &Value) -> Action {
    serde_json::from_value(message["action"].clone()).unwrap()
}

// =============================================================
// Handshake
// =============================================================

#[test]
fn going_online_sends_auth_then_join() {
    let mut h = Harness::new();
    h.session.set_status(ConnectionStatus::Online);
    h.client.handle_session_event(status_event(&h.session));
    assert_eq!(
        h.drain_wire(),
        vec![json!({ "type": "auth", "userId": "u1", "name": "Ada" }), json!({ "type": "room-join", "roomId": "r1" })]
    );
    assert!(matches!(h.drain_events().as_slice(), [RoomEvent::Status(ConnectionStatus::Online)]));
}

#[test]
fn other_statuses_send_nothing() {
    let mut h = Harness::new();
    h.session.set_status(ConnectionStatus::Reconnecting);
    h.client.handle_session_event(status_event(&h.session));
    assert!(h.drain_wire().is_empty());
}

// =============================================================
// Painting
// =============================================================

#[test]
fn brush_is_broadcast_once_ready() {
    let mut h = Harness::new().ready();
    h.drag(&[(5.0, 5.0), (15.0, 5.0), (25.0, 5.0)]);

    let sent = h.drain_wire();
    let cursors: Vec<_> = sent.iter().filter(|m| m["type"] == "cursor").collect();
    assert_eq!(cursors.len(), 3);
    assert!(cursors.iter().all(|m| m["painting"] == true));

    let actions: Vec<_> = sent.iter().filter(|m| m["type"] == "action").collect();
    assert_eq!(actions.len(), 1);
    let Action::Brush { actions: children } = sent_action(actions[0]) else {
        panic!("expected brush");
    };
    assert_eq!(children.len(), 3);

    let tiles = h.client.room().engine().tiles();
    assert_eq!((tiles.get(0, 0), tiles.get(1, 0), tiles.get(2, 0)), (1, 1, 1));
}

#[test]
fn brush_stays_local_before_room_snapshot() {
    let mut h = Harness::new().online();
    h.drag(&[(5.0, 5.0), (15.0, 5.0)]);

    assert!(h.sent_of_type("action").is_empty());
    assert_eq!(h.client.room().engine().tiles().get(1, 0), 1);
    assert!(h.client.room().engine().history().can_undo());
}

#[test]
fn no_cursor_before_handshake_on_new_connection() {
    let mut h = Harness::new();
    h.session.set_status(ConnectionStatus::Online);
    h.command(Command::PointerMove(Point::new(3.0, 4.0)));
    assert!(h.drain_wire().is_empty());

    h.client.handle_session_event(status_event(&h.session));
    h.drain_wire();
    h.command(Command::PointerMove(Point::new(3.0, 4.0)));
    assert_eq!(h.sent_of_type("cursor").len(), 1);
}

#[test]
fn queued_snapshot_from_dead_connection_keeps_edits_local() {
    let mut h = Harness::new().online();
    // The driver has already reconnected; the loop still holds the old
    // connection's room-joined and the new connection's status events.
    h.session.set_status(ConnectionStatus::Offline);
    h.session.set_status(ConnectionStatus::Online);
    h.deliver(Inbound::RoomJoined { room_id: "r1".to_owned(), tiles: Default::default() });
    assert!(!h.session.can_broadcast());

    h.drag(&[(5.0, 5.0), (15.0, 5.0)]);
    assert!(h.drain_wire().is_empty());

    h.client.handle_session_event(status_event(&h.session));
    assert_eq!(h.sent_of_type("auth").len(), 1);
    h.deliver(Inbound::RoomJoined { room_id: "r1".to_owned(), tiles: Default::default() });
    assert!(h.session.can_broadcast());
}

#[test]
fn offline_drag_sends_nothing() {
    let mut h = Harness::new();
    h.drag(&[(5.0, 5.0), (15.0, 5.0)]);
    assert!(h.drain_wire().is_empty());
    assert_eq!(h.client.room().engine().tiles().get(0, 0), 1);
}

#[test]
fn hover_sends_idle_cursor() {
    let mut h = Harness::new().online();
    h.command(Command::PointerMove(Point::new(3.0, 4.0)));
    assert_eq!(h.drain_wire(), vec![json!({ "type": "cursor", "x": 3.0, "y": 4.0 })]);
    assert!(h.client.room().engine().tiles().is_empty());
}

#[test]
fn erase_tool_clears_tiles() {
    let mut h = Harness::new().ready();
    h.drag(&[(5.0, 5.0), (5.0, 5.0)]);
    h.command(Command::SetTool(Tool::Erase));
    h.drag(&[(5.0, 5.0), (5.0, 5.0)]);
    assert_eq!(h.client.room().engine().tiles().get(0, 0), 0);
    assert_eq!(h.sent_of_type("action").len(), 2);
}

#[test]
fn camera_changes_are_used_and_remembered() {
    let mut h = Harness::new();
    let camera = Camera { pan_x: 100.0, pan_y: 0.0, zoom: 2.0 };
    h.command(Command::SetCamera(camera));
    assert_eq!(h.client.camera(), camera);
    assert_eq!(h.client.viewports.get("r1"), Some(camera));

    // Screen (130, 10) is world (15, 5): tile (1, 0).
    h.drag(&[(130.0, 10.0), (130.0, 10.0)]);
    assert_eq!(h.client.room().engine().tiles().get(1, 0), 1);
}

// =============================================================
// Undo / redo
// =============================================================

#[test]
fn undo_broadcasts_inverse_and_redo_replays() {
    let mut h = Harness::new().ready();
    h.drag(&[(5.0, 5.0), (15.0, 5.0)]);
    let committed = sent_action(&h.sent_of_type("action")[0]);

    h.command(Command::Undo);
    let undo = h.sent_of_type("action");
    assert_eq!(sent_action(&undo[0]), committed.inverse());
    assert!(h.client.room().engine().tiles().is_empty());

    h.command(Command::Redo);
    let redo = h.sent_of_type("action");
    assert_eq!(sent_action(&redo[0]), committed);
    assert_eq!(h.client.room().engine().tiles().get(1, 0), 1);
}

#[test]
fn undo_with_empty_history_sends_nothing() {
    let mut h = Harness::new().ready();
    h.command(Command::Undo);
    h.command(Command::Redo);
    assert!(h.drain_wire().is_empty());
}

#[test]
fn undo_is_ignored_mid_gesture() {
    let mut h = Harness::new().ready();
    h.drag(&[(5.0, 5.0), (5.0, 5.0)]);
    h.command(Command::PointerDown(Point::new(15.0, 5.0)));
    h.command(Command::Undo);
    assert_eq!(h.client.room().engine().tiles().get(0, 0), 1);
    assert_eq!(h.client.room().engine().history().undo_len(), 1);
}

// =============================================================
// Inbound
// =============================================================

#[test]
fn remote_edit_is_not_undoable() {
    let mut h = Harness::new().ready();
    h.deliver(Inbound::Action {
        action: Action::SetTile { x: 7, y: 7, before: 0, after: 3 },
        user_id: Some("u2".to_owned()),
    });
    h.command(Command::Undo);
    assert_eq!(h.client.room().engine().tiles().get(7, 7), 3);
    assert!(h.drain_wire().is_empty());
}

#[test]
fn missing_local_user_surfaces_error_event() {
    let mut h = Harness::new().ready();
    h.drain_events();
    h.deliver(Inbound::RoomUsers {
        users: vec![RoomUser {
            id: "u2".to_owned(),
            name: "Bo".to_owned(),
            role: Role::Owner,
            color: String::new(),
        }],
    });
    let events = h.drain_events();
    assert!(matches!(
        events.as_slice(),
        [RoomEvent::Error(SyncError::LocalUserMissing { user_id })] if user_id == "u1"
    ));
}

#[test]
fn gesture_inside_peer_soft_lock_is_flagged() {
    let mut h = Harness::new().ready();
    h.deliver(Inbound::Cursor {
        user_id: "u2".to_owned(),
        x: 5.0,
        y: 5.0,
        color: None,
        name: None,
        painting: true,
    });
    h.drain_events();

    h.command(Command::PointerDown(Point::new(6.0, 6.0)));
    let events = h.drain_events();
    assert!(matches!(
        events.as_slice(),
        [RoomEvent::SoftLockConflict { user_ids }] if user_ids == &["u2".to_owned()]
    ));
    // Advisory only: the edit still happens.
    assert_eq!(h.client.room().engine().tiles().get(0, 0), 1);
}

#[test]
fn sweep_tick_expires_soft_locks() {
    let mut h = Harness::new().ready();
    h.deliver(Inbound::Cursor {
        user_id: "u2".to_owned(),
        x: 0.0,
        y: 0.0,
        color: None,
        name: None,
        painting: true,
    });
    h.client.sweep(NOW + crate::consts::SOFT_LOCK_TTL_MS + 1);
    assert!(h.client.room().presence().soft_locks().is_empty());
}

// =============================================================
// Requests
// =============================================================

#[test]
fn room_requests_are_sent_when_online() {
    let mut h = Harness::new().online();
    h.command(Command::SetRole { target_user_id: "u2".to_owned(), role: Role::Viewer });
    h.command(Command::ListRooms);
    h.command(Command::CreateRoom { name: Some("Map".to_owned()) });
    h.command(Command::UpdateSettings(RoomSettings { is_public: Some(false), ..RoomSettings::default() }));
    assert_eq!(
        h.drain_wire(),
        vec![
            json!({ "type": "role-set", "targetUserId": "u2", "role": "viewer" }),
            json!({ "type": "room-list" }),
            json!({ "type": "room-create", "name": "Map" }),
            json!({ "type": "room-settings-update", "roomId": "r1", "settings": { "isPublic": false } }),
        ]
    );
}

#[test]
fn ping_only_when_online() {
    let mut h = Harness::new();
    h.client.ping(1);
    assert!(h.drain_wire().is_empty());

    let mut h = h.online();
    h.client.ping(123);
    assert_eq!(h.drain_wire(), vec![json!({ "type": "ping", "ts": 123 })]);
}

#[test]
fn shutdown_breaks_the_loop() {
    let mut h = Harness::new();
    assert!(h.client.handle_command(Command::Shutdown).is_break());
}

#[tokio::test]
async fn run_loop_handles_events_and_commands() {
    let Harness { client, session, mut wire, mut events } = Harness::new();
    let (session_tx, session_rx) = mpsc::unbounded_channel();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(client.run(session_rx, command_rx));

    session.set_status(ConnectionStatus::Online);
    session_tx.send(status_event(&session)).unwrap();
    session_tx
        .send(SessionEvent::Message(Inbound::RoomJoined { room_id: "r1".to_owned(), tiles: Default::default() }))
        .unwrap();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
        if matches!(event, RoomEvent::Ready { .. }) {
            break;
        }
    }

    command_tx.send(Command::Shutdown).unwrap();
    task.await.unwrap();

    let mut tags = Vec::new();
    while let Ok(text) = wire.try_recv() {
        let message: Value = serde_json::from_str(&text).unwrap();
        if message["type"] != "ping" {
            tags.push(message["type"].as_str().unwrap().to_owned());
        }
    }
    assert_eq!(tags, vec!["auth", "room-join"]);
}
