//! Real-time synchronization engine for collaborative tile maps.
//!
//! A client joins one room over a websocket, keeps a local copy of the room's
//! sparse tile map, and exchanges edits, cursors, and presence with its peers.
//! Local edits apply immediately and are broadcast as replayable actions;
//! remote edits are applied on arrival. Drawing is left to the host, which
//! feeds pointer input in as [`client::Command`]s and reads
//! [`client::RoomEvent`]s back out.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`tiles`] | Sparse tile store keyed by signed integer coordinates |
//! | [`action`] | Replayable edits, apply/revert, undo/redo history |
//! | [`camera`] | Screen → world → tile conversion |
//! | [`input`] | Pointer gestures to brush strokes |
//! | [`net`] | Wire protocol, reconnecting session, typed dispatch |
//! | [`state`] | Room reducer, presence and soft locks, viewport store |
//! | [`client`] | Event loop tying session, room, input, and timers together |
//! | [`config`] | Tunables with environment overrides |
//! | [`error`] | [`error::SyncError`] |
//! | [`consts`] | Default tunables |

pub mod action;
pub mod camera;
pub mod client;
pub mod clock;
pub mod config;
pub mod consts;
pub mod error;
pub mod input;
pub mod net;
pub mod state;
pub mod tiles;
