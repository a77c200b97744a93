//! Replayable edits and the local undo/redo history.
//!
//! An [`Action`] carries enough information to be applied or reverted against
//! a [`TileStore`]. [`ActionEngine`] owns the store and the [`History`], and is
//! the only thing that mutates either.
//!
//! Two paths feed the engine:
//! - local edits, which are applied during the gesture and then pushed onto
//!   the history as one [`Action::Brush`];
//! - remote edits, which are applied directly and never enter the history, so
//!   a local undo can never revert another user's work.

#[cfg(test)]
#[path = "action_test.rs"]
mod action_test;

use serde::{Deserialize, Serialize};

use crate::tiles::{TileSnapshot, TileStore, TileValue};

/// An immutable record of a tile mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    /// One tile changed from `before` to `after`. `before != after` always.
    SetTile { x: i64, y: i64, before: TileValue, after: TileValue },
    /// Every edit from one continuous drag, in the order they were made.
    Brush { actions: Vec<Action> },
}

impl Action {
    /// The action that undoes this one when applied.
    ///
    /// Brushes invert each child and reverse their order, so applying the
    /// inverse walks the same path as [`ActionEngine::revert`].
    #[must_use]
    pub fn inverse(&self) -> Self {
        match self {
            Self::SetTile { x, y, before, after } => {
                Self::SetTile { x: *x, y: *y, before: *after, after: *before }
            }
            Self::Brush { actions } => Self::Brush { actions: actions.iter().rev().map(Self::inverse).collect() },
        }
    }

    /// Number of leaf tile edits carried by this action.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        match self {
            Self::SetTile { .. } => 1,
            Self::Brush { actions } => actions.iter().map(Self::tile_count).sum(),
        }
    }
}

/// Undo and redo stacks of locally-originated actions.
#[derive(Debug, Clone, Default)]
pub struct History {
    undo_stack: Vec<Action>,
    redo_stack: Vec<Action>,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new action. Any redo branch is discarded.
    pub fn push(&mut self, action: Action) {
        self.undo_stack.push(action);
        self.redo_stack.clear();
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Drop both stacks.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

/// Applies and reverts actions against the tile store, and runs undo/redo.
#[derive(Debug, Default)]
pub struct ActionEngine {
    tiles: TileStore,
    history: History,
}

impl ActionEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the tile store.
    #[must_use]
    pub fn tiles(&self) -> &TileStore {
        &self.tiles
    }

    /// Read-only view of the history.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Replace the tile store from a room snapshot.
    ///
    /// History is cleared as well: recorded `before` values describe the
    /// previous map, and reverting them over the new one would corrupt it.
    pub fn load_snapshot(&mut self, snapshot: TileSnapshot) {
        self.tiles.load(snapshot);
        self.history.clear();
    }

    /// Build a `SetTile` for writing `after` at `(x, y)`, or `None` when the
    /// tile already holds `after`.
    #[must_use]
    pub fn create_set_tile_action(&self, x: i64, y: i64, after: TileValue) -> Option<Action> {
        let before = self.tiles.get(x, y);
        (before != after).then_some(Action::SetTile { x, y, before, after })
    }

    /// Apply an action in forward order. `None` is a no-op.
    pub fn apply(&mut self, action: Option<&Action>) {
        if let Some(action) = action {
            apply_to(&mut self.tiles, action);
        }
    }

    /// Revert an action. Brush children are reverted last-to-first.
    pub fn revert(&mut self, action: Option<&Action>) {
        if let Some(action) = action {
            revert_to(&mut self.tiles, action);
        }
    }

    /// Record a locally-originated action that has already been applied.
    pub fn push(&mut self, action: Action) {
        self.history.push(action);
    }

    /// Revert the most recent local action. Returns it, or `None` if there is
    /// nothing to undo.
    pub fn undo(&mut self) -> Option<Action> {
        let action = self.history.undo_stack.pop()?;
        revert_to(&mut self.tiles, &action);
        self.history.redo_stack.push(action.clone());
        Some(action)
    }

    /// Re-apply the most recently undone action. Returns it, or `None` if the
    /// redo stack is empty.
    pub fn redo(&mut self) -> Option<Action> {
        let action = self.history.redo_stack.pop()?;
        apply_to(&mut self.tiles, &action);
        self.history.undo_stack.push(action.clone());
        Some(action)
    }
}

fn apply_to(tiles: &mut TileStore, action: &Action) {
    match action {
        Action::SetTile { x, y, after, .. } => tiles.set(*x, *y, *after),
        Action::Brush { actions } => {
            for child in actions {
                apply_to(tiles, child);
            }
        }
    }
}

fn revert_to(tiles: &mut TileStore, action: &Action) {
    match action {
        Action::SetTile { x, y, before, .. } => tiles.set(*x, *y, *before),
        // Later children may have overwritten tiles touched by earlier ones.
        Action::Brush { actions } => {
            for child in actions.iter().rev() {
                revert_to(tiles, child);
            }
        }
    }
}
