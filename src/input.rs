//! Input translator: turns pointer gestures into tile edits.
//!
//! One continuous drag is one gesture:
//!
//! ```text
//! Idle --pointer_down--> Dragging --pointer_move*--> Dragging --pointer_up--> Idle
//! ```
//!
//! Every sample while dragging is converted screen → world → tile, deduped
//! against the tiles already visited in this gesture, run through the engine's
//! no-op guard, and applied immediately so the local view never lags. On
//! release the collected edits become a single [`Action::Brush`] on the
//! history. Every sample, dragging or not, also yields a cursor effect.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use std::collections::HashSet;
use std::num::NonZeroU32;

use crate::action::{Action, ActionEngine};
use crate::camera::{Camera, Point, world_to_tile};
use crate::config::InputConfig;
use crate::tiles::{EMPTY, TileCoord, TileValue};

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Paint the selected tile type.
    #[default]
    Paint,
    /// Clear tiles back to empty.
    Erase,
}

/// Gesture state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Dragging,
}

/// Output of an input sample for the caller to act on.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEffect {
    /// Latest pointer position in world units, for peers.
    Cursor { x: f64, y: f64, painting: bool },
    /// A finished brush. Already applied locally and pushed to history; the
    /// caller only has to broadcast it.
    Commit(Action),
}

/// Per-gesture input state.
#[derive(Debug)]
pub struct InputTranslator {
    tool: Tool,
    paint_value: NonZeroU32,
    tile_size: f64,
    snap: bool,
    state: GestureState,
    visited: HashSet<TileCoord>,
    pending: Vec<Action>,
}

impl InputTranslator {
    #[must_use]
    pub fn new(config: &InputConfig) -> Self {
        Self {
            tool: Tool::default(),
            paint_value: NonZeroU32::MIN,
            tile_size: config.tile_size,
            snap: config.snap,
            state: GestureState::Idle,
            visited: HashSet::new(),
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    /// Tile type written by [`Tool::Paint`].
    pub fn set_paint_value(&mut self, value: NonZeroU32) {
        self.paint_value = value;
    }

    pub fn set_snap(&mut self, snap: bool) {
        self.snap = snap;
    }

    #[must_use]
    pub fn state(&self) -> GestureState {
        self.state
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.state == GestureState::Dragging
    }

    /// Start a gesture and paint the tile under the pointer. A gesture still
    /// open from a missed release is committed first.
    pub fn pointer_down(&mut self, screen: Point, camera: &Camera, engine: &mut ActionEngine) -> Vec<InputEffect> {
        let mut effects = self.pointer_up(engine);
        self.state = GestureState::Dragging;
        effects.extend(self.sample(screen, camera, engine));
        effects
    }

    /// Track the pointer; paints only while a gesture is active.
    pub fn pointer_move(&mut self, screen: Point, camera: &Camera, engine: &mut ActionEngine) -> Vec<InputEffect> {
        self.sample(screen, camera, engine)
    }

    /// End the gesture. Returns a [`InputEffect::Commit`] when the drag
    /// produced at least one edit; nothing otherwise.
    pub fn pointer_up(&mut self, engine: &mut ActionEngine) -> Vec<InputEffect> {
        if self.state != GestureState::Dragging {
            return Vec::new();
        }
        self.state = GestureState::Idle;
        self.visited.clear();
        if self.pending.is_empty() {
            return Vec::new();
        }

        let brush = Action::Brush { actions: std::mem::take(&mut self.pending) };
        engine.push(brush.clone());
        vec![InputEffect::Commit(brush)]
    }

    fn sample(&mut self, screen: Point, camera: &Camera, engine: &mut ActionEngine) -> Vec<InputEffect> {
        let world = camera.screen_to_world(screen);
        let painting = self.is_dragging();
        if painting {
            self.paint_at(world, engine);
        }
        vec![InputEffect::Cursor { x: world.x, y: world.y, painting }]
    }

    fn paint_at(&mut self, world: Point, engine: &mut ActionEngine) {
        let coord = world_to_tile(world, self.tile_size, self.snap);
        if !self.visited.insert(coord) {
            return;
        }
        let Some(action) = engine.create_set_tile_action(coord.x, coord.y, self.target_value()) else {
            return;
        };
        engine.apply(Some(&action));
        self.pending.push(action);
    }

    fn target_value(&self) -> TileValue {
        match self.tool {
            Tool::Erase => EMPTY,
            Tool::Paint => self.paint_value.get(),
        }
    }
}
