//! Viewport transform and the screen → world → tile conversion chain.
//!
//! Only the conversion math lives here; drawing is the host's job.

#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use serde::{Deserialize, Serialize};

use crate::tiles::TileCoord;

/// A point in either screen or world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Pan offset plus zoom. This is the per-room value the viewport store keeps.
///
/// `pan_x` / `pan_y` are screen pixels; `zoom` is a scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self { pan_x: 0.0, pan_y: 0.0, zoom: 1.0 }
    }
}

impl Camera {
    /// Screen pixels to world units.
    #[must_use]
    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point::new((screen.x - self.pan_x) / self.zoom, (screen.y - self.pan_y) / self.zoom)
    }

    /// World units to screen pixels.
    #[must_use]
    pub fn world_to_screen(&self, world: Point) -> Point {
        Point::new(world.x * self.zoom + self.pan_x, world.y * self.zoom + self.pan_y)
    }

    /// Tile under a screen point. See [`world_to_tile`] for `snap`.
    #[must_use]
    pub fn screen_to_tile(&self, screen: Point, tile_size: f64, snap: bool) -> TileCoord {
        world_to_tile(self.screen_to_world(screen), tile_size, snap)
    }
}

/// Tile coordinate for a world point.
///
/// With `snap` the point maps to the tile it falls inside (`floor`); without
/// it, to the tile whose origin is nearest (`round`). The two differ for any
/// point past the middle of a tile.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn world_to_tile(world: Point, tile_size: f64, snap: bool) -> TileCoord {
    let (tx, ty) = (world.x / tile_size, world.y / tile_size);
    if snap {
        TileCoord::new(tx.floor() as i64, ty.floor() as i64)
    } else {
        TileCoord::new(tx.round() as i64, ty.round() as i64)
    }
}
