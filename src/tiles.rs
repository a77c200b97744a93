//! Tile store: the sparse, coordinate-keyed grid shared by a room.
//!
//! A tile is addressed by an unbounded signed `(x, y)` pair and holds an
//! integer tile type. Type `0` means empty. The store never keeps a zero entry:
//! writing `0` removes the key, so a missing key and an erased tile read the
//! same through [`TileStore::get`].
//!
//! Snapshots travel over the wire as a JSON object keyed by `"x,y"` strings,
//! which is why [`TileCoord`] converts to and from that form.

#[cfg(test)]
#[path = "tiles_test.rs"]
mod tiles_test;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Integer tile type. `0` is the empty tile.
pub type TileValue = u32;

/// The tile type that reads back for any unset coordinate.
pub const EMPTY: TileValue = 0;

/// Full-map snapshot as carried by `room-joined`.
pub type TileSnapshot = HashMap<TileCoord, TileValue>;

/// Integer tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TileCoord {
    pub x: i64,
    pub y: i64,
}

impl TileCoord {
    #[must_use]
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Error returned when a snapshot key is not of the form `"x,y"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid tile key `{0}`, expected \"x,y\"")]
pub struct InvalidTileKey(pub String);

impl FromStr for TileCoord {
    type Err = InvalidTileKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidTileKey(s.to_owned());
        let (x, y) = s.split_once(',').ok_or_else(invalid)?;
        let x = x.trim().parse::<i64>().map_err(|_| invalid())?;
        let y = y.trim().parse::<i64>().map_err(|_| invalid())?;
        Ok(Self { x, y })
    }
}

impl TryFrom<String> for TileCoord {
    type Error = InvalidTileKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TileCoord> for String {
    fn from(coord: TileCoord) -> Self {
        coord.to_string()
    }
}

/// In-memory tile grid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileStore {
    tiles: HashMap<TileCoord, TileValue>,
}

impl TileStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { tiles: HashMap::new() }
    }

    /// Tile type at `(x, y)`, or [`EMPTY`] when unset.
    #[must_use]
    pub fn get(&self, x: i64, y: i64) -> TileValue {
        self.tiles.get(&TileCoord::new(x, y)).copied().unwrap_or(EMPTY)
    }

    /// Overwrite the tile at `(x, y)`. Writing [`EMPTY`] removes the entry.
    pub fn set(&mut self, x: i64, y: i64, value: TileValue) {
        let coord = TileCoord::new(x, y);
        if value == EMPTY {
            self.tiles.remove(&coord);
        } else {
            self.tiles.insert(coord, value);
        }
    }

    /// Replace the entire grid with a snapshot. Zero entries are dropped.
    pub fn load(&mut self, snapshot: TileSnapshot) {
        self.tiles = snapshot.into_iter().filter(|(_, v)| *v != EMPTY).collect();
    }

    /// Copy of the current grid in snapshot form.
    #[must_use]
    pub fn snapshot(&self) -> TileSnapshot {
        self.tiles.clone()
    }

    /// Number of non-empty tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Returns `true` if every tile is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
