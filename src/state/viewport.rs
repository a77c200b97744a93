//! Per-room camera persisted to a small JSON file.
//!
//! The file maps room id to `{ "pan_x", "pan_y", "zoom" }`. It is best effort:
//! a missing or unreadable file starts empty, and write failures are reported
//! to the caller, which logs them and carries on.

#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::camera::Camera;
use crate::error::SyncError;

#[derive(Debug, Default)]
pub struct ViewportStore {
    path: Option<PathBuf>,
    entries: BTreeMap<String, Camera>,
}

impl ViewportStore {
    /// Keep viewports in memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the store at `path`, loading whatever it already holds.
    #[must_use]
    pub fn open(path: PathBuf) -> Self {
        let entries = match read_entries(&path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "viewport: starting empty");
                BTreeMap::new()
            }
        };
        Self { path: Some(path), entries }
    }

    #[must_use]
    pub fn get(&self, room_id: &str) -> Option<Camera> {
        self.entries.get(room_id).copied()
    }

    /// Remember `camera` for `room_id` and write the file.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ViewportStore`] if the file cannot be written. The
    /// in-memory value is updated either way.
    pub fn save(&mut self, room_id: &str, camera: Camera) -> Result<(), SyncError> {
        if self.entries.get(room_id) == Some(&camera) {
            return Ok(());
        }
        self.entries.insert(room_id.to_owned(), camera);
        let Some(path) = &self.path else {
            return Ok(());
        };
        write_entries(path, &self.entries)?;
        Ok(())
    }
}

fn read_entries(path: &Path) -> io::Result<BTreeMap<String, Camera>> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(io::Error::other),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e),
    }
}

fn write_entries(path: &Path, entries: &BTreeMap<String, Camera>) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_vec_pretty(entries).map_err(io::Error::other)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)
}
