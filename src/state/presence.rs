//! Who is in the room and where they are.
//!
//! Three maps keyed by user id plus the cached local role:
//!
//! - `users`: the roster, replaced wholesale by every `room-users` broadcast.
//! - `cursors`: last reported pointer per peer. Overwritten, never expired.
//! - `soft_locks`: advisory "someone is painting here" markers. Refreshed by
//!   painting cursor updates; removed only by [`Presence::sweep`].
//!
//! The local role is re-derived from the roster and nowhere else.

#[cfg(test)]
#[path = "presence_test.rs"]
mod presence_test;

use std::collections::HashMap;

use crate::camera::Point;
use crate::config::PresenceConfig;
use crate::net::types::{Role, RoomUser};

/// Last known pointer of a peer, in world units.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorState {
    pub x: f64,
    pub y: f64,
    pub color: Option<String>,
    pub name: Option<String>,
    pub timestamp_ms: i64,
}

/// Advisory marker around a peer's active brush.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftLock {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub timestamp_ms: i64,
}

impl SoftLock {
    #[must_use]
    pub fn covers(&self, point: Point) -> bool {
        Point::new(self.x, self.y).distance(point) <= self.radius
    }

    #[must_use]
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.timestamp_ms)
    }
}

/// Outcome of a roster replacement, as seen by the local user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterUpdate {
    /// Local user present with the role already cached.
    Unchanged,
    /// Local user present with a new role. `previous` is `None` on the first
    /// roster after joining.
    RoleChanged { previous: Option<Role>, role: Role },
    /// Local user not listed. The cached role is left alone.
    LocalUserMissing,
}

#[derive(Debug, Clone)]
pub struct Presence {
    users: HashMap<String, RoomUser>,
    cursors: HashMap<String, CursorState>,
    soft_locks: HashMap<String, SoftLock>,
    my_role: Option<Role>,
    ttl_ms: i64,
    radius: f64,
}

impl Presence {
    #[must_use]
    pub fn new(config: &PresenceConfig) -> Self {
        Self {
            users: HashMap::new(),
            cursors: HashMap::new(),
            soft_locks: HashMap::new(),
            my_role: None,
            ttl_ms: config.soft_lock_ttl_ms,
            radius: config.soft_lock_radius,
        }
    }

    #[must_use]
    pub fn users(&self) -> &HashMap<String, RoomUser> {
        &self.users
    }

    #[must_use]
    pub fn user(&self, user_id: &str) -> Option<&RoomUser> {
        self.users.get(user_id)
    }

    #[must_use]
    pub fn cursors(&self) -> &HashMap<String, CursorState> {
        &self.cursors
    }

    #[must_use]
    pub fn cursor(&self, user_id: &str) -> Option<&CursorState> {
        self.cursors.get(user_id)
    }

    #[must_use]
    pub fn soft_locks(&self) -> &HashMap<String, SoftLock> {
        &self.soft_locks
    }

    #[must_use]
    pub fn soft_lock(&self, user_id: &str) -> Option<&SoftLock> {
        self.soft_locks.get(user_id)
    }

    #[must_use]
    pub fn my_role(&self) -> Option<&Role> {
        self.my_role.as_ref()
    }

    /// Replace the roster and re-derive the local role from it.
    pub fn replace_roster(&mut self, users: Vec<RoomUser>, local_user_id: &str) -> RosterUpdate {
        self.users = users.into_iter().map(|user| (user.id.clone(), user)).collect();

        let Some(role) = self.users.get(local_user_id).map(|user| user.role.clone()) else {
            return RosterUpdate::LocalUserMissing;
        };
        if self.my_role.as_ref() == Some(&role) {
            return RosterUpdate::Unchanged;
        }
        let previous = self.my_role.replace(role.clone());
        RosterUpdate::RoleChanged { previous, role }
    }

    pub fn upsert_cursor(&mut self, user_id: &str, cursor: CursorState) {
        self.cursors.insert(user_id.to_owned(), cursor);
    }

    /// Create or refresh `user_id`'s soft lock centred on `(x, y)`.
    pub fn refresh_soft_lock(&mut self, user_id: &str, x: f64, y: f64, now_ms: i64) {
        self.soft_locks
            .insert(user_id.to_owned(), SoftLock { x, y, radius: self.radius, timestamp_ms: now_ms });
    }

    /// Drop every soft lock older than the TTL. Returns the owners removed.
    pub fn sweep(&mut self, now_ms: i64) -> Vec<String> {
        let ttl = self.ttl_ms;
        let mut expired = Vec::new();
        self.soft_locks.retain(|user_id, lock| {
            let live = lock.age_ms(now_ms) <= ttl;
            if !live {
                expired.push(user_id.clone());
            }
            live
        });
        expired.sort_unstable();
        expired
    }

    /// Owners of unexpired soft locks covering `point`, sorted by id.
    #[must_use]
    pub fn lock_conflicts(&self, point: Point, now_ms: i64) -> Vec<String> {
        let mut owners: Vec<String> = self
            .soft_locks
            .iter()
            .filter(|(_, lock)| lock.age_ms(now_ms) <= self.ttl_ms && lock.covers(point))
            .map(|(user_id, _)| user_id.clone())
            .collect();
        owners.sort_unstable();
        owners
    }
}
