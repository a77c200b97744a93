//! Client configuration with environment overrides.
//!
//! Every tunable has a default in [`crate::consts`]. `from_env` reads:
//!
//! - `TILESYNC_BACKOFF_BASE_MS`, `TILESYNC_BACKOFF_STEP_MS`, `TILESYNC_BACKOFF_CAP_MS`
//! - `TILESYNC_PING_INTERVAL_MS`
//! - `TILESYNC_SOFT_LOCK_TTL_MS`, `TILESYNC_SOFT_LOCK_RADIUS`, `TILESYNC_SWEEP_INTERVAL_MS`
//! - `TILESYNC_TILE_SIZE`, `TILESYNC_SNAP`
//!
//! Unparseable or out-of-range values fall back to the default.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;
use std::time::Duration;

use crate::consts;
use crate::net::session::BackoffPolicy;

/// Reconnect and probe timing for the network session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub backoff: BackoffPolicy,
    pub ping_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            ping_interval: Duration::from_millis(consts::PING_INTERVAL_MS),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let base = env_parse(lookup, "TILESYNC_BACKOFF_BASE_MS", consts::BACKOFF_BASE_MS);
        let step = env_parse(lookup, "TILESYNC_BACKOFF_STEP_MS", consts::BACKOFF_STEP_MS);
        let cap = env_parse(lookup, "TILESYNC_BACKOFF_CAP_MS", consts::BACKOFF_CAP_MS).max(base);
        let ping = env_parse(lookup, "TILESYNC_PING_INTERVAL_MS", consts::PING_INTERVAL_MS).max(1);
        Self {
            backoff: BackoffPolicy {
                base: Duration::from_millis(base),
                step: Duration::from_millis(step),
                cap: Duration::from_millis(cap),
            },
            ping_interval: Duration::from_millis(ping),
        }
    }
}

/// Soft-lock lifetime and sweep cadence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenceConfig {
    pub soft_lock_ttl_ms: i64,
    pub soft_lock_radius: f64,
    pub sweep_interval: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            soft_lock_ttl_ms: consts::SOFT_LOCK_TTL_MS,
            soft_lock_radius: consts::SOFT_LOCK_RADIUS,
            sweep_interval: Duration::from_millis(consts::SWEEP_INTERVAL_MS),
        }
    }
}

impl PresenceConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let ttl = env_parse(lookup, "TILESYNC_SOFT_LOCK_TTL_MS", consts::SOFT_LOCK_TTL_MS);
        let radius = env_parse(lookup, "TILESYNC_SOFT_LOCK_RADIUS", consts::SOFT_LOCK_RADIUS);
        let sweep = env_parse(lookup, "TILESYNC_SWEEP_INTERVAL_MS", consts::SWEEP_INTERVAL_MS);
        Self {
            soft_lock_ttl_ms: if ttl > 0 { ttl } else { consts::SOFT_LOCK_TTL_MS },
            soft_lock_radius: if radius > 0.0 { radius } else { consts::SOFT_LOCK_RADIUS },
            sweep_interval: Duration::from_millis(sweep.max(1)),
        }
    }
}

/// Tile geometry used when converting pointer positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputConfig {
    pub tile_size: f64,
    /// `true` floors into the containing tile, `false` rounds to the nearest.
    pub snap: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { tile_size: consts::TILE_SIZE, snap: true }
    }
}

impl InputConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let tile_size = env_parse(lookup, "TILESYNC_TILE_SIZE", consts::TILE_SIZE);
        Self {
            tile_size: if tile_size > 0.0 { tile_size } else { consts::TILE_SIZE },
            snap: env_parse(lookup, "TILESYNC_SNAP", true),
        }
    }
}

/// Everything needed to attach one client to one room.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Websocket URL of the room server, e.g. `ws://127.0.0.1:3000/ws`.
    pub server_url: String,
    /// Opaque room id, passed through the protocol unchanged.
    pub room_id: String,
    /// Opaque local user id; the roster is matched against it.
    pub user_id: String,
    pub user_name: String,
    pub session: SessionConfig,
    pub presence: PresenceConfig,
    pub input: InputConfig,
    /// Where per-room viewports are kept. `None` keeps them in memory only.
    pub viewport_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Build a config for the given identity with tunables read from the
    /// environment.
    #[must_use]
    pub fn new(server_url: String, room_id: String, user_id: String, user_name: String) -> Self {
        Self {
            server_url,
            room_id,
            user_id,
            user_name,
            session: SessionConfig::from_env(),
            presence: PresenceConfig::from_env(),
            input: InputConfig::from_env(),
            viewport_path: None,
        }
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_parse<T>(lookup: &dyn Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    match lookup(key).map(|v| v.trim().parse::<T>()) {
        Some(Ok(value)) => value,
        _ => default,
    }
}
