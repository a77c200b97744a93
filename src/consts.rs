//! Default tunables. Every value here can be overridden through `config`.

// ── Reconnect ───────────────────────────────────────────────────

/// First reconnect delay after a drop, in milliseconds.
pub const BACKOFF_BASE_MS: u64 = 1_000;

/// Added to the delay for every consecutive failed attempt, in milliseconds.
pub const BACKOFF_STEP_MS: u64 = 1_000;

/// Upper bound on the reconnect delay, in milliseconds.
pub const BACKOFF_CAP_MS: u64 = 10_000;

/// Interval between latency probes while online, in milliseconds.
pub const PING_INTERVAL_MS: u64 = 5_000;

// ── Presence ────────────────────────────────────────────────────

/// Age after which a soft lock is swept, in milliseconds.
pub const SOFT_LOCK_TTL_MS: i64 = 1_500;

/// Advisory radius of a soft lock around the painter's cursor, in world units.
pub const SOFT_LOCK_RADIUS: f64 = 96.0;

/// How often the soft-lock sweep runs, in milliseconds.
pub const SWEEP_INTERVAL_MS: u64 = 250;

// ── Input ───────────────────────────────────────────────────────

/// Edge length of one tile in world units.
pub const TILE_SIZE: f64 = 32.0;
