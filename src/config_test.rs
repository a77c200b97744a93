#![allow(clippy::float_cmp)]

use std::collections::HashMap;

use super::*;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn session_defaults_when_env_empty() {
    let cfg = SessionConfig::from_lookup(&lookup_from(&[]));
    assert_eq!(cfg, SessionConfig::default());
    assert_eq!(cfg.backoff.base, Duration::from_millis(consts::BACKOFF_BASE_MS));
    assert_eq!(cfg.backoff.cap, Duration::from_millis(consts::BACKOFF_CAP_MS));
}

#[test]
fn session_reads_overrides() {
    let cfg = SessionConfig::from_lookup(&lookup_from(&[
        ("TILESYNC_BACKOFF_BASE_MS", "200"),
        ("TILESYNC_BACKOFF_STEP_MS", "50"),
        ("TILESYNC_BACKOFF_CAP_MS", "900"),
        ("TILESYNC_PING_INTERVAL_MS", "1500"),
    ]));
    assert_eq!(cfg.backoff.base, Duration::from_millis(200));
    assert_eq!(cfg.backoff.step, Duration::from_millis(50));
    assert_eq!(cfg.backoff.cap, Duration::from_millis(900));
    assert_eq!(cfg.ping_interval, Duration::from_millis(1500));
}

#[test]
fn session_cap_never_below_base() {
    let cfg = SessionConfig::from_lookup(&lookup_from(&[
        ("TILESYNC_BACKOFF_BASE_MS", "5000"),
        ("TILESYNC_BACKOFF_CAP_MS", "100"),
    ]));
    assert_eq!(cfg.backoff.cap, Duration::from_millis(5000));
}

#[test]
fn unparseable_values_fall_back_to_defaults() {
    let cfg = SessionConfig::from_lookup(&lookup_from(&[("TILESYNC_BACKOFF_BASE_MS", "soon")]));
    assert_eq!(cfg.backoff.base, Duration::from_millis(consts::BACKOFF_BASE_MS));
}

#[test]
fn presence_rejects_non_positive_ttl_and_radius() {
    let cfg = PresenceConfig::from_lookup(&lookup_from(&[
        ("TILESYNC_SOFT_LOCK_TTL_MS", "0"),
        ("TILESYNC_SOFT_LOCK_RADIUS", "-4"),
    ]));
    assert_eq!(cfg.soft_lock_ttl_ms, consts::SOFT_LOCK_TTL_MS);
    assert_eq!(cfg.soft_lock_radius, consts::SOFT_LOCK_RADIUS);
}

#[test]
fn presence_reads_overrides() {
    let cfg = PresenceConfig::from_lookup(&lookup_from(&[
        ("TILESYNC_SOFT_LOCK_TTL_MS", "3000"),
        ("TILESYNC_SWEEP_INTERVAL_MS", "100"),
    ]));
    assert_eq!(cfg.soft_lock_ttl_ms, 3000);
    assert_eq!(cfg.sweep_interval, Duration::from_millis(100));
}

#[test]
fn input_reads_snap_and_tile_size() {
    let cfg = InputConfig::from_lookup(&lookup_from(&[("TILESYNC_TILE_SIZE", "16"), ("TILESYNC_SNAP", "false")]));
    assert_eq!(cfg.tile_size, 16.0);
    assert!(!cfg.snap);
}

#[test]
fn input_defaults_snap_on() {
    let cfg = InputConfig::from_lookup(&lookup_from(&[("TILESYNC_TILE_SIZE", "0")]));
    assert_eq!(cfg, InputConfig::default());
    assert!(cfg.snap);
}
