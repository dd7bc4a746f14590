//! Tests for configuration and capabilities
//!
//! These tests verify:
//! - Defaults and the builder
//! - Parsing the host's configuration map
//! - Validation of sizing hints and sync settings
//! - Capability names and answers

use std::collections::HashMap;
use std::path::PathBuf;

use tablekv::config::{DEFAULT_MAX_SLOTS, DEFAULT_MIN_SLOTS};
use tablekv::{BackendConfig, BackendError, Capability, SyncStrategy};

// =============================================================================
// Helper Functions
// =============================================================================

fn map_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// =============================================================================
// Default and Builder Tests
// =============================================================================

#[test]
fn test_defaults() {
    let config = BackendConfig::default();

    assert!(config.root.is_none());
    assert_eq!(config.min_slots, DEFAULT_MIN_SLOTS);
    assert_eq!(config.max_slots, DEFAULT_MAX_SLOTS);
    assert_eq!(config.sync_strategy, SyncStrategy::EveryNWrites { count: 100 });
    assert!(config.compact_on_close);
}

#[test]
fn test_builder_sets_fields() {
    let config = BackendConfig::builder()
        .root("/tmp/tables")
        .min_slots(64)
        .max_slots(4096)
        .sync_strategy(SyncStrategy::Manual)
        .compact_on_close(false)
        .build();

    assert_eq!(config.root, Some(PathBuf::from("/tmp/tables")));
    assert_eq!(config.min_slots, 64);
    assert_eq!(config.max_slots, 4096);
    assert_eq!(config.sync_strategy, SyncStrategy::Manual);
    assert!(!config.compact_on_close);
    assert!(config.validate().is_ok());
}

// =============================================================================
// Map Parsing Tests
// =============================================================================

#[test]
fn test_from_map_root_only() {
    let config = BackendConfig::from_map(&map_of(&[("root", "/data/tables")])).unwrap();

    assert_eq!(config.root, Some(PathBuf::from("/data/tables")));
    assert_eq!(config.min_slots, DEFAULT_MIN_SLOTS);
    assert_eq!(config.max_slots, DEFAULT_MAX_SLOTS);
}

#[test]
fn test_from_map_missing_root() {
    let err = BackendConfig::from_map(&map_of(&[("min_slots", "16")])).unwrap_err();

    assert!(matches!(err, BackendError::MissingRoot));
    assert!(err.is_fatal());
}

#[test]
fn test_from_map_empty_root_is_missing() {
    let err = BackendConfig::from_map(&map_of(&[("root", "")])).unwrap_err();

    assert!(matches!(err, BackendError::MissingRoot));
}

#[test]
fn test_from_map_all_keys() {
    let config = BackendConfig::from_map(&map_of(&[
        ("root", "/data"),
        ("min_slots", "128"),
        ("max_slots", "1024"),
        ("sync", "250"),
        ("compact_on_close", "false"),
    ]))
    .unwrap();

    assert_eq!(config.min_slots, 128);
    assert_eq!(config.max_slots, 1024);
    assert_eq!(config.sync_strategy, SyncStrategy::EveryNWrites { count: 250 });
    assert!(!config.compact_on_close);
}

#[test]
fn test_from_map_named_sync_strategies() {
    let every = BackendConfig::from_map(&map_of(&[("root", "/d"), ("sync", "every_write")]))
        .unwrap();
    let manual = BackendConfig::from_map(&map_of(&[("root", "/d"), ("sync", "manual")])).unwrap();

    assert_eq!(every.sync_strategy, SyncStrategy::EveryWrite);
    assert_eq!(manual.sync_strategy, SyncStrategy::Manual);
}

#[test]
fn test_from_map_ignores_unknown_keys() {
    let config = BackendConfig::from_map(&map_of(&[
        ("root", "/data"),
        ("ring_size", "64"),
        ("backend", "table"),
    ]))
    .unwrap();

    assert_eq!(config.root, Some(PathBuf::from("/data")));
}

#[test]
fn test_from_map_rejects_malformed_values() {
    for (key, value) in [
        ("min_slots", "lots"),
        ("min_slots", "0"),
        ("max_slots", "-5"),
        ("sync", "sometimes"),
        ("sync", "0"),
        ("compact_on_close", "yes"),
    ] {
        let result = BackendConfig::from_map(&map_of(&[("root", "/data"), (key, value)]));
        assert!(
            matches!(result, Err(BackendError::Config(_))),
            "{}={} should be rejected",
            key,
            value
        );
    }
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_validate_rejects_min_above_max() {
    let config = BackendConfig::builder()
        .root("/data")
        .min_slots(2048)
        .max_slots(1024)
        .build();

    let err = config.validate().unwrap_err();

    assert!(matches!(err, BackendError::Config(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_validate_rejects_zero_sync_count() {
    let config = BackendConfig::builder()
        .root("/data")
        .sync_strategy(SyncStrategy::EveryNWrites { count: 0 })
        .build();

    assert!(matches!(config.validate(), Err(BackendError::Config(_))));
}

#[test]
fn test_runtime_errors_are_not_fatal() {
    assert!(!BackendError::Closed.is_fatal());
    assert!(!BackendError::TableCorruption("bad frame".to_string()).is_fatal());
    assert!(!BackendError::AlreadyOpen(PathBuf::from("/data/0")).is_fatal());
}

// =============================================================================
// Capability Tests
// =============================================================================

#[test]
fn test_capability_names_round_trip() {
    for cap in Capability::ALL {
        assert_eq!(Capability::from_name(cap.name()), Some(cap));
        assert_eq!(cap.name().parse::<Capability>().unwrap(), cap);
        assert_eq!(cap.to_string(), cap.name());
    }
}

#[test]
fn test_capability_answers() {
    assert!(!Capability::HasOrderedKeys.supported());
    assert!(Capability::KeysAndValuesStoredTogether.supported());
    assert!(Capability::VclocksAndValuesStoredTogether.supported());
    assert!(Capability::FoldWillBlock.supported());
}

#[test]
fn test_unknown_capability() {
    assert_eq!(Capability::from_name("uses_magic"), None);
    assert!("uses_magic".parse::<Capability>().is_err());
    assert!(!tablekv::capability::lookup("uses_magic"));
}
