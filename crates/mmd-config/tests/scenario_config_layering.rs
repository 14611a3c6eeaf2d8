//! Scenario: Config layering and hashing
//!
//! # Invariants under test
//!
//! 1. An empty document yields the built-in defaults.
//! 2. Later layers override earlier ones key-by-key.
//! 3. Reordering keys inside a document does not change the hash.
//! 4. Different effective values produce different hashes.
//! 5. Secret-looking literals abort loading.
//! 6. Explicit overrides replace backend URLs and re-hash.
//! 7. Files on disk load the same as strings.

use std::io::Write;

use mmd_config::{apply_overrides, load_layered_yaml, load_layered_yaml_from_strings};
use mmd_schemas::Region;

const BASE_YAML: &str = r#"
backend:
  api_base: "http://matchmaker.local/api/v2"
  push_url: "ws://matchmaker.local/ws"
timing:
  catalog_timeout_ms: 5000
  pool_poll_ms: 3000
simulation:
  skill_min: 45
  skill_max: 130
"#;

const BASE_YAML_REORDERED: &str = r#"
simulation:
  skill_max: 130
  skill_min: 45
timing:
  pool_poll_ms: 3000
  catalog_timeout_ms: 5000
backend:
  push_url: "ws://matchmaker.local/ws"
  api_base: "http://matchmaker.local/api/v2"
"#;

const OVERLAY_YAML: &str = r#"
timing:
  pool_poll_ms: 750
simulation:
  slots: 6
  regions: ["eu-west", "us-east"]
fallback_modes:
  - key: "solo_queue"
    description: "Offline practice mode."
"#;

#[test]
fn empty_document_yields_defaults() {
    let loaded = load_layered_yaml_from_strings(&[""]).unwrap();
    assert_eq!(loaded.config.timing.catalog_timeout_ms, 5_000);
    assert_eq!(loaded.config.timing.status_poll_ms, 2_000);
    assert_eq!(loaded.config.simulation.slots, 4);
    assert_eq!(loaded.config.fallback_modes.len(), 3);
}

#[test]
fn overlay_overrides_base() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let cfg = &loaded.config;
    assert_eq!(cfg.backend.api_base, "http://matchmaker.local/api/v2");
    assert_eq!(cfg.timing.pool_poll_ms, 750);
    assert_eq!(cfg.timing.catalog_timeout_ms, 5_000);
    assert_eq!(cfg.simulation.slots, 6);
    assert_eq!(cfg.simulation.regions, vec![Region::EuWest, Region::UsEast]);
    assert_eq!(cfg.fallback_modes.len(), 1);
    assert_eq!(cfg.fallback_modes[0].key, "solo_queue");
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn different_values_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
    assert_eq!(a.config_hash.len(), 64);
}

#[test]
fn secret_literal_is_rejected() {
    let doc = r#"
backend:
  client_id: "sk-live-abcdef123456"
"#;
    let err = load_layered_yaml_from_strings(&[doc]).unwrap_err();
    assert!(
        err.to_string().contains("CONFIG_SECRET_DETECTED"),
        "unexpected error: {err}"
    );
}

#[test]
fn invalid_values_are_rejected() {
    let doc = r#"
simulation:
  slots: 0
"#;
    assert!(load_layered_yaml_from_strings(&[doc]).is_err());
}

#[test]
fn overrides_replace_urls_and_rehash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let before = base.config_hash.clone();
    let after = apply_overrides(
        base,
        Some("http://10.0.0.5:9000/api/v2".to_string()),
        None,
    )
    .unwrap();
    assert_eq!(after.config.backend.api_base, "http://10.0.0.5:9000/api/v2");
    assert_eq!(after.config.backend.push_url, "ws://matchmaker.local/ws");
    assert_ne!(after.config_hash, before);

    let unchanged = apply_overrides(after.clone(), None, Some("   ".to_string())).unwrap();
    assert_eq!(unchanged.config_hash, after.config_hash);
}

#[test]
fn files_load_like_strings() {
    let mut base = tempfile::NamedTempFile::new().unwrap();
    base.write_all(BASE_YAML.as_bytes()).unwrap();
    let mut overlay = tempfile::NamedTempFile::new().unwrap();
    overlay.write_all(OVERLAY_YAML.as_bytes()).unwrap();

    let base_path = base.path().to_str().unwrap().to_string();
    let overlay_path = overlay.path().to_str().unwrap().to_string();
    let from_files = load_layered_yaml(&[&base_path, &overlay_path]).unwrap();
    let from_strings = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(from_files.config_hash, from_strings.config_hash);

    assert!(load_layered_yaml(&["/definitely/not/here.yaml"]).is_err());
}
