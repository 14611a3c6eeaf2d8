//! mmd-config
//!
//! Layered YAML configuration for the dashboard.
//!
//! - Documents are merged in order: earlier docs are base, later docs override
//!   (objects deep-merge, everything else replaces).
//! - The merged document is canonicalized (keys sorted recursively, compact
//!   JSON) and hashed with SHA-256 so a running dashboard can report exactly
//!   which configuration it booted with.
//! - Secret-looking literals are rejected outright.
//! - The result is deserialized into [`DashboardConfig`]; every field has a
//!   default, so an empty document is a valid configuration.

mod dashboard;

pub use dashboard::*;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

/// Known secret-like prefixes. Any leaf string starting with one of these
/// aborts loading with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // Stripe / OpenAI style
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "gho_",       // GitHub OAuth
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
    "xoxp-",      // Slack user token
];

/// Environment overrides applied after file layering.
pub const ENV_API_BASE: &str = "MMD_API_BASE";
pub const ENV_PUSH_URL: &str = "MMD_PUSH_URL";

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
    pub config: DashboardConfig,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // An empty document parses as null; treat it as "no overrides".
        if v_json.is_null() {
            continue;
        }
        merged = deep_merge(merged, v_json);
    }

    finish(merged)
}

/// Apply `MMD_API_BASE` / `MMD_PUSH_URL` on top of an already loaded config.
///
/// The hash is recomputed so it reflects the effective configuration.
pub fn apply_env_overrides(loaded: LoadedConfig) -> Result<LoadedConfig> {
    apply_overrides(
        loaded,
        std::env::var(ENV_API_BASE).ok(),
        std::env::var(ENV_PUSH_URL).ok(),
    )
}

/// Same as [`apply_env_overrides`] with explicit values (testable).
pub fn apply_overrides(
    loaded: LoadedConfig,
    api_base: Option<String>,
    push_url: Option<String>,
) -> Result<LoadedConfig> {
    let mut overlay = serde_json::Map::new();
    if let Some(v) = api_base.filter(|s| !s.trim().is_empty()) {
        overlay.insert("api_base".to_string(), Value::String(v));
    }
    if let Some(v) = push_url.filter(|s| !s.trim().is_empty()) {
        overlay.insert("push_url".to_string(), Value::String(v));
    }
    if overlay.is_empty() {
        return Ok(loaded);
    }

    let merged = deep_merge(
        loaded.config_json,
        serde_json::json!({ "backend": Value::Object(overlay) }),
    );
    finish(merged)
}

fn finish(merged: Value) -> Result<LoadedConfig> {
    enforce_no_secret_literals(&merged)?;

    let config: DashboardConfig =
        serde_json::from_value(merged.clone()).context("config does not match schema")?;
    config.validate()?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
        config,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// Keys sorted recursively, compact output. Map order in `serde_json` follows
/// insertion, so sorting is required for a stable hash.
fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(&sort_keys(v)).context("canonical json serialize failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for k in keys {
                out.insert(k.clone(), sort_keys(&map[k.as_str()]));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
            }
        }
    }
    Ok(())
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => out.push(prefix.to_string()),
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}
