//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`AdcastSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::AdcastSettings;

/// `~/.adcast`, falling back to `/tmp/.adcast` when `HOME` is unset.
pub fn adcast_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".adcast")
}

/// Resolve the path to the default settings file (`~/.adcast/settings.json`).
pub fn settings_path() -> PathBuf {
    adcast_home().join("settings.json")
}

/// Settings plus the environment overrides that were rejected on the way.
///
/// Loading usually happens before a tracing subscriber exists, so rejections
/// are returned instead of logged; call [`Loaded::warn_rejected`] once
/// telemetry is up.
#[derive(Clone, Debug)]
pub struct Loaded {
    pub settings: AdcastSettings,
    pub rejected: Vec<RejectedOverride>,
}

impl Loaded {
    pub fn warn_rejected(&self) {
        for r in &self.rejected {
            warn!(key = r.key, value = %r.value, "invalid env override ignored");
        }
    }
}

/// An environment variable whose value failed to parse or was out of range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedOverride {
    pub key: &'static str,
    pub value: String,
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<Loaded> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a document that fails
/// [`AdcastSettings::validate`] is an error.
pub fn load_settings_from_path(path: &Path) -> Result<Loaded> {
    let mut settings = load_file_layer(path)?;
    let rejected = apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(Loaded { settings, rejected })
}

fn load_file_layer(path: &Path) -> Result<AdcastSettings> {
    let defaults = serde_json::to_value(AdcastSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply process environment overrides.
pub fn apply_env_overrides(settings: &mut AdcastSettings) -> Vec<RejectedOverride> {
    apply_overrides(settings, |name| std::env::var(name).ok())
}

/// Apply overrides from an arbitrary lookup.
///
/// Invalid values leave the file/default value in place and are returned.
pub fn apply_overrides<F>(settings: &mut AdcastSettings, lookup: F) -> Vec<RejectedOverride>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let mut rejected = Vec::new();
    let mut reject = |key: &'static str, value: String| {
        rejected.push(RejectedOverride { key, value });
    };

    if let Some(v) = read("APP_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("APP_PORT") {
        match parse_port(&v) {
            Some(port) => settings.server.port = port,
            None => reject("APP_PORT", v),
        }
    }
    if let Some(v) = read("DB_PATH") {
        settings.store.path = v;
    }
    if let Some(v) = read("CLICKS_TABLE") {
        settings.store.clicks_table = v;
    }
    if let Some(v) = read("BROADCAST_INTERVAL_MS") {
        match parse_u64_range(&v, 100, 3_600_000) {
            Some(ms) => settings.hub.broadcast_interval_ms = ms,
            None => reject("BROADCAST_INTERVAL_MS", v),
        }
    }
    if let Some(v) = read("MAILBOX_CAPACITY") {
        match parse_usize_range(&v, 1, 4096) {
            Some(n) => settings.hub.mailbox_capacity = n,
            None => reject("MAILBOX_CAPACITY", v),
        }
    }
    if let Some(v) = read("ADCAST_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("ADCAST_LOG_JSON") {
        match parse_bool(&v) {
            Some(b) => settings.logging.json = b,
            None => reject("ADCAST_LOG_JSON", v),
        }
    }
    rejected
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a listen port, accepting both `3000` and the `:3000` listen form.
pub fn parse_port(val: &str) -> Option<u16> {
    parse_u16_range(val.trim().trim_start_matches(':'), 1, 65535)
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
