//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`LongpollSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `LONGPOLL_*` environment variable overrides
//! 4. Validate the result
//!
//! Loading runs before logging is installed, so unusable env values are
//! handed back in [`LoadedSettings::rejected`] for the caller to report.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::LongpollSettings;

/// A `LONGPOLL_*` variable that was set but could not be used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedOverride {
    pub key: String,
    pub value: String,
}

impl RejectedOverride {
    fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

impl fmt::Display for RejectedOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}", self.key, self.value)
    }
}

/// Validated settings plus the env overrides ignored while building them.
#[derive(Clone, Debug)]
pub struct LoadedSettings {
    pub settings: LongpollSettings,
    pub rejected: Vec<RejectedOverride>,
}

/// Resolve the default settings file path (`~/.longpoll/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".longpoll").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<LoadedSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or out-of-range values are
/// errors.
pub fn load_settings_from_path(path: &Path) -> Result<LoadedSettings> {
    load_settings_with(path, |name| std::env::var(name).ok())
}

/// Same as [`load_settings_from_path`], reading overrides through `lookup`.
pub fn load_settings_with<F>(path: &Path, lookup: F) -> Result<LoadedSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = read_settings_file(path)?;
    let rejected = apply_overrides_from(&mut settings, lookup);
    settings.validate()?;
    Ok(LoadedSettings { settings, rejected })
}

/// Defaults deep-merged with the file at `path`, without env overrides.
pub fn read_settings_file(path: &Path) -> Result<LongpollSettings> {
    let defaults = serde_json::to_value(LongpollSettings::default())?;

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
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `LONGPOLL_*` overrides read through `lookup`.
///
/// Invalid values are left out (falling back to file/default) and returned.
pub fn apply_overrides_from<F>(settings: &mut LongpollSettings, lookup: F) -> Vec<RejectedOverride>
where
    F: Fn(&str) -> Option<String>,
{
    let mut rejected = Vec::new();
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let mut checked = |name: &str, parsed: Option<u64>, raw: &str| {
        if parsed.is_none() {
            rejected.push(RejectedOverride::new(name, raw));
        }
        parsed
    };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = string("LONGPOLL_HOST") {
        settings.server.host = v;
    }
    if let Some(raw) = string("LONGPOLL_PORT") {
        if let Some(v) = checked("LONGPOLL_PORT", parse_u64_range(&raw, 0, 65_535), &raw) {
            settings.server.port = v as u16;
        }
    }

    // ── Hub timing ──────────────────────────────────────────────────
    let durations: [(&str, &mut u64); 3] = [
        ("LONGPOLL_POLL_TIMEOUT_MS", &mut settings.hub.poll_timeout_ms),
        ("LONGPOLL_IDLE_THRESHOLD_MS", &mut settings.hub.idle_threshold_ms),
        ("LONGPOLL_SWEEP_INTERVAL_MS", &mut settings.hub.sweep_interval_ms),
    ];
    for (name, slot) in durations {
        if let Some(raw) = string(name) {
            if let Some(v) = checked(name, parse_u64_range(&raw, 1, 86_400_000), &raw) {
                *slot = v;
            }
        }
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = string("LONGPOLL_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(raw) = string("LONGPOLL_JSON_LOGS") {
        match parse_bool(&raw) {
            Some(v) => settings.logging.json = v,
            None => rejected.push(RejectedOverride::new("LONGPOLL_JSON_LOGS", &raw)),
        }
    }

    rejected
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

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
