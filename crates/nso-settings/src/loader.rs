//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`NsoSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `NSO_*` environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::NsoSettings;

/// Resolve the default settings file path (`~/.nso/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".nso").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<NsoSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an invalid final value is
/// an error.
pub fn load_settings_from_path(path: &Path) -> Result<NsoSettings> {
    let mut settings = load_file_layers(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
fn load_file_layers(path: &Path) -> Result<NsoSettings> {
    let defaults = serde_json::to_value(NsoSettings::default())?;

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

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning and the file/default value
/// stays in effect.
pub fn apply_env_overrides(settings: &mut NsoSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`, which maps a variable name to its
/// value.
pub fn apply_overrides_from(settings: &mut NsoSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Connection ──────────────────────────────────────────────────
    if let Some(v) = env.string("NSO_PROTOCOL") {
        settings.connection.protocol = v;
    }
    if let Some(v) = env.string("NSO_HOST") {
        settings.connection.host = v;
    }
    if let Some(v) = env.u16("NSO_PORT", 1, 65535) {
        settings.connection.port = v;
    }
    if let Some(v) = env.string("NSO_USERNAME") {
        settings.connection.username = v;
    }
    if let Some(v) = env.string("NSO_PASSWORD") {
        settings.connection.password = v;
    }
    if let Some(v) = env.bool("NSO_TLS_VERIFY") {
        settings.connection.tls_verify = v;
    }
    if let Some(v) = env.u64("NSO_REQUEST_TIMEOUT_MS", 100, 3_600_000) {
        settings.connection.request_timeout_ms = v;
    }
    if let Some(v) = env.u64("NSO_POLL_TIMEOUT_MS", 100, 3_600_000) {
        settings.connection.poll_timeout_ms = v;
    }

    // ── Poller ──────────────────────────────────────────────────────
    if let Some(v) = env.u64("NSO_POLL_MAX_RETRIES", 0, 1000) {
        #[allow(clippy::cast_possible_truncation)]
        let retries = v as u32;
        settings.poller.retry.max_retries = retries;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("NSO_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

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

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = (self.lookup)(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"connection": {"port": 8080, "host": "a"}});
        let source = serde_json::json!({"connection": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["connection"]["port"], 9090);
        assert_eq!(merged["connection"]["host"], "a");
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_array_replace() {
        let merged = deep_merge(
            serde_json::json!({"items": [1, 2, 3]}),
            serde_json::json!({"items": [4]}),
        );
        assert_eq!(merged["items"], serde_json::json!([4]));
    }

    // ── file loading ────────────────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings = load_file_layers(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings, NsoSettings::default());
    }

    #[test]
    fn partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"connection": {"host": "10.0.0.146", "password": "pw"}, "poller": {"retry": {"maxRetries": 2}}}"#,
        )
        .unwrap();

        let settings = load_file_layers(&path).unwrap();
        assert_eq!(settings.connection.host, "10.0.0.146");
        assert_eq!(settings.connection.password, "pw");
        assert_eq!(settings.connection.port, 8080);
        assert_eq!(settings.poller.retry.max_retries, 2);
        assert_eq!(settings.poller.retry.base_delay_ms, 500);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();
        assert_matches!(load_file_layers(&path), Err(SettingsError::Json(_)));
    }

    #[test]
    fn invalid_value_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"connection": {"protocol": "ftp"}}"#).unwrap();
        assert_matches!(
            load_settings_from_path(&path),
            Err(SettingsError::InvalidValue(_))
        );
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn overrides_apply() {
        let mut settings = NsoSettings::default();
        apply_overrides_from(
            &mut settings,
            lookup_from(&[
                ("NSO_PROTOCOL", "https"),
                ("NSO_HOST", "nso.example.net"),
                ("NSO_PORT", "8888"),
                ("NSO_TLS_VERIFY", "off"),
                ("NSO_POLL_TIMEOUT_MS", "60000"),
                ("NSO_POLL_MAX_RETRIES", "9"),
                ("NSO_LOG_LEVEL", "debug"),
            ]),
        );
        assert_eq!(settings.connection.protocol, "https");
        assert_eq!(settings.connection.host, "nso.example.net");
        assert_eq!(settings.connection.port, 8888);
        assert!(!settings.connection.tls_verify);
        assert_eq!(settings.connection.poll_timeout_ms, 60_000);
        assert_eq!(settings.poller.retry.max_retries, 9);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut settings = NsoSettings::default();
        apply_overrides_from(
            &mut settings,
            lookup_from(&[("NSO_PORT", "65536"), ("NSO_TLS_VERIFY", "maybe"), ("NSO_HOST", "")]),
        );
        assert_eq!(settings, NsoSettings::default());
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("443", 1, 65535), Some(443));
        assert_eq!(parse_u64_range("99", 100, 200), None);
        assert_eq!(parse_u64_range("abc", 0, 10), None);
    }
}
