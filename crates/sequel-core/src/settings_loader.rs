//! Settings loading from configuration files.
//!
//! This module loads [`Settings`] from TOML or JSON files and applies
//! environment variable overrides.
//!
//! ## Loading Order
//!
//! 1. Start with default settings (PostgreSQL dialect).
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! Dialect keys may be written in snake_case or in the camelCase used by
//! adapter option objects (`caseSensitive`, `escapeCharacter`, ...).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `SEQUEL_DEBUG` | `debug` |
//! | `SEQUEL_LOG_LEVEL` | `log_level` |
//! | `SEQUEL_PARAMETERIZED` | `dialect.parameterized` |
//! | `SEQUEL_CASE_SENSITIVE` | `dialect.case_sensitive` |
//! | `SEQUEL_ESCAPE_CHARACTER` | `dialect.escape_character` |
//! | `SEQUEL_CASTING` | `dialect.casting` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use sequel_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file("config/sequel.toml").unwrap();
//! let settings = settings_loader::from_json_file_with_env("config/sequel.json").unwrap();
//! ```

use std::path::Path;

use crate::error::SequelError;
use crate::settings::Settings;

/// camelCase option keys accepted in files, and their canonical names.
const KEY_ALIASES: &[(&str, &str)] = &[
    ("caseSensitive", "case_sensitive"),
    ("escapeCharacter", "escape_character"),
    ("schemaName", "schema_name"),
    ("wlNext", "wl_next"),
    ("canReturnValues", "can_return_values"),
    ("escapeInserts", "escape_inserts"),
    ("logLevel", "log_level"),
];

/// Loads settings from a TOML string.
///
/// Any fields not present in the TOML keep their default values.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, SequelError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| SequelError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    merge_into_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, SequelError> {
    from_toml_str(&read_config(path.as_ref(), "TOML")?)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, SequelError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or cannot be deserialized.
pub fn from_json_str(json_str: &str) -> Result<Settings, SequelError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| SequelError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;

    merge_into_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, SequelError> {
    from_json_str(&read_config(path.as_ref(), "JSON")?)
}

/// Loads settings from a JSON file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file_with_env(path: impl AsRef<Path>) -> Result<Settings, SequelError> {
    let mut settings = from_json_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `SEQUEL_*` environment variable overrides to a settings struct.
///
/// Boolean variables accept "true"/"1"/"yes" (case-insensitive) as true and
/// anything else as false. `SEQUEL_ESCAPE_CHARACTER` must be exactly one
/// character; other values are ignored.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Applies overrides read through `lookup`, which maps a variable name to its value.
fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let flag = |val: String| matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");

    if let Some(val) = lookup("SEQUEL_DEBUG") {
        settings.debug = flag(val);
    }

    if let Some(val) = lookup("SEQUEL_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("SEQUEL_PARAMETERIZED") {
        settings.dialect.parameterized = flag(val);
    }

    if let Some(val) = lookup("SEQUEL_CASE_SENSITIVE") {
        settings.dialect.case_sensitive = flag(val);
    }

    if let Some(val) = lookup("SEQUEL_ESCAPE_CHARACTER") {
        let mut chars = val.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            settings.dialect.escape_character = c;
        } else {
            tracing::warn!("Ignoring SEQUEL_ESCAPE_CHARACTER={val:?}: expected a single character");
        }
    }

    if let Some(val) = lookup("SEQUEL_CASTING") {
        settings.dialect.casting = flag(val);
    }
}

// ============================================================
// Helpers
// ============================================================

fn read_config(path: &Path, format: &str) -> Result<String, SequelError> {
    std::fs::read_to_string(path).map_err(|e| {
        SequelError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

/// Deep-merges `value` over the default settings and deserializes the result.
fn merge_into_defaults(value: serde_json::Value, format: &str) -> Result<Settings, SequelError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        SequelError::SerializationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, canonical_keys(value));
    serde_json::from_value(merged).map_err(|e| {
        SequelError::ConfigurationError(format!(
            "Failed to deserialize settings from {format}: {e}"
        ))
    })
}

/// Renames camelCase option keys to their snake_case field names.
///
/// Only the settings, `dialect` and `wl_next` levels are rewritten; the keys of
/// `schema_name` are table names and pass through untouched.
fn canonical_keys(value: serde_json::Value) -> serde_json::Value {
    fn rename(map: serde_json::Map<String, serde_json::Value>) -> serde_json::Map<String, serde_json::Value> {
        map.into_iter()
            .map(|(key, val)| {
                let key = KEY_ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == key)
                    .map_or(key, |(_, canonical)| (*canonical).to_string());
                let val = match (key.as_str(), val) {
                    ("dialect" | "wl_next", serde_json::Value::Object(inner)) => {
                        serde_json::Value::Object(rename(inner))
                    }
                    (_, other) => other,
                };
                (key, val)
            })
            .collect()
    }

    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(rename(map)),
        other => other,
    }
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
