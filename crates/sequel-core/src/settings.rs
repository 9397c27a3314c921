//! Dialect options and runtime settings.
//!
//! This module provides [`Options`], the per-compile dialect configuration
//! every compiler reads, and [`Settings`], which bundles the dialect with the
//! logging configuration for applications that load it from a file.
//!
//! Options are plain values: they are passed explicitly to each compile call
//! and never stored in a global, so compiles on different threads can use
//! different dialects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Feature flags that override the dialect's default behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NextFeatures {
    /// Forces case-sensitive comparisons regardless of column type: no
    /// `LOWER(...)` wrapping and plain `LIKE` for pattern operators.
    #[serde(alias = "caseSensitive")]
    pub case_sensitive: bool,
}

/// Dialect configuration for a compile call.
///
/// # Case sensitivity
///
/// `case_sensitive` describes the *engine*: `true` means the target database
/// compares strings case-sensitively by default (PostgreSQL), so string and
/// text attributes are wrapped in `LOWER(...)` to emulate case-insensitive
/// matching. `false` means the engine's default collation already folds case
/// (MySQL), so no wrapping is emitted. [`NextFeatures::case_sensitive`]
/// switches the emulation off entirely.
///
/// # Examples
///
/// ```
/// use sequel_core::settings::Options;
///
/// let pg = Options::postgres();
/// assert!(pg.parameterized);
/// assert_eq!(pg.escape_character, '"');
///
/// let mysql = Options::mysql();
/// assert!(!mysql.parameterized);
/// assert_eq!(mysql.escape_character, '`');
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Emit `$n` placeholders and a separate value list. When `false`,
    /// literals are escaped and inlined into the SQL text.
    pub parameterized: bool,
    /// Whether the engine compares strings case-sensitively by default.
    #[serde(alias = "caseSensitive")]
    pub case_sensitive: bool,
    /// The identifier quote character (`"` or `` ` ``).
    #[serde(alias = "escapeCharacter")]
    pub escape_character: char,
    /// Schema qualifiers keyed by table name, for multi-schema engines.
    #[serde(alias = "schemaName")]
    pub schema_name: BTreeMap<String, String>,
    /// Feature flags overriding the defaults above.
    #[serde(alias = "wlNext")]
    pub wl_next: NextFeatures,
    /// Wrap `SUM` and `AVG` projections in `CAST(... AS float)`.
    pub casting: bool,
    /// Append `RETURNING *` to `INSERT` statements.
    #[serde(alias = "canReturnValues")]
    pub can_return_values: bool,
    /// Quote column names in `INSERT` statements.
    #[serde(alias = "escapeInserts")]
    pub escape_inserts: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self::postgres()
    }
}

impl Options {
    /// PostgreSQL-style dialect: `$n` placeholders, double-quoted identifiers,
    /// case-sensitive engine.
    pub fn postgres() -> Self {
        Self {
            parameterized: true,
            case_sensitive: true,
            escape_character: '"',
            schema_name: BTreeMap::new(),
            wl_next: NextFeatures::default(),
            casting: true,
            can_return_values: true,
            escape_inserts: true,
        }
    }

    /// MySQL-style dialect: inlined literals, backtick identifiers,
    /// case-insensitive engine.
    pub fn mysql() -> Self {
        Self {
            parameterized: false,
            case_sensitive: false,
            escape_character: '`',
            schema_name: BTreeMap::new(),
            wl_next: NextFeatures::default(),
            casting: false,
            can_return_values: false,
            escape_inserts: true,
        }
    }

    /// Adds a schema qualifier for `table`.
    #[must_use]
    pub fn with_schema(mut self, table: impl Into<String>, schema: impl Into<String>) -> Self {
        self.schema_name.insert(table.into(), schema.into());
        self
    }

    /// Returns `true` when string comparisons on text columns should be
    /// folded with `LOWER(...)`.
    pub const fn folds_case(&self) -> bool {
        self.case_sensitive && !self.wl_next.case_sensitive
    }
}

/// Application-level settings: logging plus the dialect to compile for.
///
/// # Examples
///
/// ```
/// use sequel_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.log_level, "info");
/// assert!(settings.dialect.parameterized);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // ── Logging ──────────────────────────────────────────────────────

    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,
    /// The log level filter (e.g. "info", "debug", "sequel_query=trace").
    pub log_level: String,

    // ── Dialect ──────────────────────────────────────────────────────

    /// The dialect options passed to every compile.
    pub dialect: Options,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            dialect: Options::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_postgres() {
        assert_eq!(Options::default(), Options::postgres());
    }

    #[test]
    fn test_mysql_preset() {
        let o = Options::mysql();
        assert!(!o.parameterized);
        assert!(!o.case_sensitive);
        assert!(!o.casting);
        assert!(!o.can_return_values);
        assert!(o.escape_inserts);
    }

    #[test]
    fn test_folds_case() {
        assert!(Options::postgres().folds_case());
        assert!(!Options::mysql().folds_case());

        let mut forced = Options::postgres();
        forced.wl_next.case_sensitive = true;
        assert!(!forced.folds_case());
    }

    #[test]
    fn test_with_schema() {
        let o = Options::mysql().with_schema("foo", "myschema");
        assert_eq!(o.schema_name.get("foo").map(String::as_str), Some("myschema"));
    }

    #[test]
    fn test_deserialize_camel_case_aliases() {
        let json = serde_json::json!({
            "parameterized": false,
            "caseSensitive": true,
            "escapeCharacter": "`",
            "schemaName": {"foo": "myschema"},
            "wlNext": {"caseSensitive": true},
            "canReturnValues": false
        });
        let o: Options = serde_json::from_value(json).unwrap();
        assert!(!o.parameterized);
        assert!(o.case_sensitive);
        assert_eq!(o.escape_character, '`');
        assert_eq!(o.schema_name.get("foo").unwrap(), "myschema");
        assert!(o.wl_next.case_sensitive);
        assert!(!o.can_return_values);
        // Unspecified fields keep the defaults.
        assert!(o.casting);
    }

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert!(s.debug);
        assert_eq!(s.log_level, "info");
        assert_eq!(s.dialect, Options::postgres());
    }
}
