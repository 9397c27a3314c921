//! Identifier and literal escaping.
//!
//! Everything that splices user-controlled text into SQL goes through this
//! module: identifiers are wrapped in the dialect's quote character, string
//! literals are backslash-escaped, and pattern values have their wildcards
//! neutralized.

use std::collections::BTreeMap;

use sequel_core::Options;

use crate::value::Value;

/// Wraps `name` in `quote`, doubling embedded quote characters.
///
/// When `schemas` maps `name` to a schema, the result is qualified with it.
/// Dots inside `name` are kept as part of the identifier.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use sequel_query::utils::escape_identifier;
///
/// assert_eq!(escape_identifier("user", '"', None), "\"user\"");
///
/// let schemas = BTreeMap::from([("foo".to_string(), "myschema".to_string())]);
/// assert_eq!(escape_identifier("foo", '`', Some(&schemas)), "`myschema`.`foo`");
/// ```
pub fn escape_identifier(
    name: &str,
    quote: char,
    schemas: Option<&BTreeMap<String, String>>,
) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    if let Some(schema) = schemas.and_then(|map| map.get(name)) {
        push_quoted(&mut out, schema, quote);
        out.push('.');
    }
    push_quoted(&mut out, name, quote);
    out
}

fn push_quoted(out: &mut String, name: &str, quote: char) {
    out.push(quote);
    for c in name.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
}

/// Quotes a table name for a `FROM`/`JOIN` position, schema-qualified when
/// the options carry a schema for it.
pub fn table_reference(table_name: &str, options: &Options) -> String {
    escape_identifier(table_name, options.escape_character, Some(&options.schema_name))
}

/// Builds `"table"."column"`, wrapped in `LOWER(...)` when `lowercase`.
pub fn param_expression(table: &str, column: &str, lowercase: bool, quote: char) -> String {
    let expr = format!(
        "{}.{}",
        escape_identifier(table, quote, None),
        escape_identifier(column, quote, None)
    );
    if lowercase {
        format!("LOWER({expr})")
    } else {
        expr
    }
}

/// Backslash-escapes a string for use inside a quoted SQL literal.
///
/// Escapes NUL, newline, carriage return, backspace, tab, backslash, both
/// quote characters and `0x1a`. With `for_like`, `%` and `_` are escaped too
/// so they match literally inside a `LIKE` pattern.
///
/// ```
/// use sequel_query::utils::escape_string_literal;
///
/// assert_eq!(escape_string_literal("it's", false), "it\\'s");
/// assert_eq!(escape_string_literal("50%_", true), "50\\%\\_");
/// assert_eq!(escape_string_literal("50%_", false), "50%_");
/// ```
pub fn escape_string_literal(value: &str, for_like: bool) -> String {
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{8}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\u{1a}' => out.push_str("\\Z"),
            '\\' | '\'' | '"' => {
                out.push('\\');
                out.push(c);
            }
            '%' | '_' if for_like => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Escapes the `LIKE` metacharacters (`\`, `%`, `_`) of a bound pattern
/// fragment.
pub fn escape_like_pattern(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Wraps already-escaped literal text in double quotes.
pub fn quote_literal(escaped: &str) -> String {
    format!("\"{escaped}\"")
}

/// Renders a value as an inline SQL literal.
///
/// The value is normalized first; strings are escaped and double-quoted,
/// numbers and booleans are written bare and null becomes `NULL`.
pub fn render_literal(value: &Value) -> String {
    match value.clone().normalize() {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => quote_literal(&escape_string_literal(&s, false)),
        other => quote_literal(&escape_string_literal(&other.to_string(), false)),
    }
}

/// Renders a literal that reads as a value next to identifiers quoted with
/// the dialect's escape character.
///
/// Where `"` quotes identifiers, strings use standard single quotes with
/// embedded `'` doubled. Other dialects get [`render_literal`].
pub fn dialect_literal(value: &Value, options: &Options) -> String {
    if options.escape_character != '"' {
        return render_literal(value);
    }
    match value.clone().normalize() {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => render_literal(&other),
    }
}
