//! The query object: criteria trees, sorting, pagination, aggregates and
//! population instructions.
//!
//! Every type here deserializes from the JSON shape callers already produce,
//! and can also be built directly in Rust. Maps keep insertion order so that
//! compiled SQL is deterministic.
//!
//! # Examples
//!
//! ```
//! use sequel_query::query::criteria::{Criteria, Filter, QueryObject};
//!
//! let query: QueryObject = serde_json::from_value(serde_json::json!({
//!     "where": {"name": "foo", "age": {">": 21}},
//!     "sort": {"age": -1},
//!     "limit": 10
//! }))
//! .unwrap();
//! assert_eq!(query.criteria().len(), 2);
//!
//! let built = QueryObject::new()
//!     .filter(Criteria::new().with("name", "foo"))
//!     .limit(10);
//! assert_eq!(built.limit, Some(10));
//! ```

use serde::{Deserialize, Deserializer, Serialize};

use crate::value::Value;

// ── Criteria tree ──────────────────────────────────────────────────────

/// A node of the criteria tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Filter {
    /// A scalar: equality against a column, or an operator's operand.
    Value(Value),
    /// An array: `IN` lists and `and`/`or` groups.
    List(Vec<Filter>),
    /// A nested object: operator maps and association filters.
    Object(Criteria),
}

impl Filter {
    /// Returns the nested criteria if this is an object.
    pub const fn as_object(&self) -> Option<&Criteria> {
        match self {
            Self::Object(criteria) => Some(criteria),
            _ => None,
        }
    }

    /// A short description of the node's shape, for error messages.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Value(Value::Null) => "null",
            Self::Value(_) => "a scalar",
            Self::List(_) => "an array",
            Self::Object(_) => "an object",
        }
    }
}

impl From<serde_json::Value> for Filter {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Object(Criteria::from(map)),
            scalar => Self::Value(Value::from(scalar)),
        }
    }
}

impl From<Filter> for serde_json::Value {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Value(v) => v.to_json(),
            Filter::List(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Filter::Object(criteria) => Self::Object(criteria.into()),
        }
    }
}

impl From<Value> for Filter {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<&str> for Filter {
    fn from(v: &str) -> Self {
        Self::Value(Value::from(v))
    }
}

impl From<String> for Filter {
    fn from(v: String) -> Self {
        Self::Value(Value::from(v))
    }
}

impl From<i32> for Filter {
    fn from(v: i32) -> Self {
        Self::Value(Value::from(v))
    }
}

impl From<i64> for Filter {
    fn from(v: i64) -> Self {
        Self::Value(Value::Int(v))
    }
}

impl From<bool> for Filter {
    fn from(v: bool) -> Self {
        Self::Value(Value::Bool(v))
    }
}

impl From<Criteria> for Filter {
    fn from(v: Criteria) -> Self {
        Self::Object(v)
    }
}

impl<T: Into<Filter>> From<Vec<T>> for Filter {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// An ordered criteria object: keys are attribute names, `and`/`or`/`like`,
/// or operator keys when nested under an attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "serde_json::Map<String, serde_json::Value>",
    into = "serde_json::Map<String, serde_json::Value>"
)]
pub struct Criteria(Vec<(String, Filter)>);

impl Criteria {
    /// Creates an empty criteria object.
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a key.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, filter: impl Into<Filter>) -> Self {
        self.push(key, filter);
        self
    }

    /// Appends a key in place.
    pub fn push(&mut self, key: impl Into<String>, filter: impl Into<Filter>) {
        self.0.push((key.into(), filter.into()));
    }

    /// Looks a key up.
    pub fn get(&self, key: &str) -> Option<&Filter> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, f)| f)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Filter)> {
        self.0.iter().map(|(k, f)| (k.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Criteria {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map.into_iter().map(|(k, v)| (k, Filter::from(v))).collect())
    }
}

impl From<Criteria> for serde_json::Map<String, serde_json::Value> {
    fn from(criteria: Criteria) -> Self {
        criteria
            .0
            .into_iter()
            .map(|(k, f)| (k, serde_json::Value::from(f)))
            .collect()
    }
}

// ── Sorting ────────────────────────────────────────────────────────────

/// Sort direction, written `1`/`-1` or `"asc"`/`"desc"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub enum SortDirection {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

impl SortDirection {
    /// The SQL keyword.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl TryFrom<serde_json::Value> for SortDirection {
    type Error = String;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match &value {
            serde_json::Value::Number(n) if n.as_i64() == Some(1) => Ok(Self::Asc),
            serde_json::Value::Number(n) if n.as_i64() == Some(-1) => Ok(Self::Desc),
            serde_json::Value::String(s) if s.eq_ignore_ascii_case("asc") => Ok(Self::Asc),
            serde_json::Value::String(s) if s.eq_ignore_ascii_case("desc") => Ok(Self::Desc),
            _ => Err(format!(
                "invalid sort direction {value}: expected 1, -1, \"asc\" or \"desc\""
            )),
        }
    }
}

// ── Population instructions ────────────────────────────────────────────

/// How an association is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum JoinStrategy {
    /// The parent holds the foreign key: one `LEFT OUTER JOIN`.
    HasForeignKey,
    /// The child holds the foreign key: a per-parent subquery.
    ViaForeignKey,
    /// A junction table links both sides: a two-stage subquery.
    ViaJunction,
}

impl TryFrom<u8> for JoinStrategy {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::HasForeignKey),
            2 => Ok(Self::ViaForeignKey),
            3 => Ok(Self::ViaJunction),
            other => Err(format!("unknown join strategy {other}: expected 1, 2 or 3")),
        }
    }
}

impl From<JoinStrategy> for u8 {
    fn from(strategy: JoinStrategy) -> Self {
        match strategy {
            JoinStrategy::HasForeignKey => 1,
            JoinStrategy::ViaForeignKey => 2,
            JoinStrategy::ViaJunction => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    pub strategy: JoinStrategy,
    /// Free-form hints from the caller; not used for compilation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// One hop of an association: `parent.parentKey` to `child.childKey`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationSpec {
    pub parent: String,
    pub parent_key: String,
    pub child: String,
    pub child_key: String,
    /// The association attribute name on the parent.
    #[serde(default)]
    pub alias: String,
    /// Child columns to project; all non-collection columns when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
    /// Filters, sorting and pagination applied to the child rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<QueryObject>,
}

/// Population instructions for one association attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub strategy: StrategySpec,
    pub instructions: Vec<PopulationSpec>,
}

impl Instruction {
    pub fn new(strategy: JoinStrategy, instructions: Vec<PopulationSpec>) -> Self {
        Self {
            strategy: StrategySpec {
                strategy,
                meta: None,
            },
            instructions,
        }
    }

    pub const fn join_strategy(&self) -> JoinStrategy {
        self.strategy.strategy
    }
}

// ── Query object ───────────────────────────────────────────────────────

/// A complete query object.
///
/// When `where` is absent, any keys not claimed by the other fields are read
/// as the criteria themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryObject {
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Criteria>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
    #[serde(default, with = "ordered_pairs", skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<(String, SortDirection)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<String>>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub sum: Option<Vec<String>>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub average: Option<Vec<String>>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<String>>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<String>>,
    #[serde(default, with = "ordered_pairs", skip_serializing_if = "Vec::is_empty")]
    pub instructions: Vec<(String, Instruction)>,
    /// Criteria written directly on the query object.
    #[serde(flatten)]
    pub loose: Criteria,
}

impl QueryObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// The criteria to compile: `where` when present, else the loose keys.
    pub fn criteria(&self) -> &Criteria {
        self.where_clause.as_ref().unwrap_or(&self.loose)
    }

    /// Returns `true` when any aggregate projection is requested.
    pub const fn is_aggregate(&self) -> bool {
        self.group_by.is_some()
            || self.sum.is_some()
            || self.average.is_some()
            || self.min.is_some()
            || self.max.is_some()
    }

    #[must_use]
    pub fn filter(mut self, criteria: Criteria) -> Self {
        self.where_clause = Some(criteria);
        self
    }

    #[must_use]
    pub fn select<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.select = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn sort(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push((column.into(), direction));
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn group_by<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.group_by = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn populate(mut self, attribute: impl Into<String>, instruction: Instruction) -> Self {
        self.instructions.push((attribute.into(), instruction));
        self
    }
}

/// Accepts either a single string or an array of strings.
fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<String>>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(
        Option::<OneOrMany>::deserialize(deserializer)?.map(|v| match v {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }),
    )
}

/// Object-shaped fields decoded into ordered `(key, value)` pairs.
mod ordered_pairs {
    use serde::de::DeserializeOwned;
    use serde::{ser::SerializeMap, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer, T: Serialize>(
        pairs: &[(String, T)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(pairs.len()))?;
        for (key, value) in pairs {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>, T: DeserializeOwned>(
        deserializer: D,
    ) -> Result<Vec<(String, T)>, D::Error> {
        Option::<serde_json::Map<String, serde_json::Value>>::deserialize(deserializer)?
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| {
                serde_json::from_value(value)
                    .map(|value| (key, value))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}
