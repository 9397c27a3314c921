//! The schema descriptor the compilers resolve names against.
//!
//! A [`Schema`] maps table identities to [`TableSchema`]s, each carrying its
//! physical table name and an ordered set of [`AttributeDef`]s. Attribute
//! order matters: it is the column order of every generated projection.
//!
//! Schemas are read-only once built and can be shared across threads.
//!
//! # Examples
//!
//! ```
//! use sequel_query::schema::{AttributeDef, AttributeType, Schema, TableSchema};
//!
//! let schema = Schema::new().with_table(
//!     "user",
//!     TableSchema::new("userTable")
//!         .attribute("id", AttributeDef::new(AttributeType::Integer).primary_key())
//!         .attribute("email", AttributeDef::new(AttributeType::String).column_name("emailAddress")),
//! );
//!
//! let table = schema.table("userTable").unwrap();
//! assert_eq!(table.column("email"), "emailAddress");
//! ```

use serde::{Deserialize, Serialize};

use sequel_core::{SequelError, SequelResult};

/// The declared type of an attribute.
///
/// Only the string-like types influence compilation (case folding); the rest
/// are kept so schemas round-trip through serde.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttributeType {
    String,
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Binary,
    Array,
    Json,
    /// Any type name without special handling.
    Other(String),
}

impl AttributeType {
    /// Returns `true` for types whose comparisons fold case.
    pub const fn folds_case(&self) -> bool {
        matches!(self, Self::String | Self::Text)
    }

    /// The canonical lower-case type name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Binary => "binary",
            Self::Array => "array",
            Self::Json => "json",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for AttributeType {
    fn from(name: String) -> Self {
        match name.to_lowercase().as_str() {
            "string" => Self::String,
            "text" | "mediumtext" | "longtext" => Self::Text,
            "integer" => Self::Integer,
            "float" => Self::Float,
            "boolean" => Self::Boolean,
            "date" => Self::Date,
            "datetime" => Self::DateTime,
            "binary" => Self::Binary,
            "array" => Self::Array,
            "json" => Self::Json,
            _ => Self::Other(name),
        }
    }
}

impl From<AttributeType> for String {
    fn from(ty: AttributeType) -> Self {
        match ty {
            AttributeType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

/// One attribute of a table.
///
/// Deserializes from either the type shorthand (`"string"`) or the full
/// object form (`{"type": "string", "columnName": "..."}`). Keys the
/// compilers do not use (`defaultsTo`, `unique`, ...) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawAttribute", rename_all = "camelCase")]
pub struct AttributeDef {
    /// The declared type; collections have none.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub attr_type: Option<AttributeType>,
    /// The physical column name, when it differs from the attribute name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    pub primary_key: bool,
    pub foreign_key: bool,
    /// The table identity a foreign key points at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
    /// The referenced column of a foreign key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<String>,
    /// The related model of a to-many association.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// The related model of a to-one association.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAttribute {
    Shorthand(String),
    Full(FullAttribute),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FullAttribute {
    #[serde(rename = "type", default)]
    attr_type: Option<String>,
    #[serde(default)]
    column_name: Option<String>,
    #[serde(default)]
    primary_key: bool,
    #[serde(default)]
    foreign_key: bool,
    #[serde(default)]
    references: Option<String>,
    #[serde(default)]
    on: Option<String>,
    #[serde(default)]
    collection: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    via: Option<String>,
}

impl From<RawAttribute> for AttributeDef {
    fn from(raw: RawAttribute) -> Self {
        match raw {
            RawAttribute::Shorthand(ty) => Self::new(AttributeType::from(ty)),
            RawAttribute::Full(full) => Self {
                attr_type: full.attr_type.map(AttributeType::from),
                column_name: full.column_name,
                primary_key: full.primary_key,
                foreign_key: full.foreign_key,
                references: full.references,
                on: full.on,
                collection: full.collection,
                model: full.model,
                via: full.via,
            },
        }
    }
}

impl AttributeDef {
    /// Creates an attribute of the given type.
    pub fn new(attr_type: AttributeType) -> Self {
        Self {
            attr_type: Some(attr_type),
            ..Self::default()
        }
    }

    /// Creates a to-many association attribute, which has no column.
    pub fn collection(model: impl Into<String>, via: impl Into<String>) -> Self {
        Self {
            collection: Some(model.into()),
            via: Some(via.into()),
            ..Self::default()
        }
    }

    /// Sets the physical column name.
    pub fn column_name(mut self, name: impl Into<String>) -> Self {
        self.column_name = Some(name.into());
        self
    }

    /// Marks the attribute as the table's primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the attribute as a foreign key to `table`.`on`.
    pub fn foreign_key(mut self, table: impl Into<String>, on: impl Into<String>) -> Self {
        let table = table.into();
        self.foreign_key = true;
        self.model = Some(table.clone());
        self.references = Some(table);
        self.on = Some(on.into());
        self
    }

    /// Returns `true` if the attribute is a to-many association.
    pub const fn is_collection(&self) -> bool {
        self.collection.is_some()
    }

    /// Returns `true` if string comparisons on this attribute fold case.
    pub fn folds_case(&self) -> bool {
        self.attr_type.as_ref().is_some_and(AttributeType::folds_case)
    }

    /// The table a to-one association points at, if any.
    pub fn related_table(&self) -> Option<&str> {
        if !self.foreign_key && self.model.is_none() {
            return None;
        }
        self.references.as_deref().or(self.model.as_deref())
    }
}

/// A table: its physical name and its attributes in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    /// The physical table name, also used as the table's SQL alias.
    #[serde(default)]
    pub table_name: String,
    #[serde(alias = "definition", default, with = "ordered_attributes")]
    pub attributes: Vec<(String, AttributeDef)>,
}

impl TableSchema {
    /// Creates an empty table.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            attributes: Vec::new(),
        }
    }

    /// Appends an attribute.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, def: AttributeDef) -> Self {
        self.attributes.push((name.into(), def));
        self
    }

    /// Looks up an attribute by its name.
    pub fn get(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, def)| def)
    }

    /// Resolves a criteria key to an attribute, by name first and then by
    /// column name.
    pub fn resolve(&self, key: &str) -> Option<(&str, &AttributeDef)> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr == key)
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|(_, def)| def.column_name.as_deref() == Some(key))
            })
            .map(|(attr, def)| (attr.as_str(), def))
    }

    /// The column a key refers to; unknown keys pass through verbatim.
    pub fn column<'a>(&'a self, key: &'a str) -> &'a str {
        match self.resolve(key) {
            Some((attr, def)) => def.column_name.as_deref().unwrap_or(attr),
            None => key,
        }
    }

    /// The primary key attribute name, defaulting to `id`.
    pub fn primary_key(&self) -> &str {
        self.attributes
            .iter()
            .find(|(_, def)| def.primary_key)
            .map_or("id", |(attr, _)| attr.as_str())
    }

    /// Returns `false` for collection attributes, which have no column.
    /// Unknown keys are taken to be raw columns.
    pub fn is_column(&self, key: &str) -> bool {
        self.resolve(key).map_or(true, |(_, def)| !def.is_collection())
    }

    /// Column names of every attribute that maps to a column.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .filter(|(_, def)| !def.is_collection())
            .map(|(attr, def)| def.column_name.as_deref().unwrap_or(attr))
    }
}

/// The full schema: table identity to table, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    tables: Vec<(String, TableSchema)>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table under `identity`.
    #[must_use]
    pub fn with_table(mut self, identity: impl Into<String>, table: TableSchema) -> Self {
        self.insert(identity, table);
        self
    }

    /// Adds or replaces a table under `identity`. An empty table name
    /// defaults to the identity.
    pub fn insert(&mut self, identity: impl Into<String>, mut table: TableSchema) {
        let identity = identity.into();
        if table.table_name.is_empty() {
            table.table_name.clone_from(&identity);
        }
        if let Some(slot) = self.tables.iter_mut().find(|(id, _)| *id == identity) {
            slot.1 = table;
        } else {
            self.tables.push((identity, table));
        }
    }

    /// Looks a table up by identity, then by physical table name.
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables
            .iter()
            .find(|(identity, _)| identity == name)
            .or_else(|| self.tables.iter().find(|(_, t)| t.table_name == name))
            .map(|(_, table)| table)
    }

    /// Like [`Schema::table`], failing with a construction error.
    pub fn require(&self, name: &str) -> SequelResult<&TableSchema> {
        self.table(name).ok_or_else(|| {
            SequelError::Construction(format!("table `{name}` is not defined in the schema"))
        })
    }

    /// Iterates tables in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TableSchema)> {
        self.tables.iter().map(|(id, t)| (id.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Parses a schema from its JSON form.
    pub fn from_json_str(json: &str) -> SequelResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SequelError::SerializationError(format!("Invalid schema: {e}")))
    }
}

impl Serialize for Schema {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.tables.len()))?;
        for (identity, table) in &self.tables {
            map.serialize_entry(identity, table)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut schema = Self::new();
        for (identity, table) in raw {
            let table: TableSchema =
                serde_json::from_value(table).map_err(serde::de::Error::custom)?;
            schema.insert(identity, table);
        }
        Ok(schema)
    }
}

/// Attribute maps keep declaration order by going through an
/// order-preserving `serde_json::Map`.
mod ordered_attributes {
    use super::AttributeDef;
    use serde::{ser::SerializeMap, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        attributes: &[(String, AttributeDef)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(attributes.len()))?;
        for (name, def) in attributes {
            map.serialize_entry(name, def)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, AttributeDef)>, D::Error> {
        serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?
            .into_iter()
            .map(|(name, def)| {
                serde_json::from_value(def)
                    .map(|def| (name, def))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}
