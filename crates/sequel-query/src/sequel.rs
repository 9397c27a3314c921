//! The query orchestrator.
//!
//! [`Sequel`] binds a schema to a dialect and exposes the three statement
//! builders: [`Sequel::select`], [`Sequel::find`] and [`Sequel::create`].
//! Every call builds fresh compiler state, so one `Sequel` can be shared
//! freely between threads.
//!
//! # Examples
//!
//! ```
//! use sequel_core::Options;
//! use sequel_query::query::QueryObject;
//! use sequel_query::schema::{AttributeDef, AttributeType, Schema, TableSchema};
//! use sequel_query::sequel::Sequel;
//!
//! let schema = Schema::new().with_table(
//!     "user",
//!     TableSchema::new("user")
//!         .attribute("id", AttributeDef::new(AttributeType::Integer).primary_key())
//!         .attribute("age", AttributeDef::new(AttributeType::Integer)),
//! );
//! let sequel = Sequel::new(schema, Options::postgres());
//!
//! let query: QueryObject = serde_json::from_value(serde_json::json!({
//!     "where": {"age": {">=": 18}},
//!     "limit": 10
//! }))
//! .unwrap();
//! let find = sequel.find("user", &query).unwrap();
//! assert_eq!(
//!     find.query,
//!     "SELECT \"user\".\"id\", \"user\".\"age\" FROM \"user\" AS \"user\"  \
//!      WHERE \"user\".\"age\" >= $1  LIMIT 10"
//! );
//! ```

use serde::Serialize;
use sequel_core::logging::compile_span;
use sequel_core::{Options, SequelError, SequelResult};

use crate::query::compiler::CriteriaCompiler;
use crate::query::criteria::QueryObject;
use crate::query::join::{foreign_key_joins, population_template, PopulationTemplate};
use crate::query::select::SelectCompiler;
use crate::schema::Schema;
use crate::utils::{escape_identifier, render_literal, table_reference};
use crate::value::Value;

/// The output of [`Sequel::select`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectQuery {
    pub select: Vec<String>,
}

/// The output of [`Sequel::find`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindQuery {
    /// The main statement.
    pub query: String,
    /// Values bound to the main statement's placeholders.
    pub values: Vec<Value>,
    /// One template per association that is not joined, in instruction order.
    pub populations: Vec<PopulationTemplate>,
}

impl FindQuery {
    /// The main statement followed by every population template.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.query.as_str())
            .chain(self.populations.iter().map(|template| template.sql.as_str()))
    }
}

/// The output of [`Sequel::create`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertQuery {
    pub query: String,
    pub values: Vec<Value>,
}

/// Builds SQL statements for the tables of one schema.
#[derive(Debug, Clone)]
pub struct Sequel {
    schema: Schema,
    options: Options,
}

impl Sequel {
    pub const fn new(schema: Schema, options: Options) -> Self {
        Self { schema, options }
    }

    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// Builds the `SELECT ... FROM ...` prefix for `table`.
    ///
    /// # Errors
    ///
    /// Fails if `table` is unknown or the aggregate keys are incomplete.
    pub fn select(&self, table: &str, query: &QueryObject) -> SequelResult<SelectQuery> {
        let span = compile_span("select", table);
        let _guard = span.enter();

        let select = SelectCompiler::new(&self.schema, table, &self.options)?.compile(query)?;
        tracing::debug!(sql = %select, "compiled select");
        Ok(SelectQuery {
            select: vec![select],
        })
    }

    /// Builds a complete read: projection, joins, criteria, trailing clauses
    /// and one template per populated association.
    ///
    /// # Errors
    ///
    /// Propagates every compiler error; nothing is returned on failure.
    pub fn find(&self, table: &str, query: &QueryObject) -> SequelResult<FindQuery> {
        let span = compile_span("find", table);
        let _guard = span.enter();

        let mut sql = SelectCompiler::new(&self.schema, table, &self.options)?.compile(query)?;
        sql.push(' ');

        let joins = foreign_key_joins(&self.schema, &self.options, &query.instructions)?;
        if !joins.is_empty() {
            sql.push_str(&joins.join(" "));
            sql.push(' ');
        }

        let compiled = CriteriaCompiler::new(&self.schema, table, &self.options)?.compile(query)?;
        if let Some(predicate) = compiled.predicate() {
            sql.push_str("WHERE ");
            sql.push_str(&predicate);
            sql.push(' ');
        }
        sql.push_str(&compiled.tail);

        let mut populations = Vec::new();
        for (attribute, instruction) in &query.instructions {
            if let Some(template) =
                population_template(&self.schema, &self.options, attribute, instruction)?
            {
                populations.push(template);
            }
        }

        tracing::debug!(
            sql = %sql,
            values = compiled.values.len(),
            populations = populations.len(),
            "compiled find"
        );
        Ok(FindQuery {
            query: sql,
            values: compiled.values,
            populations,
        })
    }

    /// Builds an `INSERT` of one record.
    ///
    /// Keys are attribute names or column names. Values are normalized before
    /// binding (or before inlining, when the dialect is not parameterized).
    ///
    /// # Errors
    ///
    /// Fails if `table` is unknown or `record` is empty.
    pub fn create<K, V>(
        &self,
        table: &str,
        record: impl IntoIterator<Item = (K, V)>,
    ) -> SequelResult<InsertQuery>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let span = compile_span("create", table);
        let _guard = span.enter();

        let target = self.schema.require(table)?;
        let quote = self.options.escape_character;

        let mut columns = Vec::new();
        let mut operands = Vec::new();
        let mut values = Vec::new();
        for (key, value) in record {
            let column = target.column(key.as_ref());
            columns.push(if self.options.escape_inserts {
                escape_identifier(column, quote, None)
            } else {
                column.to_string()
            });

            let value = value.into().normalize();
            if self.options.parameterized {
                values.push(value);
                operands.push(format!("${}", values.len()));
            } else {
                operands.push(render_literal(&value));
            }
        }

        if columns.is_empty() {
            return Err(SequelError::MalformedCriteria(format!(
                "nothing to insert into `{table}`"
            )));
        }

        let mut query = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table_reference(&target.table_name, &self.options),
            columns.join(", "),
            operands.join(", ")
        );
        if self.options.can_return_values {
            query.push_str(" RETURNING *");
        }

        tracing::debug!(sql = %query, values = values.len(), "compiled create");
        Ok(InsertQuery { query, values })
    }

    /// Like [`Sequel::create`], taking the record as a JSON object.
    ///
    /// # Errors
    ///
    /// Fails with [`SequelError::MalformedCriteria`] if `record` is not an
    /// object, and otherwise as [`Sequel::create`] does.
    pub fn create_json(&self, table: &str, record: &serde_json::Value) -> SequelResult<InsertQuery> {
        let serde_json::Value::Object(fields) = record else {
            return Err(SequelError::MalformedCriteria(format!(
                "records inserted into `{table}` must be objects"
            )));
        };
        self.create(
            table,
            fields
                .iter()
                .map(|(key, value)| (key.as_str(), Value::from(value.clone()))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::criteria::{Criteria, SortDirection};
    use crate::schema::{AttributeDef, AttributeType, TableSchema};
    use chrono::NaiveDate;

    fn schema() -> Schema {
        Schema::new()
            .with_table(
                "user",
                TableSchema::new("users")
                    .attribute("id", AttributeDef::new(AttributeType::Integer).primary_key())
                    .attribute(
                        "email",
                        AttributeDef::new(AttributeType::String).column_name("email_address"),
                    )
                    .attribute("joined", AttributeDef::new(AttributeType::DateTime))
                    .attribute("team", AttributeDef::new(AttributeType::Integer).foreign_key("team", "id"))
                    .attribute("posts", AttributeDef::collection("post", "author")),
            )
            .with_table(
                "team",
                TableSchema::new("team")
                    .attribute("id", AttributeDef::new(AttributeType::Integer).primary_key())
                    .attribute("name", AttributeDef::new(AttributeType::String)),
            )
            .with_table(
                "post",
                TableSchema::new("post")
                    .attribute("id", AttributeDef::new(AttributeType::Integer).primary_key())
                    .attribute("title", AttributeDef::new(AttributeType::String))
                    .attribute(
                        "author",
                        AttributeDef::new(AttributeType::Integer).foreign_key("user", "id"),
                    ),
            )
    }

    fn query(json: serde_json::Value) -> QueryObject {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_select_returns_single_statement() {
        let sequel = Sequel::new(schema(), Options::postgres());
        let select = sequel.select("user", &QueryObject::new()).unwrap();
        assert_eq!(
            select.select,
            ["SELECT \"users\".\"id\", \"users\".\"email_address\", \"users\".\"joined\", \
              \"users\".\"team\" FROM \"users\" AS \"users\" "]
        );
    }

    #[test]
    fn test_find_without_criteria() {
        let sequel = Sequel::new(schema(), Options::postgres());
        let find = sequel.find("team", &QueryObject::new()).unwrap();
        assert_eq!(
            find.query,
            "SELECT \"team\".\"id\", \"team\".\"name\" FROM \"team\" AS \"team\"  "
        );
        assert!(find.values.is_empty());
        assert!(find.populations.is_empty());
    }

    #[test]
    fn test_find_with_criteria_and_tail() {
        let sequel = Sequel::new(schema(), Options::postgres());
        let find = sequel
            .find(
                "team",
                &QueryObject::new()
                    .filter(Criteria::new().with("name", "Core"))
                    .sort("name", SortDirection::Desc)
                    .skip(20),
            )
            .unwrap();
        assert_eq!(
            find.query,
            "SELECT \"team\".\"id\", \"team\".\"name\" FROM \"team\" AS \"team\"  \
             WHERE LOWER(\"team\".\"name\") = $1  ORDER BY \"team\".\"name\" DESC \
             LIMIT 184467440737095516 OFFSET 20"
        );
        assert_eq!(find.values, vec![Value::from("core")]);
    }

    #[test]
    fn test_find_with_join_and_population() {
        let sequel = Sequel::new(schema(), Options::postgres());
        let find = sequel
            .find(
                "user",
                &query(serde_json::json!({
                    "where": {"id": 3},
                    "instructions": {
                        "team": {
                            "strategy": {"strategy": 1},
                            "instructions": [{
                                "parent": "user", "parentKey": "team",
                                "child": "team", "childKey": "id", "alias": "team"
                            }]
                        },
                        "posts": {
                            "strategy": {"strategy": 2},
                            "instructions": [{
                                "parent": "user", "parentKey": "id",
                                "child": "post", "childKey": "author", "alias": "posts",
                                "criteria": {"where": {"title": {"contains": "rust"}}}
                            }]
                        }
                    }
                })),
            )
            .unwrap();

        assert_eq!(
            find.query,
            "SELECT \"users\".\"id\", \"users\".\"email_address\", \"users\".\"joined\", \
             \"users\".\"team\", \"__team\".\"id\" AS \"team___id\", \
             \"__team\".\"name\" AS \"team___name\" FROM \"users\" AS \"users\"  \
             LEFT OUTER JOIN \"team\" AS \"__team\" ON \"users\".\"team\" = \"__team\".\"id\" \
             WHERE \"users\".\"id\" = $1 "
        );
        assert_eq!(find.values, vec![Value::Int(3)]);

        assert_eq!(find.populations.len(), 1);
        let posts = &find.populations[0];
        assert_eq!(posts.attribute, "posts");
        assert_eq!(
            posts.sql,
            "(SELECT \"post\".\"id\", \"post\".\"title\", \"post\".\"author\" FROM \"post\" AS \"post\" \
             WHERE \"post\".\"author\" = ^?^ AND LOWER(\"post\".\"title\") LIKE $1 \
             ORDER BY \"post\".\"id\" ASC)"
        );
        assert_eq!(posts.values, vec![Value::from("%rust%")]);
        assert_eq!(
            find.statements().collect::<Vec<_>>(),
            [find.query.as_str(), posts.sql.as_str()]
        );
    }

    #[test]
    fn test_find_unknown_table() {
        let sequel = Sequel::new(schema(), Options::postgres());
        let err = sequel.find("ghost", &QueryObject::new()).unwrap_err();
        assert!(matches!(err, SequelError::Construction(_)));
    }

    #[test]
    fn test_create_parameterized() {
        let sequel = Sequel::new(schema(), Options::postgres());
        let joined = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let insert = sequel
            .create(
                "user",
                [
                    ("email", Value::from("a@example.com")),
                    ("joined", Value::DateTime(joined)),
                ],
            )
            .unwrap();
        assert_eq!(
            insert.query,
            "INSERT INTO \"users\" (\"email_address\", \"joined\") VALUES ($1, $2) RETURNING *"
        );
        assert_eq!(
            insert.values,
            vec![
                Value::from("a@example.com"),
                Value::from("2024-05-01 09:30:00")
            ]
        );
    }

    #[test]
    fn test_create_inline_literals() {
        let sequel = Sequel::new(schema(), Options::mysql());
        let insert = sequel
            .create_json("team", &serde_json::json!({"name": "O'Brien", "id": 4}))
            .unwrap();
        assert_eq!(
            insert.query,
            "INSERT INTO `team` (`name`, `id`) VALUES (\"O\\'Brien\", 4)"
        );
        assert!(insert.values.is_empty());
    }

    #[test]
    fn test_create_unquoted_columns() {
        let options = Options {
            escape_inserts: false,
            can_return_values: false,
            ..Options::postgres()
        };
        let sequel = Sequel::new(schema(), options);
        let insert = sequel.create("team", [("name", "core")]).unwrap();
        assert_eq!(insert.query, "INSERT INTO \"team\" (name) VALUES ($1)");
    }

    #[test]
    fn test_create_rejects_empty_and_non_objects() {
        let sequel = Sequel::new(schema(), Options::postgres());
        let empty: [(&str, Value); 0] = [];
        assert!(matches!(
            sequel.create("team", empty),
            Err(SequelError::MalformedCriteria(_))
        ));
        assert!(matches!(
            sequel.create_json("team", &serde_json::json!([1, 2])),
            Err(SequelError::MalformedCriteria(_))
        ));
    }
}
