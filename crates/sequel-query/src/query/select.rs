//! The select compiler: projections and the `FROM` clause.
//!
//! A plain select projects every column of the table (or an explicit list,
//! always including the primary key) plus the columns of each association
//! joined with [`JoinStrategy::HasForeignKey`], aliased so joined rows can be
//! split apart again. An aggregate select projects the `groupBy` columns and
//! one expression per requested calculation instead.

use sequel_core::{Options, SequelError, SequelResult};

use crate::query::compiler::column_reference;
use crate::query::criteria::{Instruction, JoinStrategy, PopulationSpec, QueryObject};
use crate::schema::{Schema, TableSchema};
use crate::utils::{escape_identifier, param_expression, table_reference};

/// An aggregate calculation key and its SQL function.
struct Calculation<'q> {
    key: &'static str,
    function: &'static str,
    columns: Option<&'q [String]>,
}

impl Calculation<'_> {
    /// `SUM` and `AVG` may be cast to float.
    fn castable(&self) -> bool {
        matches!(self.function, "SUM" | "AVG")
    }
}

fn calculations(query: &QueryObject) -> [Calculation<'_>; 4] {
    [
        Calculation {
            key: "sum",
            function: "SUM",
            columns: query.sum.as_deref(),
        },
        Calculation {
            key: "average",
            function: "AVG",
            columns: query.average.as_deref(),
        },
        Calculation {
            key: "min",
            function: "MIN",
            columns: query.min.as_deref(),
        },
        Calculation {
            key: "max",
            function: "MAX",
            columns: query.max.as_deref(),
        },
    ]
}

/// Renders `SELECT ... FROM ...` for one table.
pub struct SelectCompiler<'a> {
    schema: &'a Schema,
    table: &'a TableSchema,
    options: &'a Options,
}

impl<'a> SelectCompiler<'a> {
    /// Creates a compiler for `table` (an identity or a table name).
    pub fn new(schema: &'a Schema, table: &str, options: &'a Options) -> SequelResult<Self> {
        Ok(Self {
            schema,
            table: schema.require(table)?,
            options,
        })
    }

    /// Compiles the projection and `FROM` clause, with a trailing space.
    ///
    /// # Errors
    ///
    /// Aggregate queries fail with [`SequelError::MissingGroupBy`] or
    /// [`SequelError::MissingCalculation`] when only half of the pair is
    /// given. Joined associations must name tables the schema knows.
    pub fn compile(&self, query: &QueryObject) -> SequelResult<String> {
        let projection = if query.is_aggregate() {
            self.aggregate_projection(query)?
        } else {
            self.column_projection(query)?
        };
        Ok(format!(
            "SELECT {} FROM {} AS {} ",
            projection.join(", "),
            table_reference(&self.table.table_name, self.options),
            self.quote(&self.table.table_name)
        ))
    }

    fn quote(&self, name: &str) -> String {
        escape_identifier(name, self.options.escape_character, None)
    }

    fn column(&self, key: &str) -> String {
        param_expression(
            &self.table.table_name,
            self.table.column(key),
            false,
            self.options.escape_character,
        )
    }

    // ── Plain projections ────────────────────────────────────────────

    fn column_projection(&self, query: &QueryObject) -> SequelResult<Vec<String>> {
        let mut projection: Vec<String> = match &query.select {
            Some(keys) if !keys.is_empty() => {
                let primary_key = self.table.primary_key();
                let has_primary_key = keys
                    .iter()
                    .any(|key| self.table.column(key) == self.table.column(primary_key));
                let mut columns = Vec::with_capacity(keys.len() + 1);
                if !has_primary_key {
                    columns.push(self.column(primary_key));
                }
                columns.extend(
                    keys.iter()
                        .filter(|key| self.table.is_column(key))
                        .map(|key| self.column(key)),
                );
                columns
            }
            _ => self
                .table
                .columns()
                .map(|column| self.column(column))
                .collect(),
        };

        for (attribute, instruction) in &query.instructions {
            if instruction.join_strategy() == JoinStrategy::HasForeignKey {
                projection.extend(self.joined_columns(attribute, instruction)?);
            }
        }
        Ok(projection)
    }

    /// `"__alias"."column" AS "alias___column"` for each child column.
    fn joined_columns(
        &self,
        attribute: &str,
        instruction: &Instruction,
    ) -> SequelResult<Vec<String>> {
        let spec = first_stage(attribute, instruction)?;
        let child = self.schema.require(&spec.child)?;
        let alias = association_alias(attribute, spec);
        let join_alias = format!("__{alias}");

        let columns: Vec<&str> = match &spec.select {
            Some(keys) => keys
                .iter()
                .filter(|key| child.is_column(key))
                .map(|key| child.column(key))
                .collect(),
            None => child.columns().collect(),
        };

        Ok(columns
            .into_iter()
            .map(|column| {
                format!(
                    "{} AS {}",
                    param_expression(&join_alias, column, false, self.options.escape_character),
                    self.quote(&format!("{alias}___{column}"))
                )
            })
            .collect())
    }

    // ── Aggregates ───────────────────────────────────────────────────

    fn aggregate_projection(&self, query: &QueryObject) -> SequelResult<Vec<String>> {
        let groups = query.group_by.as_deref().unwrap_or_default();
        let calculations = calculations(query);
        let requested: Vec<&Calculation<'_>> = calculations
            .iter()
            .filter(|calc| calc.columns.is_some_and(|columns| !columns.is_empty()))
            .collect();

        let Some(first) = requested.first() else {
            return Err(SequelError::MissingCalculation);
        };
        if groups.is_empty() {
            return Err(SequelError::MissingGroupBy {
                function: first.key,
            });
        }

        let mut projection = Vec::new();
        for (index, key) in groups.iter().enumerate() {
            projection.push(
                column_reference(self.table, key, self.options)
                    .unwrap_or_else(|| format!("{key} as group{index}")),
            );
        }

        for calc in requested {
            for key in calc.columns.unwrap_or_default() {
                let expression = format!("{}({})", calc.function, self.column(key));
                let expression = if self.options.casting && calc.castable() {
                    format!("CAST({expression} AS float)")
                } else {
                    expression
                };
                projection.push(format!("{expression} AS {key}"));
            }
        }
        Ok(projection)
    }
}

/// The alias an association's columns are projected under.
pub(crate) fn association_alias<'s>(attribute: &'s str, spec: &'s PopulationSpec) -> &'s str {
    if spec.alias.is_empty() {
        attribute
    } else {
        &spec.alias
    }
}

/// The first population stage of an instruction.
pub(crate) fn first_stage<'i>(
    attribute: &str,
    instruction: &'i Instruction,
) -> SequelResult<&'i PopulationSpec> {
    instruction.instructions.first().ok_or_else(|| {
        SequelError::MalformedCriteria(format!(
            "population of `{attribute}` has no instructions"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeDef, AttributeType};

    fn schema() -> Schema {
        Schema::new()
            .with_table(
                "post",
                TableSchema::new("post")
                    .attribute("title", AttributeDef::new(AttributeType::String))
                    .attribute("id", AttributeDef::new(AttributeType::Integer).primary_key())
                    .attribute(
                        "score",
                        AttributeDef::new(AttributeType::Float).column_name("score_value"),
                    )
                    .attribute(
                        "author",
                        AttributeDef::new(AttributeType::Integer).foreign_key("author", "id"),
                    )
                    .attribute("comments", AttributeDef::collection("comment", "post")),
            )
            .with_table(
                "author",
                TableSchema::new("author")
                    .attribute("id", AttributeDef::new(AttributeType::Integer).primary_key())
                    .attribute("name", AttributeDef::new(AttributeType::String))
                    .attribute("posts", AttributeDef::collection("post", "author")),
            )
    }

    fn select(options: &Options, json: serde_json::Value) -> SequelResult<String> {
        let schema = schema();
        let query: QueryObject = serde_json::from_value(json).unwrap();
        SelectCompiler::new(&schema, "post", options)?.compile(&query)
    }

    fn pg(json: serde_json::Value) -> String {
        select(&Options::postgres(), json).unwrap()
    }

    #[test]
    fn test_all_columns_skip_collections() {
        assert_eq!(
            pg(serde_json::json!({})),
            "SELECT \"post\".\"title\", \"post\".\"id\", \"post\".\"score_value\", \"post\".\"author\" FROM \"post\" AS \"post\" "
        );
    }

    #[test]
    fn test_schema_qualified_from() {
        let options = Options::postgres().with_schema("post", "blog");
        let sql = select(&options, serde_json::json!({"select": ["title"]})).unwrap();
        assert_eq!(
            sql,
            "SELECT \"post\".\"id\", \"post\".\"title\" FROM \"blog\".\"post\" AS \"post\" "
        );
    }

    #[test]
    fn test_select_list_keeps_primary_key() {
        assert_eq!(
            pg(serde_json::json!({"select": ["score", "id"]})),
            "SELECT \"post\".\"score_value\", \"post\".\"id\" FROM \"post\" AS \"post\" "
        );
    }

    #[test]
    fn test_select_list_skips_collections() {
        assert_eq!(
            pg(serde_json::json!({"select": ["title", "comments"]})),
            "SELECT \"post\".\"id\", \"post\".\"title\" FROM \"post\" AS \"post\" "
        );
    }

    #[test]
    fn test_joined_columns() {
        let sql = pg(serde_json::json!({"instructions": {"author": {
            "strategy": {"strategy": 1},
            "instructions": [{
                "parent": "post", "parentKey": "author",
                "child": "author", "childKey": "id", "alias": "author"
            }]
        }}}));
        assert_eq!(
            sql,
            "SELECT \"post\".\"title\", \"post\".\"id\", \"post\".\"score_value\", \"post\".\"author\", \
             \"__author\".\"id\" AS \"author___id\", \"__author\".\"name\" AS \"author___name\" \
             FROM \"post\" AS \"post\" "
        );
    }

    #[test]
    fn test_joined_columns_honour_select() {
        let sql = pg(serde_json::json!({"select": ["title"], "instructions": {"author": {
            "strategy": {"strategy": 1},
            "instructions": [{
                "parent": "post", "parentKey": "author",
                "child": "author", "childKey": "id", "alias": "writer",
                "select": ["name"]
            }]
        }}}));
        assert_eq!(
            sql,
            "SELECT \"post\".\"id\", \"post\".\"title\", \"__writer\".\"name\" AS \"writer___name\" FROM \"post\" AS \"post\" "
        );
    }

    #[test]
    fn test_joined_select_skips_collections() {
        let sql = pg(serde_json::json!({"select": ["title"], "instructions": {"author": {
            "strategy": {"strategy": 1},
            "instructions": [{
                "parent": "post", "parentKey": "author",
                "child": "author", "childKey": "id", "alias": "author",
                "select": ["name", "posts"]
            }]
        }}}));
        assert_eq!(
            sql,
            "SELECT \"post\".\"id\", \"post\".\"title\", \"__author\".\"name\" AS \"author___name\" FROM \"post\" AS \"post\" "
        );
    }

    #[test]
    fn test_other_strategies_add_no_columns() {
        let sql = pg(serde_json::json!({"select": ["id"], "instructions": {"comments": {
            "strategy": {"strategy": 2},
            "instructions": [{
                "parent": "post", "parentKey": "id",
                "child": "comment", "childKey": "post", "alias": "comments"
            }]
        }}}));
        assert_eq!(sql, "SELECT \"post\".\"id\" FROM \"post\" AS \"post\" ");
    }

    #[test]
    fn test_join_to_unknown_table() {
        let err = select(
            &Options::postgres(),
            serde_json::json!({"instructions": {"x": {
                "strategy": {"strategy": 1},
                "instructions": [{"parent": "post", "parentKey": "x", "child": "ghost", "childKey": "id"}]
            }}}),
        )
        .unwrap_err();
        assert!(matches!(err, SequelError::Construction(_)));
    }

    #[test]
    fn test_aggregate_with_cast() {
        let sql = pg(serde_json::json!({"groupBy": "title", "sum": "score", "max": ["id"]}));
        assert_eq!(
            sql,
            "SELECT \"post\".\"title\", CAST(SUM(\"post\".\"score_value\") AS float) AS score, MAX(\"post\".\"id\") AS id FROM \"post\" AS \"post\" "
        );
    }

    #[test]
    fn test_aggregate_without_cast() {
        let sql = select(
            &Options::mysql(),
            serde_json::json!({"groupBy": ["title"], "average": "score"}),
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT `post`.`title`, AVG(`post`.`score_value`) AS score FROM `post` AS `post` "
        );
    }

    #[test]
    fn test_aggregate_group_expression() {
        let sql = pg(serde_json::json!({"groupBy": "date(\"post\".\"x\")", "min": "id"}));
        assert_eq!(
            sql,
            "SELECT date(\"post\".\"x\") as group0, MIN(\"post\".\"id\") AS id FROM \"post\" AS \"post\" "
        );
    }

    #[test]
    fn test_group_by_without_calculation() {
        let err = select(&Options::postgres(), serde_json::json!({"groupBy": "title"})).unwrap_err();
        assert!(matches!(err, SequelError::MissingCalculation));
    }

    #[test]
    fn test_calculation_without_group_by() {
        let err = select(&Options::postgres(), serde_json::json!({"average": "score"})).unwrap_err();
        assert!(matches!(err, SequelError::MissingGroupBy { function: "average" }));
    }
}
