//! The criteria compiler.
//!
//! [`CriteriaCompiler`] walks a criteria tree and produces a list of SQL
//! predicates plus the ordered values bound to their placeholders. The
//! predicates are kept as separate fragments until the caller joins them, so
//! no separator ever needs to be trimmed after the fact.
//!
//! A compiler is created for one compile and consumed by it; nothing is
//! shared between compiles except the read-only schema and options.
//!
//! # Examples
//!
//! ```
//! use sequel_core::Options;
//! use sequel_query::query::compiler::CriteriaCompiler;
//! use sequel_query::query::criteria::QueryObject;
//! use sequel_query::schema::{AttributeDef, AttributeType, Schema, TableSchema};
//! use sequel_query::value::Value;
//!
//! let schema = Schema::new().with_table(
//!     "user",
//!     TableSchema::new("user").attribute("age", AttributeDef::new(AttributeType::Integer)),
//! );
//! let options = Options::postgres();
//! let query: QueryObject = serde_json::from_value(serde_json::json!({
//!     "where": {"age": {">": 21}}
//! }))
//! .unwrap();
//!
//! let compiled = CriteriaCompiler::new(&schema, "user", &options)
//!     .unwrap()
//!     .compile(&query)
//!     .unwrap();
//! assert_eq!(compiled.to_sql(), "WHERE \"user\".\"age\" > $1");
//! assert_eq!(compiled.values, vec![Value::Int(21)]);
//! ```

use sequel_core::{Options, SequelError, SequelResult};

use crate::query::criteria::{Criteria, Filter, JoinStrategy, QueryObject};
use crate::query::lookups::{pattern_comparator, Connective, CriteriaKey, Operator};
use crate::query::select::association_alias;
use crate::schema::{Schema, TableSchema};
use crate::utils::{
    escape_like_pattern, escape_string_literal, param_expression, quote_literal, render_literal,
};
use crate::value::Value;

/// `LIMIT` emitted when only `skip` is given; some engines reject a bare
/// `OFFSET`.
pub const MAX_LIMIT: u64 = 184_467_440_737_095_516;

/// The output of a criteria compile.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCriteria {
    /// Top-level predicates, to be joined with `AND`.
    pub predicates: Vec<String>,
    /// `GROUP BY`, `ORDER BY`, `LIMIT` and `OFFSET`, each with a leading space.
    pub tail: String,
    /// Bound values in placeholder order. Empty when not parameterized.
    pub values: Vec<Value>,
}

impl CompiledCriteria {
    /// The combined predicate, if any.
    pub fn predicate(&self) -> Option<String> {
        (!self.predicates.is_empty()).then(|| self.predicates.join(" AND "))
    }

    /// `WHERE <predicate>` followed by the tail clauses.
    pub fn to_sql(&self) -> String {
        match self.predicate() {
            Some(predicate) => format!("WHERE {predicate}{}", self.tail),
            None => self.tail.trim_start().to_string(),
        }
    }
}

/// Column references resolve against this table and alias.
struct Scope<'a> {
    alias: String,
    table: &'a TableSchema,
}

/// Compiles criteria trees for one table.
pub struct CriteriaCompiler<'a> {
    schema: &'a Schema,
    table: &'a TableSchema,
    options: &'a Options,
    /// Set while descending into an association filter.
    scope: Option<Scope<'a>>,
    /// Attribute to join alias, for associations joined by foreign key.
    join_aliases: Vec<(String, String)>,
    values: Vec<Value>,
    /// The next placeholder index (1-based).
    param_count: usize,
}

impl<'a> CriteriaCompiler<'a> {
    /// Creates a compiler for `table` (an identity or a table name).
    ///
    /// # Errors
    ///
    /// Returns [`SequelError::Construction`] if the schema has no such table.
    pub fn new(schema: &'a Schema, table: &str, options: &'a Options) -> SequelResult<Self> {
        Ok(Self {
            schema,
            table: schema.require(table)?,
            options,
            scope: None,
            join_aliases: Vec::new(),
            values: Vec::new(),
            param_count: 1,
        })
    }

    /// Compiles the query's criteria and its trailing clauses.
    pub fn compile(mut self, query: &QueryObject) -> SequelResult<CompiledCriteria> {
        self.join_aliases = query
            .instructions
            .iter()
            .filter(|(_, instruction)| instruction.join_strategy() == JoinStrategy::HasForeignKey)
            .filter_map(|(attribute, instruction)| {
                let spec = instruction.instructions.first()?;
                Some((attribute.clone(), association_alias(attribute, spec).to_string()))
            })
            .collect();
        let predicates = self.predicates(query.criteria())?;
        let tail = self.tail(query);
        tracing::trace!(
            table = %self.table.table_name,
            predicates = predicates.len(),
            values = self.values.len(),
            "compiled criteria"
        );
        Ok(CompiledCriteria {
            predicates,
            tail,
            values: self.values,
        })
    }

    fn predicates(&mut self, criteria: &Criteria) -> SequelResult<Vec<String>> {
        let mut out = Vec::with_capacity(criteria.len());
        for (key, filter) in criteria.iter() {
            if let Some(predicate) = self.expand(key, filter)? {
                out.push(predicate);
            }
        }
        Ok(out)
    }

    /// Expands one key. `None` means the key constrains nothing.
    fn expand(&mut self, key: &str, filter: &Filter) -> SequelResult<Option<String>> {
        match CriteriaKey::classify(key) {
            CriteriaKey::Or => self.group(filter, Connective::Any),
            CriteriaKey::And => self.group(filter, Connective::All),
            CriteriaKey::Like => self.like(filter),
            CriteriaKey::Attribute(attr) => match filter {
                Filter::Value(value) => Ok(Some(self.equality(attr, value))),
                Filter::List(items) => self.in_list(attr, items, false).map(Some),
                Filter::Object(criteria) => match self.association_target(attr, criteria)? {
                    Some(related) => self.nested(attr, related, criteria),
                    None => self.operators(attr, criteria),
                },
            },
        }
    }

    // ── Groups ───────────────────────────────────────────────────────

    fn group(&mut self, filter: &Filter, connective: Connective) -> SequelResult<Option<String>> {
        let keyword = connective.keyword();
        let Filter::List(elements) = filter else {
            return Err(SequelError::MalformedCriteria(format!(
                "`{keyword}` statements must be in an array, got {}",
                filter.kind()
            )));
        };
        if elements.is_empty() {
            return Err(SequelError::MalformedCriteria(format!(
                "`{keyword}` statements must not be empty"
            )));
        }

        let checkpoint = (self.values.len(), self.param_count);
        let mut parts = Vec::with_capacity(elements.len());
        for element in elements {
            let Filter::Object(criteria) = element else {
                return Err(SequelError::MalformedCriteria(format!(
                    "each `{keyword}` element must be an object, got {}",
                    element.kind()
                )));
            };
            let predicates = self.predicates(criteria)?;
            if predicates.is_empty() {
                if connective == Connective::Any {
                    // An empty alternative matches every row.
                    self.values.truncate(checkpoint.0);
                    self.param_count = checkpoint.1;
                    return Ok(None);
                }
                continue;
            }
            parts.push(format!("({})", predicates.join(" AND ")));
        }

        if parts.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!("({})", parts.join(connective.joiner()))))
    }

    fn like(&mut self, filter: &Filter) -> SequelResult<Option<String>> {
        let Filter::Object(patterns) = filter else {
            return Err(SequelError::MalformedCriteria(format!(
                "`like` must map attributes to patterns, got {}",
                filter.kind()
            )));
        };
        let mut parts = Vec::with_capacity(patterns.len());
        for (attr, pattern) in patterns.iter() {
            let Filter::Value(value) = pattern else {
                return Err(SequelError::MalformedCriteria(format!(
                    "`like` pattern for `{attr}` must be a scalar, got {}",
                    pattern.kind()
                )));
            };
            parts.push(self.pattern(attr, "like", Operator::Like, value)?);
        }
        Ok((!parts.is_empty()).then(|| parts.join(" AND ")))
    }

    // ── Association filters ──────────────────────────────────────────

    /// The related table when `attr` is a to-one association and the object
    /// under it is a filter on that table rather than an operator map.
    ///
    /// An operator with a scalar operand next to attribute keys is rejected:
    /// it would otherwise be read as a column of the related table.
    fn association_target(
        &self,
        attr: &str,
        criteria: &Criteria,
    ) -> SequelResult<Option<&'a TableSchema>> {
        if criteria.keys().all(Operator::is_operator_key) {
            return Ok(None);
        }
        let Some((_, def)) = self.current_table().resolve(attr) else {
            return Ok(None);
        };
        let Some(target) = def.related_table() else {
            return Ok(None);
        };
        if let Some((operator, _)) = criteria
            .iter()
            .find(|(key, filter)| Operator::is_operator_key(key) && filter.as_object().is_none())
        {
            return Err(SequelError::MalformedCriteria(format!(
                "filter on association `{attr}` mixes the operator `{operator}` with attribute keys"
            )));
        }
        self.schema.require(target).map(Some)
    }

    /// The alias association columns are referenced through: the join alias
    /// when the association is joined, else `__<attr>`.
    fn scope_alias(&self, attr: &str) -> String {
        let alias = self
            .join_aliases
            .iter()
            .find(|(attribute, _)| attribute == attr)
            .map_or(attr, |(_, alias)| alias.as_str());
        format!("__{alias}")
    }

    fn nested(
        &mut self,
        attr: &str,
        related: &'a TableSchema,
        criteria: &Criteria,
    ) -> SequelResult<Option<String>> {
        let previous = self.scope.replace(Scope {
            alias: self.scope_alias(attr),
            table: related,
        });
        let result = self.predicates(criteria);
        self.scope = previous;
        let predicates = result?;
        Ok((!predicates.is_empty()).then(|| predicates.join(" AND ")))
    }

    // ── Attribute predicates ─────────────────────────────────────────

    fn equality(&mut self, attr: &str, value: &Value) -> String {
        if value.is_null() {
            let (column, _) = self.column(attr, false);
            return format!("{column} IS NULL");
        }
        let (column, lowered) = self.column(attr, value.is_string());
        let operand = self.bind_folded(value.clone(), lowered);
        format!("{column} = {operand}")
    }

    fn in_list(&mut self, attr: &str, items: &[Filter], negate: bool) -> SequelResult<String> {
        let values = items
            .iter()
            .map(|item| match item {
                Filter::Value(value) => Ok(value.clone()),
                other => Err(SequelError::MalformedCriteria(format!(
                    "`{attr}` list entries must be scalars, got {}",
                    other.kind()
                ))),
            })
            .collect::<SequelResult<Vec<_>>>()?;

        if values.is_empty() {
            let constant = if negate { "1=1" } else { "1=0" };
            return Ok(constant.to_string());
        }

        let (column, lowered) = self.column(attr, values.iter().any(Value::is_string));
        let operands: Vec<String> = values
            .into_iter()
            .map(|value| self.bind_folded(value, lowered))
            .collect();
        let keyword = if negate { "NOT IN" } else { "IN" };
        Ok(format!("{column} {keyword} ({})", operands.join(",")))
    }

    fn operators(&mut self, attr: &str, operators: &Criteria) -> SequelResult<Option<String>> {
        let mut parts = Vec::with_capacity(operators.len());
        for (key, operand) in operators.iter() {
            let operator = Operator::parse(key)?;
            parts.push(self.operator(attr, key, operator, operand)?);
        }
        Ok((!parts.is_empty()).then(|| parts.join(" AND ")))
    }

    fn operator(
        &mut self,
        attr: &str,
        key: &str,
        operator: Operator,
        operand: &Filter,
    ) -> SequelResult<String> {
        let value = match (operator, operand) {
            (Operator::Not, Filter::List(items)) => return self.in_list(attr, items, true),
            (_, Filter::Value(value)) => value,
            (_, other) => {
                return Err(SequelError::MalformedCriteria(format!(
                    "operator `{key}` on `{attr}` expects a scalar, got {}",
                    other.kind()
                )))
            }
        };

        if operator.pattern_affixes().is_some() {
            return self.pattern(attr, key, operator, value);
        }

        if operator == Operator::Not && value.is_null() {
            let (column, _) = self.column(attr, false);
            return Ok(format!("{column} IS NOT NULL"));
        }

        let comparison = operator.comparison().unwrap_or("<>");
        let (column, lowered) = self.column(attr, value.is_string());
        let operand = self.bind_folded(value.clone(), lowered);
        Ok(format!("{column} {comparison} {operand}"))
    }

    fn pattern(
        &mut self,
        attr: &str,
        key: &str,
        operator: Operator,
        value: &Value,
    ) -> SequelResult<String> {
        let text = match value {
            Value::Null => {
                return Err(SequelError::MalformedCriteria(format!(
                    "operator `{key}` on `{attr}` needs a non-null pattern"
                )))
            }
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let (column, lowered) = self.column(attr, true);
        let text = if lowered { text.to_lowercase() } else { text };
        let comparator = pattern_comparator(lowered, self.options.folds_case());
        let (prefix, suffix) = operator.pattern_affixes().unwrap_or_default();
        let escape = operator.escapes_wildcards();

        let operand = if self.options.parameterized {
            let body = if escape { escape_like_pattern(&text) } else { text };
            self.bind(Value::String(format!("{prefix}{body}{suffix}")))
        } else {
            quote_literal(&format!(
                "{prefix}{}{suffix}",
                escape_string_literal(&text, escape)
            ))
        };
        Ok(format!("{column} {comparator} {operand}"))
    }

    // ── Values and columns ───────────────────────────────────────────

    fn current_table(&self) -> &'a TableSchema {
        self.scope.as_ref().map_or(self.table, |scope| scope.table)
    }

    /// The qualified column expression for `key`, and whether it was wrapped
    /// in `LOWER(...)`.
    ///
    /// Only string-typed schema attributes are folded, and only when the
    /// compared value is a string and the dialect folds case.
    fn column(&self, key: &str, string_operand: bool) -> (String, bool) {
        let (alias, table) = match &self.scope {
            Some(scope) => (scope.alias.as_str(), scope.table),
            None => (self.table.table_name.as_str(), self.table),
        };
        let (column, folds) = match table.resolve(key) {
            Some((attr, def)) => (def.column_name.as_deref().unwrap_or(attr), def.folds_case()),
            None => (key, false),
        };
        let lowered = string_operand && folds && self.options.folds_case();
        (
            param_expression(alias, column, lowered, self.options.escape_character),
            lowered,
        )
    }

    fn bind_folded(&mut self, value: Value, lowered: bool) -> String {
        self.bind(if lowered { value.lowercased() } else { value })
    }

    /// Emits a placeholder and records the value, or inlines a literal.
    fn bind(&mut self, value: Value) -> String {
        if self.options.parameterized {
            let placeholder = format!("${}", self.param_count);
            self.param_count += 1;
            self.values.push(value.normalize());
            placeholder
        } else {
            render_literal(&value)
        }
    }

    // ── Trailing clauses ─────────────────────────────────────────────

    fn tail(&self, query: &QueryObject) -> String {
        let mut tail = String::new();
        let alias = self.table.table_name.as_str();
        let quote = self.options.escape_character;

        if let Some(groups) = query.group_by.as_deref().filter(|g| !g.is_empty()) {
            let columns: Vec<String> = groups
                .iter()
                .map(|key| {
                    column_reference(self.table, key, self.options).unwrap_or_else(|| key.clone())
                })
                .collect();
            tail.push_str(&format!(" GROUP BY {}", columns.join(", ")));
        }

        if !query.sort.is_empty() {
            let orders: Vec<String> = query
                .sort
                .iter()
                .map(|(key, direction)| {
                    format!(
                        "{} {}",
                        param_expression(alias, self.table.column(key), false, quote),
                        direction.as_sql()
                    )
                })
                .collect();
            tail.push_str(&format!(" ORDER BY {}", orders.join(", ")));
        }

        match (query.limit, query.skip) {
            (Some(limit), _) => tail.push_str(&format!(" LIMIT {limit}")),
            (None, Some(_)) => tail.push_str(&format!(" LIMIT {MAX_LIMIT}")),
            (None, None) => {}
        }

        if let Some(skip) = query.skip {
            tail.push_str(&format!(" OFFSET {skip}"));
        }

        tail
    }
}

/// `"table"."column"` for a key the table knows, `None` for anything else.
pub fn column_reference(table: &TableSchema, key: &str, options: &Options) -> Option<String> {
    table.resolve(key).map(|_| {
        param_expression(
            &table.table_name,
            table.column(key),
            false,
            options.escape_character,
        )
    })
}
