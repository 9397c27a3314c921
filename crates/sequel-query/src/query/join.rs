//! Association joins and population templates.
//!
//! Associations resolved with [`JoinStrategy::HasForeignKey`] become a
//! `LEFT OUTER JOIN` in the main query. The other strategies cannot be
//! flattened: each becomes a subquery template that the caller runs once per
//! parent row, after substituting the parent's key for [`PARENT_KEY_MARKER`].

use serde::Serialize;
use sequel_core::{Options, SequelError, SequelResult};

use crate::query::compiler::CriteriaCompiler;
use crate::query::criteria::{Instruction, JoinStrategy, PopulationSpec, QueryObject, SortDirection};
use crate::query::select::{association_alias, first_stage};
use crate::schema::{Schema, TableSchema};
use crate::utils::{dialect_literal, escape_identifier, param_expression, table_reference};
use crate::value::Value;

/// Textual placeholder for the parent row's key in population templates.
pub const PARENT_KEY_MARKER: &str = "^?^";

/// A subquery template for one association.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationTemplate {
    /// The association attribute this template populates.
    pub attribute: String,
    /// The SQL, containing [`PARENT_KEY_MARKER`] exactly once.
    pub sql: String,
    /// Values for the template's own placeholders, numbered from `$1`.
    pub values: Vec<Value>,
}

impl PopulationTemplate {
    /// Replaces the marker with `parent_key` rendered as a literal of the
    /// dialect the template was built for.
    pub fn substitute(&self, parent_key: &Value, options: &Options) -> String {
        self.sql
            .replacen(PARENT_KEY_MARKER, &dialect_literal(parent_key, options), 1)
    }
}

/// Renders the `LEFT OUTER JOIN` clauses for every foreign-key association.
pub fn foreign_key_joins(
    schema: &Schema,
    options: &Options,
    instructions: &[(String, Instruction)],
) -> SequelResult<Vec<String>> {
    let quote = options.escape_character;
    instructions
        .iter()
        .filter(|(_, instruction)| instruction.join_strategy() == JoinStrategy::HasForeignKey)
        .map(|(attribute, instruction)| {
            let spec = first_stage(attribute, instruction)?;
            let parent = schema.require(&spec.parent)?;
            let child = schema.require(&spec.child)?;
            let join_alias = format!("__{}", association_alias(attribute, spec));
            Ok(format!(
                "LEFT OUTER JOIN {} AS {} ON {} = {}",
                table_reference(&child.table_name, options),
                escape_identifier(&join_alias, quote, None),
                param_expression(&parent.table_name, parent.column(&spec.parent_key), false, quote),
                param_expression(&join_alias, child.column(&spec.child_key), false, quote),
            ))
        })
        .collect()
}

/// Builds the template for a strategy 2 or 3 association.
///
/// Returns `None` for [`JoinStrategy::HasForeignKey`], which is joined
/// instead.
pub fn population_template(
    schema: &Schema,
    options: &Options,
    attribute: &str,
    instruction: &Instruction,
) -> SequelResult<Option<PopulationTemplate>> {
    let built = match instruction.join_strategy() {
        JoinStrategy::HasForeignKey => return Ok(None),
        JoinStrategy::ViaForeignKey => {
            via_foreign_key(schema, options, first_stage(attribute, instruction)?)?
        }
        JoinStrategy::ViaJunction => via_junction(schema, options, attribute, instruction)?,
    };
    let (sql, values) = built;
    tracing::trace!(attribute, sql = %sql, "built population template");
    Ok(Some(PopulationTemplate {
        attribute: attribute.to_string(),
        sql,
        values,
    }))
}

/// `(SELECT <child columns> FROM <child> WHERE <child key> = ^?^ ...)`
fn via_foreign_key(
    schema: &Schema,
    options: &Options,
    spec: &PopulationSpec,
) -> SequelResult<(String, Vec<Value>)> {
    let child = schema.require(&spec.child)?;
    let quote = options.escape_character;

    let columns = projected_columns(child, spec.select.as_deref(), options);
    let mut sql = format!(
        "(SELECT {} FROM {} AS {} WHERE {} = {PARENT_KEY_MARKER}",
        columns.join(", "),
        table_reference(&child.table_name, options),
        escape_identifier(&child.table_name, quote, None),
        param_expression(&child.table_name, child.column(&spec.child_key), false, quote),
    );

    let values = append_child_criteria(&mut sql, schema, options, child, spec)?;
    Ok((sql, values))
}

/// Two stages: parent to junction, then junction to target.
///
/// The junction's parent-side key is projected as `___<key>` so results can
/// be matched back to parent rows.
fn via_junction(
    schema: &Schema,
    options: &Options,
    attribute: &str,
    instruction: &Instruction,
) -> SequelResult<(String, Vec<Value>)> {
    let [to_junction, to_target, ..] = instruction.instructions.as_slice() else {
        return Err(SequelError::MalformedCriteria(format!(
            "junction population of `{attribute}` needs two instruction stages, got {}",
            instruction.instructions.len()
        )));
    };
    let junction = schema.require(&to_junction.child)?;
    let target = schema.require(&to_target.child)?;
    let quote = options.escape_character;

    let junction_key = junction.column(&to_junction.child_key);
    let mut columns = projected_columns(target, to_target.select.as_deref(), options);
    columns.push(format!(
        "{} AS {}",
        param_expression(&junction.table_name, junction_key, false, quote),
        escape_identifier(&format!("___{junction_key}"), quote, None)
    ));

    let mut sql = format!(
        "(SELECT {} FROM {} AS {} INNER JOIN {} AS {} ON {} = {} WHERE {} = {PARENT_KEY_MARKER}",
        columns.join(", "),
        table_reference(&target.table_name, options),
        escape_identifier(&target.table_name, quote, None),
        table_reference(&junction.table_name, options),
        escape_identifier(&junction.table_name, quote, None),
        param_expression(
            &junction.table_name,
            junction.column(&to_target.parent_key),
            false,
            quote
        ),
        param_expression(&target.table_name, target.column(&to_target.child_key), false, quote),
        param_expression(&junction.table_name, junction_key, false, quote),
    );

    let values = append_child_criteria(&mut sql, schema, options, target, to_target)?;
    Ok((sql, values))
}

fn projected_columns(
    table: &TableSchema,
    select: Option<&[String]>,
    options: &Options,
) -> Vec<String> {
    let quote = options.escape_character;
    let column = |name: &str| param_expression(&table.table_name, name, false, quote);
    match select {
        Some(keys) if !keys.is_empty() => keys
            .iter()
            .filter(|key| table.is_column(key))
            .map(|key| column(table.column(key)))
            .collect(),
        _ => table.columns().map(column).collect(),
    }
}

/// Appends the stage's criteria and tail, then closes the subquery.
///
/// Children are ordered by primary key unless the criteria sort them.
fn append_child_criteria(
    sql: &mut String,
    schema: &Schema,
    options: &Options,
    child: &TableSchema,
    spec: &PopulationSpec,
) -> SequelResult<Vec<Value>> {
    let mut criteria = spec.criteria.clone().unwrap_or_else(QueryObject::new);
    if criteria.sort.is_empty() {
        criteria
            .sort
            .push((child.primary_key().to_string(), SortDirection::Asc));
    }

    let compiled = CriteriaCompiler::new(schema, &child.table_name, options)?.compile(&criteria)?;
    if let Some(predicate) = compiled.predicate() {
        sql.push_str(" AND ");
        sql.push_str(&predicate);
    }
    sql.push_str(&compiled.tail);
    sql.push(')');
    Ok(compiled.values)
}
