//! # sequel-query
//!
//! Compiles query objects into dialect-specific SQL. A query object is a
//! JSON-shaped description of a read (criteria, projection, sort, paging,
//! aggregates and association population); a [`Schema`](schema::Schema)
//! describes the tables it runs against.
//!
//! ## Architecture
//!
//! [`Sequel`](sequel::Sequel) is the entry point. For each statement it
//! builds fresh compilers over the shared, read-only schema and
//! [`Options`](sequel_core::Options):
//!
//! - [`SelectCompiler`](query::SelectCompiler) renders `SELECT ... FROM ...`
//! - [`CriteriaCompiler`](query::CriteriaCompiler) renders predicates, the
//!   bound values and the trailing `GROUP BY`/`ORDER BY`/`LIMIT`/`OFFSET`
//! - [`query::join`] renders foreign-key joins and per-parent population
//!   templates
//!
//! Nothing here touches a database; the output is SQL text plus values.
//!
//! ## Module Overview
//!
//! - [`value`] - The [`Value`](value::Value) enum bound to placeholders
//! - [`schema`] - Table and attribute descriptors
//! - [`utils`] - Identifier and literal escaping
//! - [`query`] - The query object model and the compilers
//! - [`sequel`] - The orchestrator

// These clippy lints are intentionally allowed for the compiler crate:
// - format_push_string: format! with push_str is clearer than write! for SQL generation
// - doc_markdown: backtick requirements for documentation items are too strict
// - return_self_not_must_use: builder pattern methods are self-documenting
// - too_many_lines: criteria expansion is a single large match
#![allow(clippy::format_push_string)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::result_large_err)]

pub mod query;
pub mod schema;
pub mod sequel;
pub mod utils;
pub mod value;

// Re-export the most commonly used types at the crate root.
pub use query::{
    CompiledCriteria, Criteria, CriteriaCompiler, Filter, Instruction, JoinStrategy,
    PopulationSpec, PopulationTemplate, QueryObject, SelectCompiler, SortDirection,
    PARENT_KEY_MARKER,
};
pub use schema::{AttributeDef, AttributeType, Schema, TableSchema};
pub use sequel::{FindQuery, InsertQuery, SelectQuery, Sequel};
pub use value::Value;
