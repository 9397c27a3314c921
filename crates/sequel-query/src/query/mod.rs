//! Query objects and the compilers that turn them into SQL.
//!
//! - [`criteria`]: the query object model, deserialized from JSON
//! - [`lookups`]: criteria key and operator classification
//! - [`compiler`]: `WHERE` predicates and trailing clauses
//! - [`select`]: projections and the `FROM` clause
//! - [`join`]: association joins and population templates

pub mod compiler;
pub mod criteria;
pub mod join;
pub mod lookups;
pub mod select;

pub use compiler::{CompiledCriteria, CriteriaCompiler};
pub use criteria::{
    Criteria, Filter, Instruction, JoinStrategy, PopulationSpec, QueryObject, SortDirection,
    StrategySpec,
};
pub use join::{PopulationTemplate, PARENT_KEY_MARKER};
pub use select::SelectCompiler;
