//! # sequel-rs
//!
//! Compiles declarative query criteria into dialect-specific SQL.
//!
//! This is the meta-crate that re-exports the sub-crates for convenient
//! access. Depend on `sequel-rs` to get everything, or on the individual
//! crates for finer-grained control.
//!
//! # Examples
//!
//! ```
//! use sequel_rs::prelude::*;
//!
//! let schema = Schema::new().with_table(
//!     "pet",
//!     TableSchema::new("pet")
//!         .attribute("id", AttributeDef::new(AttributeType::Integer).primary_key())
//!         .attribute("name", AttributeDef::new(AttributeType::String)),
//! );
//! let sequel = Sequel::new(schema, Options::mysql());
//!
//! let find = sequel
//!     .find("pet", &QueryObject::new().filter(Criteria::new().with("id", vec![1, 2])))
//!     .unwrap();
//! assert_eq!(
//!     find.query,
//!     "SELECT `pet`.`id`, `pet`.`name` FROM `pet` AS `pet`  WHERE `pet`.`id` IN (1,2) "
//! );
//! ```

/// Errors, dialect options, settings loading, and logging.
pub use sequel_core as core;

/// Values, schema descriptors, and the query compilers.
pub use sequel_query as query;

/// The types most programs need.
pub mod prelude {
    pub use sequel_core::{Options, SequelError, SequelResult, Settings};
    pub use sequel_query::{
        AttributeDef, AttributeType, Criteria, Filter, FindQuery, InsertQuery, QueryObject,
        Schema, SelectQuery, Sequel, SortDirection, TableSchema, Value,
    };
}
