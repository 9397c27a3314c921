//! # sequel-core
//!
//! Foundation types shared by the sequel-rs compilers: the error enum, the
//! dialect [`Options`] every compile reads, file and environment settings
//! loading, and logging setup. This crate knows nothing about criteria or SQL.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Dialect options and application settings
//! - [`settings_loader`] - TOML/JSON/environment settings loading
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{SequelError, SequelResult};
pub use settings::{NextFeatures, Options, Settings};
