//! Core error types for sequel-rs.
//!
//! This module provides the [`SequelError`] enum shared by every compiler in
//! the workspace. Compilation never recovers from an error internally: each
//! variant propagates straight to the caller, and a failed compile yields no
//! partial SQL.

use thiserror::Error;

/// The primary error type for sequel-rs.
///
/// Criteria errors carry enough structure for callers to react to them
/// programmatically (see [`SequelError::operator`]), while configuration and
/// IO errors cover settings loading.
#[derive(Error, Debug)]
pub enum SequelError {
    // ── Compilation ──────────────────────────────────────────────────

    /// A compiler was constructed against a table the schema does not know.
    #[error("Incorrect usage of the criteria compiler: {0}")]
    Construction(String),

    /// The criteria tree has the wrong shape (e.g. an `or` that is not an array).
    #[error("Malformed criteria: {0}")]
    MalformedCriteria(String),

    /// An operator key inside an attribute filter is not recognized.
    #[error(
        "Unknown filtering operator: \"{operator}\". Should be 'startsWith', '>', 'contains' or similar"
    )]
    UnknownOperator {
        /// The offending operator key, verbatim.
        operator: String,
    },

    /// `groupBy` was supplied without any calculation to project.
    #[error("Cannot groupBy without a calculation: expected one of sum, average, min or max")]
    MissingCalculation,

    /// A calculation was supplied without a `groupBy`.
    #[error("Cannot use the `{function}` calculation without a groupBy")]
    MissingGroupBy {
        /// The calculation key (`sum`, `average`, `min` or `max`).
        function: &'static str,
    },

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SequelError {
    /// Creates a [`SequelError::UnknownOperator`] for the given key.
    pub fn unknown_operator(operator: impl Into<String>) -> Self {
        Self::UnknownOperator {
            operator: operator.into(),
        }
    }

    /// Returns the offending operator for [`SequelError::UnknownOperator`].
    pub fn operator(&self) -> Option<&str> {
        match self {
            Self::UnknownOperator { operator } => Some(operator),
            _ => None,
        }
    }

    /// Returns `true` if the error was caused by the shape of a query object
    /// rather than by configuration or IO.
    pub const fn is_criteria_error(&self) -> bool {
        matches!(
            self,
            Self::Construction(_)
                | Self::MalformedCriteria(_)
                | Self::UnknownOperator { .. }
                | Self::MissingCalculation
                | Self::MissingGroupBy { .. }
        )
    }
}

/// A convenience type alias for `Result<T, SequelError>`.
pub type SequelResult<T> = Result<T, SequelError>;
