//! Structured error types for dbgate-core.
//!
//! Uses `thiserror` so library consumers get composable errors. Driver
//! failures are carried through unchanged: `Database` is transparent, so its
//! message is exactly what sqlx (and the server behind it) reported.
//! The `dbgate` binary uses `anyhow` on top of this.

use thiserror::Error;

/// Main error type for dbgate-core operations
#[derive(Error, Debug)]
pub enum DataError {
    /// Configuration could not be bound or is invalid for its database kind
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// Live schema does not match the registered mappings
    #[error("Schema validation failed: {}", problems.join("; "))]
    SchemaValidation { problems: Vec<String> },

    /// Any failure reported by the driver or the database server
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// A unique-result query returned no rows
    #[error("query returned no result")]
    NoResult,

    /// A unique-result query returned more than one row
    #[error("query returned multiple results ({count} rows or more)")]
    MultipleResults { count: usize },

    /// A scalar query returned a row that is not exactly one column wide
    #[error("scalar query must return exactly one column, got {columns}")]
    ScalarShape { columns: usize },

    /// Update or delete of an entity that has no identity yet
    #[error("entity of table '{table}' has no identity (not persisted)")]
    TransientEntity { table: &'static str },

    /// Insert of an entity whose generated identity is already set
    #[error("entity of table '{table}' is already persistent with id {id}")]
    AlreadyPersistent { table: &'static str, id: String },

    /// Update or delete matched no row
    #[error("no row in table '{table}' matches id {id}")]
    StaleEntity { table: &'static str, id: String },

    /// Named placeholder without a bound value
    #[error("no value supplied for parameter ':{name}'")]
    MissingParameter { name: String },

    /// Bound value whose placeholder never appears in the SQL text
    #[error("parameter '{name}' is not used by the statement")]
    UnusedParameter { name: String },

    /// Mapping, filter or decoding problem
    #[error("Mapping error: {reason}")]
    Mapping { reason: String },
}

/// Result type alias for dbgate-core operations
pub type Result<T> = std::result::Result<T, DataError>;

impl DataError {
    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create a mapping error
    pub fn mapping(reason: impl Into<String>) -> Self {
        Self::Mapping {
            reason: reason.into(),
        }
    }

    /// Create a stale-entity error
    pub fn stale(table: &'static str, id: impl ToString) -> Self {
        Self::StaleEntity {
            table,
            id: id.to_string(),
        }
    }

    /// Whether this error came from the driver rather than from the facade
    pub fn is_database(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}
