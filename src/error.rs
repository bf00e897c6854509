//! Error types for mssql-filter.

use thiserror::Error;

use crate::ast::Operation;

/// Boxed error produced by an executor implementation.
pub type ExecutorError = Box<dyn std::error::Error + Send + Sync>;

/// The main error type for filter compilation and execution.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Failed to parse a predicate shorthand expression.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// The operation needs a descriptor field that was not supplied.
    #[error("Missing required field '{field}' for operation '{operation}'")]
    MissingField {
        operation: Operation,
        field: &'static str,
    },

    /// Scalar specification present but unusable.
    #[error("Malformed scalar specification: {0}")]
    MalformedScalar(String),

    /// Unknown operation name.
    #[error("Unsupported operation: '{0}'")]
    UnsupportedOperation(String),

    /// `OFFSET ... ROWS` requested without an `ORDER BY`.
    #[error("Skip requires a sort order (OFFSET without ORDER BY is invalid T-SQL)")]
    OffsetWithoutOrder,

    /// Invalid value.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The executor failed running a compiled query.
    #[error("Execution error: {source} (query: {query})")]
    Execution {
        query: String,
        #[source]
        source: ExecutorError,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FilterError {
    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create a missing field error.
    pub fn missing(operation: Operation, field: &'static str) -> Self {
        Self::MissingField { operation, field }
    }

    /// Wrap an executor failure with the query that caused it.
    pub fn execution(query: impl Into<String>, source: ExecutorError) -> Self {
        Self::Execution {
            query: query.into(),
            source,
        }
    }
}

/// Result type alias for mssql-filter operations.
pub type FilterResult<T> = Result<T, FilterError>;
