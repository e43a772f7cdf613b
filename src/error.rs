//! Error type shared by the executor layer and the query/CRUD façade.
//!
//! Store errors are wrapped, never rewritten: a failing statement surfaces the
//! original `may_postgres` error inside [`XplusError::Postgres`].

use may_postgres::Error as PostgresError;
use std::fmt;

/// Crate-wide error type
#[derive(Debug)]
pub enum XplusError {
    /// `PostgreSQL` error from `may_postgres`
    Postgres(PostgresError),
    /// Data source string rejected before any connection attempt
    InvalidConnectionString(String),
    /// Engine setup failed (including a panic caught during setup)
    Init(String),
    /// The process-wide engine was requested before `init_engine`
    NotInitialized,
    /// The pool has been closed
    PoolClosed,
    /// No connection became available within the acquire timeout
    PoolTimeout,
    /// Statement could not be built or its parameters could not be bound
    Query(String),
    /// Row parsing/conversion error
    Parse(String),
    /// A projection field could not be converted into the target type
    Projection {
        field: &'static str,
        message: String,
    },
    /// Refused to run a DELETE without any condition
    MissingCondition,
    /// Transaction already committed or rolled back
    TransactionClosed,
    /// Configuration could not be loaded
    Config(config::ConfigError),
}

impl fmt::Display for XplusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XplusError::Postgres(e) => write!(f, "PostgreSQL error: {e}"),
            XplusError::InvalidConnectionString(s) => {
                write!(f, "Invalid connection string: {s}")
            }
            XplusError::Init(s) => write!(f, "Engine initialization failed: {s}"),
            XplusError::NotInitialized => write!(f, "Engine is not initialized"),
            XplusError::PoolClosed => write!(f, "Connection pool is closed"),
            XplusError::PoolTimeout => {
                write!(f, "Timed out waiting for a pooled connection")
            }
            XplusError::Query(s) => write!(f, "Query error: {s}"),
            XplusError::Parse(s) => write!(f, "Parse error: {s}"),
            XplusError::Projection { field, message } => {
                write!(f, "Projection error on field `{field}`: {message}")
            }
            XplusError::MissingCondition => {
                write!(f, "Refusing to delete without a condition")
            }
            XplusError::TransactionClosed => {
                write!(f, "Transaction has already been committed or rolled back")
            }
            XplusError::Config(e) => write!(f, "Configuration error: {e}"),
        }
    }
}

impl std::error::Error for XplusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            XplusError::Postgres(e) => Some(e),
            XplusError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PostgresError> for XplusError {
    fn from(err: PostgresError) -> Self {
        XplusError::Postgres(err)
    }
}

impl From<config::ConfigError> for XplusError {
    fn from(err: config::ConfigError) -> Self {
        XplusError::Config(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = XplusError::Query("bad column".to_string());
        assert!(err.to_string().contains("Query error"));
        assert!(err.to_string().contains("bad column"));

        let err = XplusError::Parse("row".to_string());
        assert!(err.to_string().contains("Parse error"));

        assert!(XplusError::NotInitialized
            .to_string()
            .contains("not initialized"));
        assert!(XplusError::TransactionClosed
            .to_string()
            .contains("already been committed"));
    }

    #[test]
    fn test_projection_error_names_field() {
        let err = XplusError::Projection {
            field: "parent_id",
            message: "out of range integral type conversion attempted".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("`parent_id`"));
        assert!(display.contains("out of range"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: XplusError = config::ConfigError::Message("missing url".to_string()).into();
        assert!(matches!(err, XplusError::Config(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
