//! `Executor` trait: the seam between the query façade and `may_postgres`.
//!
//! Query building, CRUD helpers and transactions are all written against this trait, so
//! they work the same on a pooled connection, on the engine itself (one checkout per
//! statement) or inside a [`Transaction`](crate::transaction::Transaction).

use crate::connection::PooledConnection;
use crate::error::XplusError;
use crate::query::value_conversion::with_converted_params;
use may_postgres::types::ToSql;
use may_postgres::{Client, Error as PostgresError, Row};
use sea_query::Values;
use std::time::Instant;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Trait for executing database operations
///
/// ```no_run
/// use xplus::{engine, Executor, XplusError};
///
/// # fn main() -> Result<(), XplusError> {
/// let db = engine()?;
/// let affected = db.execute("DELETE FROM users WHERE id = $1", &[&42i64])?;
/// let row = db.query_one("SELECT COUNT(*) FROM users", &[])?;
/// let count: i64 = row.get(0);
/// # Ok(())
/// # }
/// ```
pub trait Executor {
    /// Execute a statement and return the number of rows affected.
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, XplusError>;

    /// Execute a query that must return exactly one row.
    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, XplusError>;

    /// Execute a query and return all rows.
    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, XplusError>;
}

impl<X: Executor + ?Sized> Executor for &X {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, XplusError> {
        (**self).execute(query, params)
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, XplusError> {
        (**self).query_one(query, params)
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, XplusError> {
        (**self).query_all(query, params)
    }
}

/// SQL echo settings applied to every statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqlLog {
    pub show_sql: bool,
    pub show_exec_time: bool,
}

impl SqlLog {
    /// Run one statement with tracing, metrics and SQL echo around it.
    ///
    /// Driver errors are wrapped in `XplusError::Postgres` and otherwise left untouched.
    pub fn observe<R>(
        &self,
        sql: &str,
        run: impl FnOnce() -> Result<R, PostgresError>,
    ) -> Result<R, XplusError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(sql).entered();

        let start = Instant::now();
        let result = run();
        let elapsed = start.elapsed();

        #[cfg(feature = "metrics")]
        {
            METRICS.record_query_duration(elapsed);
            if result.is_err() {
                METRICS.record_query_error();
            }
        }

        match (self.show_sql, self.show_exec_time) {
            (true, true) => log::info!(target: "xplus::sql", "[SQL] {sql} - took: {elapsed:?}"),
            (true, false) => log::info!(target: "xplus::sql", "[SQL] {sql}"),
            _ => log::trace!(target: "xplus::sql", "[SQL] {sql}"),
        }

        result.map_err(|e| {
            log::debug!(target: "xplus::sql", "statement failed: {e}");
            XplusError::Postgres(e)
        })
    }
}

impl Executor for PooledConnection<'_> {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, XplusError> {
        let client: &Client = self;
        self.pool()
            .factory()
            .sql_log()
            .observe(query, || client.execute(query, params))
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, XplusError> {
        let client: &Client = self;
        self.pool()
            .factory()
            .sql_log()
            .observe(query, || client.query_one(query, params))
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, XplusError> {
        let client: &Client = self;
        self.pool()
            .factory()
            .sql_log()
            .observe(query, || client.query(query, params))
    }
}

/// Run a built statement (`(sql, values)` from SeaQuery) through `execute`.
pub fn execute_built<X: Executor + ?Sized>(
    executor: &X,
    sql: &str,
    values: &Values,
) -> Result<u64, XplusError> {
    with_converted_params(values, |params| executor.execute(sql, params))
}

/// Run a built statement through `query_one`.
pub fn query_one_built<X: Executor + ?Sized>(
    executor: &X,
    sql: &str,
    values: &Values,
) -> Result<Row, XplusError> {
    with_converted_params(values, |params| executor.query_one(sql, params))
}

/// Run a built statement through `query_all`.
pub fn query_all_built<X: Executor + ?Sized>(
    executor: &X,
    sql: &str,
    values: &Values,
) -> Result<Vec<Row>, XplusError> {
    with_converted_params(values, |params| executor.query_all(sql, params))
}
