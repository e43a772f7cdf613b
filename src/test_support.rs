//! Test doubles shared by the unit tests.

use crate::error::XplusError;
use crate::executor::Executor;
use may_postgres::types::ToSql;
use may_postgres::Row;
use std::sync::{Arc, Mutex};

/// Mock executor that captures SQL and parameter counts for verification.
///
/// `query_all` returns no rows and `query_one` fails, since `Row` cannot be built
/// without a server. `fail_on` makes any statement containing the given text fail.
#[derive(Default)]
pub(crate) struct MockExecutor {
    captured_sql: Arc<Mutex<Vec<String>>>,
    captured_param_counts: Arc<Mutex<Vec<usize>>>,
    rows_affected: u64,
    fail_on: Option<String>,
}

impl MockExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_rows_affected(mut self, rows: u64) -> Self {
        self.rows_affected = rows;
        self
    }

    pub(crate) fn failing_on(mut self, fragment: &str) -> Self {
        self.fail_on = Some(fragment.to_string());
        self
    }

    pub(crate) fn get_captured_sql(&self) -> Vec<String> {
        self.captured_sql.lock().unwrap().clone()
    }

    pub(crate) fn get_captured_param_counts(&self) -> Vec<usize> {
        self.captured_param_counts.lock().unwrap().clone()
    }

    fn capture(&self, query: &str, params: &[&dyn ToSql]) -> Result<(), XplusError> {
        self.captured_sql.lock().unwrap().push(query.to_string());
        self.captured_param_counts.lock().unwrap().push(params.len());
        match &self.fail_on {
            Some(fragment) if query.contains(fragment.as_str()) => {
                Err(XplusError::Query(format!("MockExecutor: failing on `{fragment}`")))
            }
            _ => Ok(()),
        }
    }
}

impl Executor for MockExecutor {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, XplusError> {
        self.capture(query, params)?;
        Ok(self.rows_affected)
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, XplusError> {
        self.capture(query, params)?;
        Err(XplusError::Query(
            "MockExecutor: No rows available for testing".to_string(),
        ))
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, XplusError> {
        self.capture(query, params)?;
        Ok(vec![])
    }
}
