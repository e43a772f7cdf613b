//! Transactions over a single connection.
//!
//! [`Transaction`] pins one executor (normally a pooled connection) for its whole life and
//! rolls back on drop if neither `commit` nor `rollback` ran, so the connection goes back
//! to the pool clean on every exit path. [`run`] is the closure form used by
//! [`Engine::transaction`](crate::Engine::transaction).

use crate::error::XplusError;
use crate::executor::Executor;
use may_postgres::types::ToSql;
use may_postgres::Row;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    /// Read uncommitted (PostgreSQL treats it as ReadCommitted)
    ReadUncommitted,
    /// Read committed (server default)
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    fn to_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

fn begin_sql(isolation: Option<IsolationLevel>) -> String {
    match isolation {
        Some(level) => format!("BEGIN ISOLATION LEVEL {}", level.to_sql()),
        None => "BEGIN".to_string(),
    }
}

/// An open database transaction.
///
/// ```no_run
/// use xplus::{engine, Executor, XplusError};
/// use xplus::transaction::Transaction;
///
/// # fn main() -> Result<(), XplusError> {
/// let db = engine()?;
/// let tx = Transaction::begin(db.acquire()?)?;
/// tx.execute("INSERT INTO users (name) VALUES ($1)", &[&"Alice"])?;
/// tx.commit()?;
/// # Ok(())
/// # }
/// ```
pub struct Transaction<C: Executor> {
    conn: C,
    closed: bool,
}

impl<C: Executor> Transaction<C> {
    /// Start a transaction with the server's default isolation level.
    pub fn begin(conn: C) -> Result<Self, XplusError> {
        Self::start(conn, None)
    }

    pub fn begin_with_isolation(conn: C, level: IsolationLevel) -> Result<Self, XplusError> {
        Self::start(conn, Some(level))
    }

    fn start(conn: C, isolation: Option<IsolationLevel>) -> Result<Self, XplusError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::begin_transaction_span().entered();

        conn.execute(&begin_sql(isolation), &[])?;
        log::debug!("transaction started");
        Ok(Self {
            conn,
            closed: false,
        })
    }

    /// Commit the transaction. A failed commit leaves the transaction open, so it is
    /// rolled back when dropped.
    pub fn commit(mut self) -> Result<(), XplusError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::commit_transaction_span().entered();

        self.conn.execute("COMMIT", &[])?;
        self.closed = true;
        log::debug!("transaction committed");
        Ok(())
    }

    pub fn rollback(mut self) -> Result<(), XplusError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::rollback_transaction_span().entered();

        self.closed = true;
        self.conn.execute("ROLLBACK", &[])?;
        log::debug!("transaction rolled back");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), XplusError> {
        if self.closed {
            return Err(XplusError::TransactionClosed);
        }
        Ok(())
    }
}

impl<C: Executor> Drop for Transaction<C> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.conn.execute("ROLLBACK", &[]) {
            log::warn!("rollback of abandoned transaction failed: {e}");
        } else {
            log::debug!("abandoned transaction rolled back");
        }
    }
}

impl<C: Executor> Executor for Transaction<C> {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, XplusError> {
        self.ensure_open()?;
        self.conn.execute(query, params)
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, XplusError> {
        self.ensure_open()?;
        self.conn.query_one(query, params)
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, XplusError> {
        self.ensure_open()?;
        self.conn.query_all(query, params)
    }
}

/// Run `f` inside a transaction on `conn`.
///
/// If `f` fails the transaction is rolled back and `f`'s error is returned as is; a
/// rollback failure is only logged. If `f` succeeds the transaction is committed and a
/// commit failure is returned.
pub fn run<C, F, R, E>(conn: C, isolation: Option<IsolationLevel>, f: F) -> Result<R, E>
where
    C: Executor,
    F: FnOnce(&Transaction<C>) -> Result<R, E>,
    E: From<XplusError>,
{
    let tx = Transaction::start(conn, isolation)?;
    match f(&tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback() {
                log::warn!("rollback failed, keeping the original error: {rollback_err}");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockExecutor;

    #[derive(Debug, PartialEq)]
    enum AppError {
        Db(String),
        Business(&'static str),
    }

    impl From<XplusError> for AppError {
        fn from(e: XplusError) -> Self {
            AppError::Db(e.to_string())
        }
    }

    #[test]
    fn test_isolation_level_to_sql() {
        assert_eq!(IsolationLevel::ReadUncommitted.to_sql(), "READ UNCOMMITTED");
        assert_eq!(IsolationLevel::ReadCommitted.to_sql(), "READ COMMITTED");
        assert_eq!(IsolationLevel::RepeatableRead.to_sql(), "REPEATABLE READ");
        assert_eq!(IsolationLevel::Serializable.to_sql(), "SERIALIZABLE");
    }

    #[test]
    fn test_begin_carries_isolation_level() {
        assert_eq!(begin_sql(None), "BEGIN");
        assert_eq!(
            begin_sql(Some(IsolationLevel::Serializable)),
            "BEGIN ISOLATION LEVEL SERIALIZABLE"
        );
    }

    #[test]
    fn test_run_commits_on_success() {
        let executor = MockExecutor::new();
        let value = run(&executor, None, |tx| {
            tx.execute("UPDATE accounts SET balance = balance - 1", &[])?;
            Ok::<_, XplusError>(5)
        })
        .unwrap();

        assert_eq!(value, 5);
        assert_eq!(
            executor.get_captured_sql(),
            vec!["BEGIN", "UPDATE accounts SET balance = balance - 1", "COMMIT"]
        );
    }

    #[test]
    fn test_run_rolls_back_and_returns_same_error() {
        let executor = MockExecutor::new();
        let result: Result<(), AppError> = run(&executor, None, |tx| {
            tx.execute("DELETE FROM accounts", &[])?;
            Err(AppError::Business("insufficient funds"))
        });

        assert_eq!(result, Err(AppError::Business("insufficient funds")));
        assert_eq!(
            executor.get_captured_sql(),
            vec!["BEGIN", "DELETE FROM accounts", "ROLLBACK"]
        );
    }

    #[test]
    fn test_rollback_failure_is_swallowed() {
        let executor = MockExecutor::new().failing_on("ROLLBACK");
        let result: Result<(), AppError> =
            run(&executor, None, |_| Err(AppError::Business("boom")));
        assert_eq!(result, Err(AppError::Business("boom")));
        // explicit rollback only, no second attempt on drop
        let sql = executor.get_captured_sql();
        assert_eq!(sql.iter().filter(|s| *s == "ROLLBACK").count(), 1);
    }

    #[test]
    fn test_commit_failure_is_surfaced_and_rolled_back() {
        let executor = MockExecutor::new().failing_on("COMMIT");
        let result = run(&executor, None, |_| Ok::<_, XplusError>(()));
        assert!(matches!(result, Err(XplusError::Query(_))));
        assert_eq!(executor.get_captured_sql(), vec!["BEGIN", "COMMIT", "ROLLBACK"]);
    }

    #[test]
    fn test_begin_failure_skips_closure() {
        let executor = MockExecutor::new().failing_on("BEGIN");
        let mut called = false;
        let result = run(&executor, Some(IsolationLevel::RepeatableRead), |_| {
            called = true;
            Ok::<_, XplusError>(())
        });
        assert!(result.is_err());
        assert!(!called);
        assert_eq!(
            executor.get_captured_sql(),
            vec!["BEGIN ISOLATION LEVEL REPEATABLE READ"]
        );
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let executor = MockExecutor::new();
        {
            let tx = Transaction::begin(&executor).unwrap();
            tx.execute("INSERT INTO t VALUES (1)", &[]).unwrap();
            assert!(!tx.is_closed());
        }
        assert_eq!(
            executor.get_captured_sql(),
            vec!["BEGIN", "INSERT INTO t VALUES (1)", "ROLLBACK"]
        );
    }
}
