//! The engine: a configured connection pool, plus the process-wide instance.
//!
//! Call [`init_engine`] once at startup, reach the instance with [`engine`] and shut it down
//! with [`close_engine`]. An [`Engine`] can also be built and passed around explicitly with
//! [`Engine::connect`]; everything in the crate takes an [`Executor`], not the global.

use crate::config::EngineConfig;
use crate::connection::{PooledConnection, PostgresConnector};
use crate::error::XplusError;
use crate::executor::{Executor, SqlLog};
use crate::pool::{Pool, PoolOptions, PoolStats};
use crate::transaction::{self, IsolationLevel, Transaction};
use may_postgres::types::ToSql;
use may_postgres::Row;
use once_cell::sync::OnceCell;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

static ENGINE: OnceCell<Engine> = OnceCell::new();

pub struct Engine {
    pool: Pool<PostgresConnector>,
    config: EngineConfig,
}

impl Engine {
    /// Validate the data source, build the pool and open one connection eagerly so that
    /// connectivity problems surface here rather than on the first query.
    pub fn connect(config: EngineConfig) -> Result<Self, XplusError> {
        log::set_max_level(config.log_level_filter());

        let sql_log = SqlLog {
            show_sql: config.show_sql,
            show_exec_time: config.show_exec_time,
        };
        let connector = PostgresConnector::new(config.url.clone(), sql_log)?;
        let pool = Pool::new(
            connector,
            PoolOptions {
                max_idle: config.max_idle_conns,
                max_open: config.max_open_conns,
                max_lifetime: config.conn_max_lifetime(),
                acquire_timeout: config.acquire_timeout(),
            },
        );

        drop(pool.acquire()?);
        log::info!(
            "engine ready (max_idle_conns={}, max_open_conns={}, conn_max_lifetime={:?})",
            config.max_idle_conns,
            config.max_open_conns,
            config.conn_max_lifetime()
        );

        Ok(Self { pool, config })
    }

    /// Check a connection out of the pool.
    pub fn acquire(&self) -> Result<PooledConnection<'_>, XplusError> {
        self.pool.acquire()
    }

    /// Release idle connections and refuse further checkouts.
    pub fn close(&self) {
        self.pool.close();
        log::info!("engine closed");
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `f` in a transaction on one pooled connection.
    ///
    /// ```no_run
    /// use xplus::{engine, Executor, XplusError};
    ///
    /// # fn main() -> Result<(), XplusError> {
    /// engine()?.transaction(|tx| {
    ///     tx.execute("UPDATE accounts SET balance = balance - 10 WHERE id = $1", &[&1i64])?;
    ///     tx.execute("UPDATE accounts SET balance = balance + 10 WHERE id = $1", &[&2i64])?;
    ///     Ok::<_, XplusError>(())
    /// })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn transaction<'e, F, R, E>(&'e self, f: F) -> Result<R, E>
    where
        F: FnOnce(&Transaction<PooledConnection<'e>>) -> Result<R, E>,
        E: From<XplusError>,
    {
        transaction::run(self.acquire()?, None, f)
    }

    pub fn transaction_with_isolation<'e, F, R, E>(
        &'e self,
        level: IsolationLevel,
        f: F,
    ) -> Result<R, E>
    where
        F: FnOnce(&Transaction<PooledConnection<'e>>) -> Result<R, E>,
        E: From<XplusError>,
    {
        transaction::run(self.acquire()?, Some(level), f)
    }
}

impl Executor for Engine {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, XplusError> {
        self.acquire()?.execute(query, params)
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, XplusError> {
        self.acquire()?.query_one(query, params)
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, XplusError> {
        self.acquire()?.query_all(query, params)
    }
}

/// Initialize the process-wide engine.
///
/// Runs at most once: after a success, later calls return the stored engine and ignore
/// their `config`. A failure (including a panic during setup) stores nothing and is
/// returned as `XplusError::Init`; calling again retries.
pub fn init_engine(config: EngineConfig) -> Result<&'static Engine, XplusError> {
    guarded_init(&ENGINE, move || Engine::connect(config))
}

/// The process-wide engine, or `XplusError::NotInitialized`.
pub fn engine() -> Result<&'static Engine, XplusError> {
    ENGINE.get().ok_or(XplusError::NotInitialized)
}

/// Close the process-wide engine's pool. A no-op when it was never initialized.
pub fn close_engine() {
    if let Some(engine) = ENGINE.get() {
        engine.close();
    }
}

/// Run `f` in a transaction on the process-wide engine.
pub fn transaction<F, R, E>(f: F) -> Result<R, E>
where
    F: FnOnce(&Transaction<PooledConnection<'static>>) -> Result<R, E>,
    E: From<XplusError>,
{
    engine()?.transaction(f)
}

fn guarded_init<T>(
    cell: &OnceCell<T>,
    init: impl FnOnce() -> Result<T, XplusError>,
) -> Result<&T, XplusError> {
    cell.get_or_try_init(|| match panic::catch_unwind(AssertUnwindSafe(init)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(XplusError::Init(msg))) => Err(XplusError::Init(msg)),
        Ok(Err(e)) => {
            log::error!("engine initialization failed: {e}");
            Err(XplusError::Init(e.to_string()))
        }
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            log::error!("engine initialization panicked: {msg}");
            Err(XplusError::Init(format!("panic: {msg}")))
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarded_init_converts_panic() {
        let cell: OnceCell<u32> = OnceCell::new();
        let err = guarded_init(&cell, || panic!("driver registration exploded")).unwrap_err();
        match err {
            XplusError::Init(msg) => {
                assert!(msg.starts_with("panic: "));
                assert!(msg.contains("driver registration exploded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(cell.get().is_none());
    }

    #[test]
    fn test_guarded_init_wraps_errors_and_allows_retry() {
        let cell: OnceCell<u32> = OnceCell::new();
        let err = guarded_init(&cell, || {
            Err(XplusError::InvalidConnectionString("empty".to_string()))
        })
        .unwrap_err();
        assert!(matches!(err, XplusError::Init(ref m) if m.contains("Invalid connection string")));

        assert_eq!(*guarded_init(&cell, || Ok(7)).unwrap(), 7);
    }

    #[test]
    fn test_guarded_init_runs_once() {
        let cell: OnceCell<u32> = OnceCell::new();
        assert_eq!(*guarded_init(&cell, || Ok(1)).unwrap(), 1);
        let second = guarded_init(&cell, || panic!("must not run")).unwrap();
        assert_eq!(*second, 1);
    }

    #[test]
    fn test_connect_rejects_invalid_dsn_before_connecting() {
        let err = Engine::connect(EngineConfig::new("not a dsn")).err().unwrap();
        assert!(matches!(err, XplusError::InvalidConnectionString(_)));
    }

    #[test]
    fn test_panic_message_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(3u8);
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }
}
