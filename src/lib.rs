//! # Xplus
//!
//! A lightweight data-access layer over PostgreSQL for the `may` coroutine runtime: a
//! process-wide engine with a bounded connection pool, a fluent query builder, generic
//! CRUD and pagination helpers, and scoped transactions.
//!
//! ```no_run
//! use xplus::{crud, init_engine, EngineConfig, Page, Query, XplusError};
//!
//! xplus::entity! {
//!     #[entity(table = "repo", primary_key = id)]
//!     #[derive(Debug, Clone, Default)]
//!     pub struct Repo { pub id: i64, pub name: String, pub value: i32 }
//! }
//!
//! # fn main() -> Result<(), XplusError> {
//! let db = init_engine(EngineConfig::new("postgresql://postgres@localhost/xplus"))?;
//! let mut repo = Repo { name: "core".into(), ..Repo::default() };
//! crud::insert(db, &mut repo)?;
//!
//! let page = crud::select_page(db, Page::new(1, 20), &Query::<Repo>::new().gt("value", 0))?;
//! println!("{} of {}", page.records.len(), page.total);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod crud;
pub mod engine;
pub mod entity;
pub mod error;
pub mod executor;
mod macros;
pub mod metrics;
pub mod pool;
pub mod query;
#[cfg(test)]
mod test_support;
pub mod transaction;

pub use may_postgres;
pub use may_postgres::{Error as PostgresError, Row};
pub use sea_query;

pub use config::EngineConfig;
pub use engine::{close_engine, engine, init_engine, transaction, Engine};
pub use entity::{Entity, FromRow, Projection};
pub use error::XplusError;
pub use executor::{Executor, SqlLog};
pub use query::{Conjunction, JoinType, Order, Page, Query};
pub use transaction::{IsolationLevel, Transaction};
