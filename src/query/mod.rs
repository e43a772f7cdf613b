//! Fluent query building and execution.
//!
//! - **Builder**: [`Query`], the predicate/shape builder (`builder.rs`)
//! - **Execution**: terminal operations such as `find`, `one` and `count` (`execution.rs`)
//! - **Page**: pagination request/result (`page.rs`)
//! - **Value Conversion**: SeaQuery `Value` to `ToSql` parameters
//!
//! ```no_run
//! use xplus::{engine, Query, XplusError};
//! # xplus::entity! {
//! #     #[entity(table = "repo", primary_key = id)]
//! #     #[derive(Debug, Clone, Default)]
//! #     pub struct Repo { pub id: i64, pub name: String, pub parent_id: Option<i64> }
//! # }
//!
//! # fn main() -> Result<(), XplusError> {
//! let db = engine()?;
//! let repos = Query::<Repo>::new()
//!     .like_right("name", "core")
//!     .or(|q| q.is_null("parent_id"))
//!     .desc("id")
//!     .limit(10)
//!     .find(db)?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod execution;
mod page;
pub mod value_conversion;

pub(crate) use builder::col;
pub use builder::Query;
pub use page::{Page, DEFAULT_PAGE_SIZE};
pub use sea_query::{JoinType, Order};

/// How the pairs given to [`Query::all_eq`] are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Conjunction {
    #[default]
    And,
    Or,
}
