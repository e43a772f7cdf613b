//! Terminal operations for [`Query`].
//!
//! Each one builds a statement from the accumulated state, binds its values through
//! `with_converted_params` and hands it to an [`Executor`]. The builder itself is only
//! borrowed, so a query can be counted and then fetched without rebuilding it.

use super::Query;
use crate::entity::{parse_row, project_all, Entity, FromRow, Projection};
use crate::error::XplusError;
use crate::executor::{query_all_built, query_one_built, Executor};
use may_postgres::Row;
use sea_query::{PostgresQueryBuilder, SelectStatement};

fn scalar<X, V>(executor: &X, stmt: SelectStatement) -> Result<V, XplusError>
where
    X: Executor + ?Sized,
    V: for<'a> may_postgres::types::FromSql<'a>,
{
    let (sql, values) = stmt.build(PostgresQueryBuilder);
    let row: Row = query_one_built(executor, &sql, &values)?;
    row.try_get(0)
        .map_err(|e| XplusError::Parse(format!("Failed to read scalar result: {e}")))
}

impl<T> Query<T> {
    /// Execute the query and return all rows as `T`.
    pub fn find<X: Executor + ?Sized>(&self, executor: &X) -> Result<Vec<T>, XplusError>
    where
        T: FromRow,
    {
        let (sql, values) = self.build();
        let rows = query_all_built(executor, &sql, &values)?;
        rows.iter().map(parse_row).collect()
    }

    /// Execute the query with `LIMIT 1`; `None` when nothing matches.
    pub fn one<X: Executor + ?Sized>(&self, executor: &X) -> Result<Option<T>, XplusError>
    where
        T: FromRow,
    {
        let (sql, values) = self.clone().limit(1).build();
        let rows = query_all_built(executor, &sql, &values)?;
        rows.first().map(parse_row).transpose()
    }

    /// Number of matching rows (or groups, with `group_by`), ignoring order and paging.
    pub fn count<X: Executor + ?Sized>(&self, executor: &X) -> Result<i64, XplusError> {
        scalar(executor, self.count_statement())
    }

    pub fn exist<X: Executor + ?Sized>(&self, executor: &X) -> Result<bool, XplusError> {
        scalar(executor, self.exist_statement())
    }

    /// Sum of `column` over the matching rows, 0 when none match.
    pub fn sum<X: Executor + ?Sized>(&self, executor: &X, column: &str) -> Result<f64, XplusError> {
        scalar(executor, self.sum_statement(column, "DOUBLE PRECISION"))
    }

    pub fn sum_int<X: Executor + ?Sized>(
        &self,
        executor: &X,
        column: &str,
    ) -> Result<i64, XplusError> {
        scalar(executor, self.sum_statement(column, "BIGINT"))
    }
}

impl<T: Entity> Query<T> {
    /// Fetch as `T`, then project every row into `R`. Fails on the first row that does not
    /// convert.
    pub fn find_as<R, X>(&self, executor: &X) -> Result<Vec<R>, XplusError>
    where
        R: Projection<T>,
        X: Executor + ?Sized,
    {
        project_all(self.find(executor)?)
    }

    pub fn one_as<R, X>(&self, executor: &X) -> Result<Option<R>, XplusError>
    where
        R: Projection<T>,
        X: Executor + ?Sized,
    {
        self.one(executor)?.map(R::project).transpose()
    }
}
