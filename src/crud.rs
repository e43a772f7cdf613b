//! Generic CRUD and pagination helpers.
//!
//! All helpers take any [`Executor`]: the engine, a pooled connection or an open
//! transaction. Affected-row counts and store errors are returned as the driver reports them.

use crate::entity::{parse_row, project_all, Entity, Projection};
use crate::error::XplusError;
use crate::executor::{execute_built, query_all_built, Executor};
use crate::query::{col, Page, Query};
use sea_query::{
    Condition, DeleteStatement, DynIden, Expr, ExprTrait, InsertStatement, PostgresQueryBuilder,
    UpdateStatement, Value,
};

fn table<T: Entity>() -> DynIden {
    DynIden::from(T::table_name())
}

fn pk_condition<T: Entity>(id: Value) -> Condition {
    Condition::all().add(col(T::primary_key()).eq(Expr::val(id)))
}

/// Columns written by an insert: everything except an auto-increment primary key.
fn insert_row<T: Entity>(entity: &T) -> (Vec<DynIden>, Vec<Expr>) {
    let skip_pk = T::auto_increment();
    T::columns()
        .iter()
        .zip(entity.values())
        .filter(|(column, _)| !(skip_pk && **column == T::primary_key()))
        .map(|(column, value)| (DynIden::from(*column), Expr::val(value)))
        .unzip()
}

/// `(column, value)` pairs for `columns`, or for every non-key column when it is empty.
fn assignments<T: Entity, S: AsRef<str>>(
    entity: &T,
    columns: &[S],
) -> Result<Vec<(&'static str, Value)>, XplusError> {
    let all: Vec<(&'static str, Value)> = T::columns().iter().copied().zip(entity.values()).collect();
    if columns.is_empty() {
        return Ok(all
            .into_iter()
            .filter(|(column, _)| *column != T::primary_key())
            .collect());
    }
    columns
        .iter()
        .map(|wanted| {
            let wanted = wanted.as_ref();
            all.iter()
                .find(|(column, _)| *column == wanted)
                .cloned()
                .ok_or_else(|| {
                    XplusError::Query(format!(
                        "unknown column `{wanted}` for table `{}`",
                        T::table_name()
                    ))
                })
        })
        .collect()
}

fn run_update<X: Executor + ?Sized>(executor: &X, stmt: &UpdateStatement) -> Result<u64, XplusError> {
    let (sql, values) = stmt.build(PostgresQueryBuilder);
    execute_built(executor, &sql, &values)
}

fn run_delete<X: Executor + ?Sized>(executor: &X, stmt: &DeleteStatement) -> Result<u64, XplusError> {
    let (sql, values) = stmt.build(PostgresQueryBuilder);
    execute_built(executor, &sql, &values)
}

fn insert_statement<T: Entity>(entities: &[T]) -> Result<InsertStatement, XplusError> {
    let mut stmt = InsertStatement::new();
    stmt.into_table(table::<T>());
    let mut columns_set = false;
    for entity in entities {
        let (columns, values) = insert_row(entity);
        if columns.is_empty() {
            stmt.or_default_values();
            continue;
        }
        if !columns_set {
            stmt.columns(columns);
            columns_set = true;
        }
        stmt.values(values)
            .map_err(|e| XplusError::Query(e.to_string()))?;
    }
    stmt.returning_all();
    Ok(stmt)
}

/// Insert one entity and refresh it from `RETURNING *`, so it carries the generated key.
pub fn insert<T, X>(executor: &X, entity: &mut T) -> Result<u64, XplusError>
where
    T: Entity,
    X: Executor + ?Sized,
{
    let (sql, values) = insert_statement(std::slice::from_ref(entity))?.build(PostgresQueryBuilder);
    let rows = query_all_built(executor, &sql, &values)?;
    if let Some(row) = rows.first() {
        *entity = parse_row(row)?;
    }
    Ok(rows.len() as u64)
}

/// Insert all entities with one multi-row statement, refreshing each from the returned rows.
pub fn insert_batch<T, X>(executor: &X, entities: &mut [T]) -> Result<u64, XplusError>
where
    T: Entity,
    X: Executor + ?Sized,
{
    if entities.is_empty() {
        return Ok(0);
    }
    let (sql, values) = insert_statement(entities)?.build(PostgresQueryBuilder);
    let rows = query_all_built(executor, &sql, &values)?;
    for (entity, row) in entities.iter_mut().zip(rows.iter()) {
        *entity = parse_row(row)?;
    }
    Ok(rows.len() as u64)
}

/// Update `columns` (every non-key column when empty) of the row with the entity's key.
pub fn update<T, X>(executor: &X, entity: &T, columns: &[&str]) -> Result<u64, XplusError>
where
    T: Entity,
    X: Executor + ?Sized,
{
    update_where(executor, entity, columns, pk_condition::<T>(entity.primary_key_value()))
}

/// Update every non-key column of the row whose key is `id`.
pub fn update_by_id<T, X>(executor: &X, id: impl Into<Value>, entity: &T) -> Result<u64, XplusError>
where
    T: Entity,
    X: Executor + ?Sized,
{
    update_where::<T, X, &str>(executor, entity, &[], pk_condition::<T>(id.into()))
}

fn update_where<T, X, S>(
    executor: &X,
    entity: &T,
    columns: &[S],
    condition: Condition,
) -> Result<u64, XplusError>
where
    T: Entity,
    X: Executor + ?Sized,
    S: AsRef<str>,
{
    let mut stmt = UpdateStatement::new();
    stmt.table(table::<T>());
    for (column, value) in assignments(entity, columns)? {
        stmt.value(DynIden::from(column), Expr::val(value));
    }
    stmt.cond_where(condition);
    run_update(executor, &stmt)
}

/// Update the rows matched by `query`: the query's `cols` (every non-key column when none
/// are set) take their values from `entity`, and each `set_expr` is applied as written.
///
/// ```no_run
/// # use xplus::{crud, engine, Query, XplusError};
/// # xplus::entity! {
/// #     #[entity(table = "repo", primary_key = id)]
/// #     #[derive(Debug, Clone, Default)]
/// #     pub struct Repo { pub id: i64, pub value: i32, pub parent_id: Option<i64> }
/// # }
/// # fn main() -> Result<(), XplusError> {
/// let patch = Repo { parent_id: Some(3), ..Repo::default() };
/// let q = Query::<Repo>::new().eq("id", 8).set_expr("value", "value + 1").cols(["parent_id"]);
/// crud::update_fields(engine()?, &q, &patch)?;
/// # Ok(())
/// # }
/// ```
pub fn update_fields<T, X>(executor: &X, query: &Query<T>, entity: &T) -> Result<u64, XplusError>
where
    T: Entity,
    X: Executor + ?Sized,
{
    let expr_columns: Vec<&str> = query.set_exprs().iter().map(|(c, _)| c.as_str()).collect();
    let mut stmt = UpdateStatement::new();
    stmt.table(table::<T>());
    for (column, value) in assignments(entity, query.update_columns())? {
        if expr_columns.contains(&column) {
            continue;
        }
        stmt.value(DynIden::from(column), Expr::val(value));
    }
    for (column, expression) in query.set_exprs() {
        stmt.value(DynIden::from(column.clone()), Expr::cust(expression.clone()));
    }
    stmt.cond_where(query.condition().clone());
    run_update(executor, &stmt)
}

/// Apply only the query's `set_expr` assignments to the rows it matches.
pub fn update_expr<T, X>(executor: &X, query: &Query<T>) -> Result<u64, XplusError>
where
    X: Executor + ?Sized,
{
    if query.set_exprs().is_empty() {
        return Err(XplusError::Query(
            "update_expr called without any set_expr assignment".to_string(),
        ));
    }
    let mut stmt = UpdateStatement::new();
    stmt.table(DynIden::from(query.table().to_string()));
    for (column, expression) in query.set_exprs() {
        stmt.value(DynIden::from(column.clone()), Expr::cust(expression.clone()));
    }
    stmt.cond_where(query.condition().clone());
    run_update(executor, &stmt)
}

pub fn delete_by_id<T, X>(executor: &X, id: impl Into<Value>) -> Result<u64, XplusError>
where
    T: Entity,
    X: Executor + ?Sized,
{
    let mut stmt = DeleteStatement::new();
    stmt.from_table(table::<T>())
        .cond_where(pk_condition::<T>(id.into()));
    run_delete(executor, &stmt)
}

/// Delete every row whose key is in `ids`. An empty list deletes nothing and skips the
/// round trip.
pub fn delete_by_ids<T, X, V>(executor: &X, ids: impl IntoIterator<Item = V>) -> Result<u64, XplusError>
where
    T: Entity,
    X: Executor + ?Sized,
    V: Into<Value>,
{
    let ids: Vec<Expr> = ids.into_iter().map(|id| Expr::val(id)).collect();
    if ids.is_empty() {
        return Ok(0);
    }
    let mut stmt = DeleteStatement::new();
    stmt.from_table(table::<T>())
        .cond_where(col(T::primary_key()).is_in(ids));
    run_delete(executor, &stmt)
}

/// Delete the rows matched by `query`. A query without conditions is refused.
pub fn delete<T, X>(executor: &X, query: &Query<T>) -> Result<u64, XplusError>
where
    X: Executor + ?Sized,
{
    if query.condition().is_empty() {
        return Err(XplusError::MissingCondition);
    }
    let mut stmt = DeleteStatement::new();
    stmt.from_table(DynIden::from(query.table().to_string()))
        .cond_where(query.condition().clone());
    run_delete(executor, &stmt)
}

/// The row with key `id` and `true`, or `T::default()` and `false` when there is none.
pub fn get_by_id<T, X>(executor: &X, id: impl Into<Value>) -> Result<(T, bool), XplusError>
where
    T: Entity,
    X: Executor + ?Sized,
{
    Ok(match select_by_id(executor, id)? {
        Some(entity) => (entity, true),
        None => (T::default(), false),
    })
}

pub fn select_by_id<T, X>(executor: &X, id: impl Into<Value>) -> Result<Option<T>, XplusError>
where
    T: Entity,
    X: Executor + ?Sized,
{
    Query::<T>::new()
        .eq(T::primary_key(), id)
        .one(executor)
}

pub fn select_by_ids<T, X, V>(executor: &X, ids: impl IntoIterator<Item = V>) -> Result<Vec<T>, XplusError>
where
    T: Entity,
    X: Executor + ?Sized,
    V: Into<Value>,
{
    let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Query::<T>::new().is_in(T::primary_key(), ids).find(executor)
}

pub fn select_one<T, X>(executor: &X, query: &Query<T>) -> Result<Option<T>, XplusError>
where
    T: Entity,
    X: Executor + ?Sized,
{
    query.one(executor)
}

pub fn select_one_model<T, R, X>(executor: &X, query: &Query<T>) -> Result<Option<R>, XplusError>
where
    T: Entity,
    R: Projection<T>,
    X: Executor + ?Sized,
{
    query.one_as(executor)
}

pub fn select_list<T, X>(executor: &X, query: &Query<T>) -> Result<Vec<T>, XplusError>
where
    T: Entity,
    X: Executor + ?Sized,
{
    query.find(executor)
}

/// Fetch as `T` and project into `R`, failing on the first row that does not convert.
pub fn select_list_model<T, R, X>(executor: &X, query: &Query<T>) -> Result<Vec<R>, XplusError>
where
    T: Entity,
    R: Projection<T>,
    X: Executor + ?Sized,
{
    query.find_as(executor)
}

/// Fill `page` from `query`: `total` comes from a count over a copy of the query (its own
/// order/limit/offset are ignored), then the requested page is fetched.
pub fn select_page<T, X>(executor: &X, page: Page<T>, query: &Query<T>) -> Result<Page<T>, XplusError>
where
    T: Entity,
    X: Executor + ?Sized,
{
    let (mut page, paged) = count_page(executor, page, query)?;
    if let Some(paged) = paged {
        page.records = paged.find(executor)?;
    }
    Ok(page)
}

pub fn select_page_model<T, R, X>(
    executor: &X,
    page: Page<R>,
    query: &Query<T>,
) -> Result<Page<R>, XplusError>
where
    T: Entity,
    R: Projection<T>,
    X: Executor + ?Sized,
{
    let (mut page, paged) = count_page(executor, page, query)?;
    if let Some(paged) = paged {
        page.records = project_all(paged.find(executor)?)?;
    }
    Ok(page)
}

/// Normalize the page and set its totals; returns the paged query when there is anything
/// to fetch.
fn count_page<T, R, X>(
    executor: &X,
    mut page: Page<R>,
    query: &Query<T>,
) -> Result<(Page<R>, Option<Query<T>>), XplusError>
where
    X: Executor + ?Sized,
{
    page.normalize();
    let total = query.count(executor)?;
    page.set_total(total);
    log::debug!(
        "page {}/{} of {} rows (size {})",
        page.current,
        page.total_page,
        page.total,
        page.size
    );
    if total == 0 {
        page.records = Vec::new();
        return Ok((page, None));
    }
    let paged = query.clone().paginate(page.current, page.size);
    Ok((page, Some(paged)))
}

pub fn select_exist<T, X>(executor: &X, query: &Query<T>) -> Result<bool, XplusError>
where
    X: Executor + ?Sized,
{
    query.exist(executor)
}

/// First row of `query` that also satisfies the `EXISTS` sub-query built by `f`.
pub fn select_sub_exist_one<T, S, X>(
    executor: &X,
    query: &Query<T>,
    f: impl FnOnce(Query<S>) -> Query<S>,
) -> Result<Option<T>, XplusError>
where
    T: Entity,
    S: Entity,
    X: Executor + ?Sized,
{
    query.clone().exists(f).one(executor)
}

pub fn select_sub_exist_list<T, S, X>(
    executor: &X,
    query: &Query<T>,
    f: impl FnOnce(Query<S>) -> Query<S>,
) -> Result<Vec<T>, XplusError>
where
    T: Entity,
    S: Entity,
    X: Executor + ?Sized,
{
    query.clone().exists(f).find(executor)
}
