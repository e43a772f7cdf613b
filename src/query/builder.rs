//! The fluent query builder.
//!
//! Every method takes `self` and returns `Self`. A `Query` owns all of its state, so
//! cloning one gives a fully independent copy, and the nested builders handed to `and`,
//! `or` and `exists` never share state with their parent.

use super::page;
use super::{Conjunction, JoinType, Order};
use crate::entity::Entity;
use sea_query::{
    Asterisk, Condition, DynIden, Expr, ExprTrait, IntoCondition, PostgresQueryBuilder,
    SelectStatement, Value, Values,
};
use std::fmt;
use std::marker::PhantomData;

#[derive(Debug, Clone)]
struct JoinClause {
    join_type: JoinType,
    table: String,
    alias: Option<String>,
    on: String,
}

/// Query builder over the table of entity `T`.
///
/// Chained predicates are AND-ed. Use [`or`](Query::or) and [`and`](Query::and) for
/// parenthesized groups.
pub struct Query<T> {
    table: String,
    alias: Option<String>,
    columns: Vec<String>,
    condition: Condition,
    joins: Vec<JoinClause>,
    group_by: Vec<String>,
    having: Condition,
    order_by: Vec<(String, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
    update_columns: Vec<String>,
    set_exprs: Vec<(String, String)>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            alias: self.alias.clone(),
            columns: self.columns.clone(),
            condition: self.condition.clone(),
            joins: self.joins.clone(),
            group_by: self.group_by.clone(),
            having: self.having.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            update_columns: self.update_columns.clone(),
            set_exprs: self.set_exprs.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("table", &self.table)
            .field("sql", &self.to_sql())
            .field("update_columns", &self.update_columns)
            .field("set_exprs", &self.set_exprs)
            .finish()
    }
}

impl<T: Entity> Default for Query<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Query<T> {
    /// A query over `T::table_name()`.
    pub fn new() -> Self {
        Self::for_table(T::table_name().to_string())
    }
}

impl<T> Query<T> {
    fn for_table(table: String) -> Self {
        Self {
            table,
            alias: None,
            columns: Vec::new(),
            condition: Condition::all(),
            joins: Vec::new(),
            group_by: Vec::new(),
            having: Condition::all(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            update_columns: Vec::new(),
            set_exprs: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// An empty builder on the same table (and alias), used for nested groups.
    fn fresh(&self) -> Self {
        let mut nested = Self::for_table(self.table.clone());
        nested.alias = self.alias.clone();
        nested
    }

    fn push(mut self, condition: impl IntoCondition) -> Self {
        self.condition = self.condition.add(condition);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.push(col(column).eq(Expr::val(value)))
    }

    pub fn ne(self, column: &str, value: impl Into<Value>) -> Self {
        self.push(col(column).ne(Expr::val(value)))
    }

    pub fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.push(col(column).gt(Expr::val(value)))
    }

    pub fn ge(self, column: &str, value: impl Into<Value>) -> Self {
        self.push(col(column).gte(Expr::val(value)))
    }

    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.push(col(column).lt(Expr::val(value)))
    }

    pub fn le(self, column: &str, value: impl Into<Value>) -> Self {
        self.push(col(column).lte(Expr::val(value)))
    }

    /// `column LIKE '%value%'`
    pub fn like(self, column: &str, value: &str) -> Self {
        self.push(col(column).like(format!("%{value}%")))
    }

    pub fn not_like(self, column: &str, value: &str) -> Self {
        self.push(col(column).not_like(format!("%{value}%")))
    }

    /// `column LIKE '%value'`
    pub fn like_left(self, column: &str, value: &str) -> Self {
        self.push(col(column).like(format!("%{value}")))
    }

    pub fn not_like_left(self, column: &str, value: &str) -> Self {
        self.push(col(column).not_like(format!("%{value}")))
    }

    /// `column LIKE 'value%'`
    pub fn like_right(self, column: &str, value: &str) -> Self {
        self.push(col(column).like(format!("{value}%")))
    }

    pub fn not_like_right(self, column: &str, value: &str) -> Self {
        self.push(col(column).not_like(format!("{value}%")))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.push(col(column).is_null())
    }

    pub fn is_not_null(self, column: &str) -> Self {
        self.push(col(column).is_not_null())
    }

    pub fn is_in<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<Expr> = values.into_iter().map(|v| Expr::val(v)).collect();
        self.push(col(column).is_in(values))
    }

    pub fn not_in<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<Expr> = values.into_iter().map(|v| Expr::val(v)).collect();
        self.push(col(column).is_not_in(values))
    }

    /// `column IN (sub-query)`; the sub-query should select exactly one column.
    pub fn in_query<S>(self, column: &str, sub: Query<S>) -> Self {
        self.push(col(column).in_subquery(sub.select_statement()))
    }

    pub fn not_in_query<S>(self, column: &str, sub: Query<S>) -> Self {
        self.push(col(column).not_in_subquery(sub.select_statement()))
    }

    pub fn between(self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.push(col(column).between(Expr::val(low), Expr::val(high)))
    }

    pub fn not_between(self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.push(col(column).not_between(Expr::val(low), Expr::val(high)))
    }

    /// Raw SQL condition; each `?` is bound to the next value.
    pub fn where_raw(self, sql: &str, values: impl IntoIterator<Item = Value>) -> Self {
        self.push(Expr::cust_with_values(sql.to_string(), values))
    }

    /// Any SeaQuery condition or expression.
    pub fn filter(self, condition: impl IntoCondition) -> Self {
        self.push(condition)
    }

    /// AND a parenthesized group built by `f` on a fresh builder. An empty group is ignored.
    pub fn and(mut self, f: impl FnOnce(Self) -> Self) -> Self {
        let group = f(self.fresh());
        if group.condition.is_empty() {
            return self;
        }
        self.condition = self.condition.add(group.condition);
        self
    }

    /// `(everything so far) OR (group built by f)`. Later predicates are AND-ed with the
    /// whole disjunction. An empty group is ignored.
    pub fn or(mut self, f: impl FnOnce(Self) -> Self) -> Self {
        let group = f(self.fresh());
        if group.condition.is_empty() {
            return self;
        }
        if self.condition.is_empty() {
            self.condition = group.condition;
            return self;
        }
        let parent = std::mem::replace(&mut self.condition, Condition::all());
        self.condition = Condition::all().add(Condition::any().add(parent).add(group.condition));
        self
    }

    /// One predicate per pair: `column = value`, or `column IS NULL` for `None`, joined by
    /// `conjunction` and AND-ed with the existing conditions as one group.
    pub fn all_eq<C, V>(self, pairs: impl IntoIterator<Item = (C, Option<V>)>, conjunction: Conjunction) -> Self
    where
        C: AsRef<str>,
        V: Into<Value>,
    {
        let mut group = match conjunction {
            Conjunction::And => Condition::all(),
            Conjunction::Or => Condition::any(),
        };
        for (column, value) in pairs {
            group = match value {
                Some(v) => group.add(col(column.as_ref()).eq(Expr::val(v))),
                None => group.add(col(column.as_ref()).is_null()),
            };
        }
        if group.is_empty() {
            return self;
        }
        self.push(group)
    }

    /// `EXISTS (SELECT 1 FROM <S table> WHERE ...)`, where the sub-query is built by `f`.
    /// Correlate it with the outer query through [`where_raw`](Query::where_raw).
    pub fn exists<S: Entity>(self, f: impl FnOnce(Query<S>) -> Query<S>) -> Self {
        let sub = f(Query::<S>::new());
        self.push(Expr::exists(sub.probe_statement()))
    }

    pub fn not_exists<S: Entity>(self, f: impl FnOnce(Query<S>) -> Query<S>) -> Self {
        let sub = f(Query::<S>::new());
        self.push(Expr::exists(sub.probe_statement()).not())
    }

    /// Columns to select (`*` when none). Plain and `table.column` names are quoted;
    /// anything else is passed through as an expression.
    pub fn select<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Restrict which columns an update writes.
    pub fn cols<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.update_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// Join `table` on a raw condition.
    pub fn join(mut self, join_type: JoinType, table: &str, on: &str) -> Self {
        self.joins.push(JoinClause {
            join_type,
            table: table.to_string(),
            alias: None,
            on: on.to_string(),
        });
        self
    }

    pub fn join_as(mut self, join_type: JoinType, table: &str, alias: &str, on: &str) -> Self {
        self.joins.push(JoinClause {
            join_type,
            table: table.to_string(),
            alias: Some(alias.to_string()),
            on: on.to_string(),
        });
        self
    }

    pub fn group_by<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Raw HAVING condition; `?` placeholders are bound to `values`.
    pub fn having(mut self, sql: &str, values: impl IntoIterator<Item = Value>) -> Self {
        self.having = self
            .having
            .add(Expr::cust_with_values(sql.to_string(), values));
        self
    }

    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.order_by.push((column.to_string(), order));
        self
    }

    pub fn asc(self, column: &str) -> Self {
        self.order_by(column, Order::Asc)
    }

    pub fn desc(self, column: &str) -> Self {
        self.order_by(column, Order::Desc)
    }

    /// `SET column = expression` for updates, e.g. `set_expr("value", "value + 1")`.
    pub fn set_expr(mut self, column: &str, expression: &str) -> Self {
        self.set_exprs
            .push((column.to_string(), expression.to_string()));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Limit/offset for a 1-based page; page < 1 means 1, size < 1 means the default size.
    pub fn paginate(self, page: i64, size: i64) -> Self {
        let (_, size) = page::normalize(page, size);
        let offset = page::offset(page, size);
        self.limit(size as u64).skip(offset)
    }

    pub fn apply(self, f: impl FnOnce(Self) -> Self) -> Self {
        f(self)
    }

    /// SQL with `$n` placeholders plus the values to bind.
    pub fn build(&self) -> (String, Values) {
        self.select_statement().build(PostgresQueryBuilder)
    }

    /// SQL with values inlined, for logging and inspection.
    pub fn to_sql(&self) -> String {
        self.select_statement().to_string(PostgresQueryBuilder)
    }

    pub(crate) fn table(&self) -> &str {
        &self.table
    }

    pub(crate) fn condition(&self) -> &Condition {
        &self.condition
    }

    pub(crate) fn update_columns(&self) -> &[String] {
        &self.update_columns
    }

    pub(crate) fn set_exprs(&self) -> &[(String, String)] {
        &self.set_exprs
    }

    /// FROM, joins, WHERE, GROUP BY and HAVING without a select list.
    fn base_statement(&self) -> SelectStatement {
        let mut stmt = SelectStatement::new();
        let table = DynIden::from(self.table.clone());
        match &self.alias {
            Some(alias) => stmt.from_as(table, DynIden::from(alias.clone())),
            None => stmt.from(table),
        };
        for join in &self.joins {
            let table = DynIden::from(join.table.clone());
            let on = Expr::cust(join.on.clone());
            match &join.alias {
                Some(alias) => stmt.join_as(join.join_type, table, DynIden::from(alias.clone()), on),
                None => stmt.join(join.join_type, table, on),
            };
        }
        if !self.condition.is_empty() {
            stmt.cond_where(self.condition.clone());
        }
        if !self.group_by.is_empty() {
            stmt.add_group_by(self.group_by.iter().map(|c| col(c)));
        }
        if !self.having.is_empty() {
            stmt.cond_having(self.having.clone());
        }
        stmt
    }

    pub(crate) fn select_statement(&self) -> SelectStatement {
        let mut stmt = self.base_statement();
        if self.columns.is_empty() {
            stmt.column(Asterisk);
        }
        for column in &self.columns {
            stmt.expr(select_expr(column));
        }
        for (column, order) in &self.order_by {
            stmt.order_by_expr(col(column), order.clone());
        }
        if let Some(limit) = self.limit {
            stmt.limit(limit);
        }
        if let Some(offset) = self.offset {
            stmt.offset(offset);
        }
        stmt
    }

    /// `SELECT 1 ...` over the same rows, for EXISTS probes.
    fn probe_statement(&self) -> SelectStatement {
        let mut stmt = self.base_statement();
        stmt.expr(Expr::cust("1"));
        stmt
    }

    /// `SELECT COUNT(*) FROM (SELECT 1 ...) AS sub`. ORDER BY, LIMIT and OFFSET are left
    /// out so the count covers every matching row (or group).
    pub(crate) fn count_statement(&self) -> SelectStatement {
        let mut stmt = SelectStatement::new();
        stmt.expr(Expr::cust("COUNT(*)"))
            .from_subquery(self.probe_statement(), DynIden::from("sub"));
        stmt
    }

    /// `SELECT EXISTS (SELECT 1 ...)`
    pub(crate) fn exist_statement(&self) -> SelectStatement {
        let mut stmt = SelectStatement::new();
        stmt.expr(Expr::exists(self.probe_statement()));
        stmt
    }

    /// `SELECT CAST(COALESCE(SUM(column), 0) AS <sql_type>) ...` over the matching rows.
    pub(crate) fn sum_statement(&self, column: &str, sql_type: &str) -> SelectStatement {
        let mut stmt = self.base_statement();
        stmt.expr(Expr::cust(format!(
            "CAST(COALESCE(SUM({}), 0) AS {sql_type})",
            quote_column(column)
        )));
        stmt
    }
}

/// Column expression for `name` or `table.name`.
pub(crate) fn col(name: &str) -> Expr {
    match name.split_once('.') {
        Some((table, column)) => Expr::col((
            DynIden::from(table.to_string()),
            DynIden::from(column.to_string()),
        )),
        None => Expr::col(DynIden::from(name.to_string())),
    }
}

fn is_column_name(name: &str) -> bool {
    let mut parts = name.split('.');
    let valid = |part: &str| {
        !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    match (parts.next(), parts.next(), parts.next()) {
        (Some(column), None, None) => valid(column),
        (Some(table), Some(column), None) => valid(table) && valid(column),
        _ => false,
    }
}

fn select_expr(column: &str) -> Expr {
    if is_column_name(column) {
        col(column)
    } else {
        Expr::cust(column.to_string())
    }
}

fn quote_column(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}
