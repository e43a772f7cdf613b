//! Record traits: how a caller-defined struct maps to a table and how it is read back.
//!
//! Implement them by hand or with [`entity!`](crate::entity!) and
//! [`projection!`](crate::projection!).

use crate::error::XplusError;
use may_postgres::Row;
use sea_query::Value;

/// Build a value from one result row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self, may_postgres::Error>;
}

/// A struct stored in one table.
///
/// `columns()` and `values()` must list the same fields in the same order.
pub trait Entity: FromRow + Default {
    fn table_name() -> &'static str;

    fn primary_key() -> &'static str {
        "id"
    }

    /// Whether the database assigns the primary key (it is then left out of inserts).
    fn auto_increment() -> bool {
        true
    }

    fn columns() -> &'static [&'static str];

    fn values(&self) -> Vec<Value>;

    fn primary_key_value(&self) -> Value;
}

/// A narrower or reshaped view of an entity `E`, built field by field.
///
/// Use [`projection!`](crate::projection!) to declare the field mapping; every target
/// field must appear in the mapping, and each source value goes through `TryFrom`.
pub trait Projection<E>: Sized {
    fn project(entity: E) -> Result<Self, XplusError>;
}

pub(crate) fn parse_row<T: FromRow>(row: &Row) -> Result<T, XplusError> {
    T::from_row(row).map_err(|e| XplusError::Parse(format!("Failed to parse row: {e}")))
}

/// Project every entity, stopping at the first conversion error.
pub(crate) fn project_all<E, R: Projection<E>>(entities: Vec<E>) -> Result<Vec<R>, XplusError> {
    entities.into_iter().map(R::project).collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::{Repo, RepoSummary, Tag};
    use super::*;

    #[test]
    fn test_entity_macro_metadata() {
        assert_eq!(Repo::table_name(), "repo");
        assert_eq!(Repo::primary_key(), "id");
        assert!(Repo::auto_increment());
        assert_eq!(Repo::columns(), &["id", "name", "value", "parent_id"]);

        assert_eq!(Tag::primary_key(), "code");
        assert!(!Tag::auto_increment());
    }

    #[test]
    fn test_entity_macro_values_follow_columns() {
        let repo = Repo {
            id: 3,
            name: "xplus".to_string(),
            value: 7,
            parent_id: None,
        };
        let values = repo.values();
        assert_eq!(values.len(), Repo::columns().len());
        assert_eq!(values[0], Value::BigInt(Some(3)));
        assert_eq!(values[1], Value::String(Some("xplus".to_string())));
        assert_eq!(values[2], Value::Int(Some(7)));
        assert_eq!(values[3], Value::BigInt(None));
        assert_eq!(repo.primary_key_value(), Value::BigInt(Some(3)));
    }

    #[test]
    fn test_projection_maps_and_renames() {
        let repo = Repo {
            id: 1,
            name: "core".to_string(),
            value: 12,
            parent_id: Some(9),
        };
        let summary = RepoSummary::project(repo).unwrap();
        assert_eq!(
            summary,
            RepoSummary {
                id: 1,
                title: "core".to_string(),
                value: 12,
            }
        );
    }

    #[test]
    fn test_projection_reports_failing_field() {
        let repo = Repo {
            value: 70_000,
            ..Repo::default()
        };
        match RepoSummary::project(repo) {
            Err(XplusError::Projection { field, .. }) => assert_eq!(field, "value"),
            other => panic!("expected projection error, got {other:?}"),
        }
    }

    #[test]
    fn test_project_all_fails_fast() {
        let repos = vec![
            Repo {
                id: 1,
                ..Repo::default()
            },
            Repo {
                id: 2,
                value: i32::MAX,
                ..Repo::default()
            },
            Repo {
                id: 3,
                ..Repo::default()
            },
        ];
        let result: Result<Vec<RepoSummary>, _> = project_all(repos);
        assert!(matches!(
            result,
            Err(XplusError::Projection { field: "value", .. })
        ));

        let ok: Vec<RepoSummary> = project_all(vec![Repo::default(), Repo::default()]).unwrap();
        assert_eq!(ok.len(), 2);
    }
}
