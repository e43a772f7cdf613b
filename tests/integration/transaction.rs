//! Transaction scoping against a live PostgreSQL database.

mod common;

use common::{repo, unique_prefix, Repo};
use xplus::{crud, transaction, Query, XplusError};

#[test]
fn test_commit_persists() {
    let Some(db) = common::engine() else { return };
    let prefix = unique_prefix("commit");

    let id = transaction(|tx| {
        let mut row = repo(format!("{prefix}a"), 1);
        crud::insert(tx, &mut row)?;
        Ok::<_, XplusError>(row.id)
    })
    .unwrap();

    assert!(crud::select_by_id::<Repo, _>(db, id).unwrap().is_some());
}

#[derive(Debug)]
enum AppError {
    Rejected,
    Db(XplusError),
}

impl From<XplusError> for AppError {
    fn from(e: XplusError) -> Self {
        AppError::Db(e)
    }
}

#[test]
fn test_error_rolls_back_and_is_returned_unchanged() {
    let Some(db) = common::engine() else { return };
    let prefix = unique_prefix("rollback");

    let result: Result<(), AppError> = db.transaction(|tx| {
        let mut row = repo(format!("{prefix}a"), 1);
        crud::insert(tx, &mut row)?;
        Err(AppError::Rejected)
    });

    assert!(matches!(result, Err(AppError::Rejected)));
    let scoped = Query::<Repo>::new().like_right("name", &prefix);
    assert!(!crud::select_exist(db, &scoped).unwrap());
}
