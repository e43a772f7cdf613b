//! CRUD and pagination against a live PostgreSQL database.

mod common;

use common::{repo, unique_prefix, Repo};
use xplus::{crud, Page, Query};

#[test]
fn test_insert_then_get_by_id() {
    let Some(db) = common::engine() else { return };
    let prefix = unique_prefix("insert");

    let mut inserted = repo(format!("{prefix}a"), 5);
    inserted.created_at = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_opt(8, 0, 0));
    assert_eq!(crud::insert(db, &mut inserted).unwrap(), 1);
    assert!(inserted.id > 0, "generated key is written back");

    let (fetched, found) = crud::get_by_id::<Repo, _>(db, inserted.id).unwrap();
    assert!(found);
    assert_eq!(fetched, inserted);
}

#[test]
fn test_get_by_id_missing() {
    let Some(db) = common::engine() else { return };
    let (fetched, found) = crud::get_by_id::<Repo, _>(db, -1i64).unwrap();
    assert!(!found);
    assert_eq!(fetched, Repo::default());
}

#[test]
fn test_select_page_totals() {
    let Some(db) = common::engine() else { return };
    let prefix = unique_prefix("page");

    let mut rows: Vec<Repo> = (0..7).map(|i| repo(format!("{prefix}{i}"), i)).collect();
    assert_eq!(crud::insert_batch(db, &mut rows).unwrap(), 7);

    let query = Query::<Repo>::new().like_right("name", &prefix).asc("id");
    let page = crud::select_page(db, Page::new(2, 2), &query).unwrap();
    assert_eq!(page.total, 7);
    assert_eq!(page.total_page, 4);
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.records[0].name, format!("{prefix}2"));

    let last = crud::select_page(db, Page::new(4, 2), &query).unwrap();
    assert_eq!(last.records.len(), 1);
}

#[test]
fn test_update_fields_with_expression() {
    let Some(db) = common::engine() else { return };
    let prefix = unique_prefix("update");

    let mut row = repo(format!("{prefix}x"), 10);
    crud::insert(db, &mut row).unwrap();

    let patch = Repo {
        parent_id: Some(row.id),
        ..Repo::default()
    };
    let query = Query::<Repo>::new()
        .eq("id", row.id)
        .set_expr("value", "value + 1")
        .cols(["parent_id"]);
    assert_eq!(crud::update_fields(db, &query, &patch).unwrap(), 1);

    let updated = crud::select_by_id::<Repo, _>(db, row.id).unwrap().unwrap();
    assert_eq!(updated.value, 11);
    assert_eq!(updated.parent_id, Some(row.id));
    assert_eq!(updated.name, row.name);
}

#[test]
fn test_delete_and_exist() {
    let Some(db) = common::engine() else { return };
    let prefix = unique_prefix("delete");

    let mut rows: Vec<Repo> = (0..3).map(|i| repo(format!("{prefix}{i}"), i)).collect();
    crud::insert_batch(db, &mut rows).unwrap();
    let scoped = Query::<Repo>::new().like_right("name", &prefix);
    assert!(crud::select_exist(db, &scoped).unwrap());

    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    assert_eq!(crud::delete_by_ids::<Repo, _, _>(db, ids).unwrap(), 3);
    assert!(!crud::select_exist(db, &scoped).unwrap());
    assert_eq!(scoped.count(db).unwrap(), 0);
}

#[test]
fn test_concurrent_coroutines_share_the_pool() {
    let Some(db) = common::engine() else { return };
    let prefix = unique_prefix("coroutine");

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let name = format!("{prefix}{i}");
            may::go!(move || {
                let mut row = repo(name, i);
                crud::insert(db, &mut row).map(|_| row.id)
            })
        })
        .collect();
    for handle in handles {
        let id = handle.join().expect("coroutine panicked").unwrap();
        assert!(id > 0);
    }

    let scoped = Query::<Repo>::new().like_right("name", &prefix);
    assert_eq!(scoped.count(db).unwrap(), 16);
    let stats = db.stats();
    assert!(stats.open <= 8, "{stats:?}");
}
