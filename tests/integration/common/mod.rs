//! Shared setup for the database-backed tests.
//!
//! Set `TEST_DATABASE_URL` to a PostgreSQL connection string to run them; without it
//! every test returns early.

#![allow(dead_code)]

use std::sync::Once;

use fake::faker::lorem::en::Word;
use fake::Fake;
use xplus::{init_engine, Engine, EngineConfig, Executor};

xplus::entity! {
    #[entity(table = "xplus_it_repo", primary_key = id)]
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Repo {
        pub id: i64,
        pub name: String,
        pub value: i32,
        pub parent_id: Option<i64>,
        pub created_at: Option<chrono::NaiveDateTime>,
    }
}

static SCHEMA: Once = Once::new();

pub fn engine() -> Option<&'static Engine> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let engine = init_engine(
        EngineConfig::new(url)
            .with_max_open_conns(8)
            .with_show_sql(true),
    )
    .expect("Failed to initialize engine");
    SCHEMA.call_once(|| {
        engine
            .execute(
                r#"
                CREATE TABLE IF NOT EXISTS xplus_it_repo (
                    id BIGSERIAL PRIMARY KEY,
                    name TEXT NOT NULL,
                    value INTEGER NOT NULL,
                    parent_id BIGINT,
                    created_at TIMESTAMP
                )
                "#,
                &[],
            )
            .expect("Failed to create schema");
    });
    Some(engine)
}

/// A name prefix no other test run shares, so tests can scope their rows.
pub fn unique_prefix(test: &str) -> String {
    let word: String = Word().fake();
    format!("{test}-{word}-{}-", std::process::id())
}

pub fn repo(name: String, value: i32) -> Repo {
    Repo {
        name,
        value,
        ..Repo::default()
    }
}
