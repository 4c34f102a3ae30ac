//! Schema policy applied while building the factory

mod common;

use common::{mappings, sqlite_config, Tag, User};
use dbgate_core::{
    DataError, DbConfig, Filter, Mappings, Page, Repository, SessionFactory, SessionFactoryBuilder,
};
use tempfile::TempDir;

async fn build(config: DbConfig, mappings: Mappings) -> dbgate_core::Result<SessionFactory> {
    SessionFactoryBuilder::new(config, mappings).build().await
}

fn with_policy(dir: &TempDir, update: bool, recreate: bool, validate: bool) -> DbConfig {
    DbConfig {
        update_schema: update,
        drop_and_create_schema: recreate,
        validate_schema: validate,
        ..sqlite_config(dir)
    }
}

#[tokio::test]
async fn validate_fails_on_empty_database() {
    let dir = TempDir::new().unwrap();
    let err = build(with_policy(&dir, false, false, true), mappings())
        .await
        .unwrap_err();
    match err {
        DataError::SchemaValidation { problems } => {
            assert!(problems.contains(&"missing table 'users'".to_owned()));
            assert!(problems.contains(&"missing table 'tags'".to_owned()));
        }
        other => panic!("expected schema validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn update_then_validate_succeeds() {
    let dir = TempDir::new().unwrap();
    build(with_policy(&dir, true, false, true), mappings())
        .await
        .unwrap();
    // second start finds everything in place
    build(with_policy(&dir, false, false, true), mappings())
        .await
        .unwrap();
}

#[tokio::test]
async fn update_adds_missing_columns_without_touching_rows() {
    let dir = TempDir::new().unwrap();
    let bare = build(with_policy(&dir, false, false, false), Mappings::new())
        .await
        .unwrap();
    let mut session = bare.open_session().await.unwrap();
    let mut tx = session.begin().await.unwrap();
    tx.execute(
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name VARCHAR(100) NOT NULL)",
        None,
    )
    .await
    .unwrap();
    tx.execute("INSERT INTO users (name) VALUES ('legacy')", None)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    drop(session);
    bare.close().await;

    let partial = Mappings::new().with::<User>();
    let err = build(with_policy(&dir, false, false, true), partial.clone())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing column 'users.email'"));
    assert!(err.to_string().contains("missing column 'users.age'"));

    let factory = build(with_policy(&dir, true, false, true), partial)
        .await
        .unwrap();
    let records = Repository::<User>::new(factory)
        .get_records_by_raw_sql("SELECT name, email, age FROM users", None, Page::all())
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get_str("name"), Some("legacy"));
    assert!(records[0].get("age").unwrap().is_null());
}

#[tokio::test]
async fn drop_and_create_discards_data() {
    let dir = TempDir::new().unwrap();
    let factory = build(with_policy(&dir, true, false, false), mappings())
        .await
        .unwrap();
    let tags = Repository::<Tag>::new(factory.clone());
    tags.insert(&mut Tag::new("old", "gone soon")).await.unwrap();
    factory.close().await;

    let factory = build(with_policy(&dir, false, true, true), mappings())
        .await
        .unwrap();
    let tags = Repository::<Tag>::new(factory);
    assert_eq!(tags.get_count_by_predicate(&Filter::all()).await.unwrap(), 0);
}

#[tokio::test]
async fn update_wins_over_drop_and_create() {
    let dir = TempDir::new().unwrap();
    let factory = build(with_policy(&dir, true, false, false), mappings())
        .await
        .unwrap();
    Repository::<Tag>::new(factory.clone())
        .insert(&mut Tag::new("keep", "survives"))
        .await
        .unwrap();
    factory.close().await;

    let factory = build(with_policy(&dir, true, true, false), mappings())
        .await
        .unwrap();
    let tags = Repository::<Tag>::new(factory);
    assert_eq!(tags.get_count_by_predicate(&Filter::all()).await.unwrap(), 1);
}
