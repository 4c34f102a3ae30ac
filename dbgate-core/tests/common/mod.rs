//! Shared fixtures: two mapped entities and a file-backed SQLite factory.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use dbgate_core::{
    Column, ColumnType, DbConfig, DiagnosticSink, Entity, IdColumn, Mapping, Mappings, Record,
    Result, SessionFactory, SessionFactoryBuilder, StatementEvent, Value,
};
use tempfile::TempDir;

/// Entity with a store-generated key.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Option<i64>,
    pub name: String,
    pub email: Option<String>,
    pub age: i32,
}

impl User {
    pub fn new(name: &str, email: Option<&str>, age: i32) -> Self {
        Self {
            id: None,
            name: name.to_owned(),
            email: email.map(str::to_owned),
            age,
        }
    }
}

impl Entity for User {
    const MAPPING: Mapping = Mapping::new(
        "users",
        IdColumn::generated("id"),
        &[
            Column::string("name", 100),
            Column::text("email").nullable(),
            Column::integer("age"),
        ],
    );

    fn id(&self) -> Option<Value> {
        self.id.map(Value::Int)
    }

    fn set_generated_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.email.clone().into(),
            self.age.into(),
        ]
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.get_as("id")?,
            name: record.get_as("name")?,
            email: record.get_as("email")?,
            age: record.get_as("age")?,
        })
    }
}

/// Entity whose key is chosen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub code: String,
    pub label: String,
    pub pinned: bool,
}

impl Tag {
    pub fn new(code: &str, label: &str) -> Self {
        Self {
            code: code.to_owned(),
            label: label.to_owned(),
            pinned: false,
        }
    }
}

impl Entity for Tag {
    const MAPPING: Mapping = Mapping::new(
        "tags",
        IdColumn::assigned("code", ColumnType::String(32)),
        &[Column::text("label"), Column::boolean("pinned")],
    );

    fn id(&self) -> Option<Value> {
        Some(self.code.clone().into())
    }

    fn values(&self) -> Vec<Value> {
        vec![self.label.clone().into(), self.pinned.into()]
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            code: record.get_as("code")?,
            label: record.get_as("label")?,
            pinned: record.get_bool("pinned")?,
        })
    }
}

pub fn mappings() -> Mappings {
    Mappings::new().with::<User>().with::<Tag>()
}

/// SQLite configuration for a database file inside `dir`.
pub fn sqlite_config(dir: &TempDir) -> DbConfig {
    let path = dir.path().join("test.db");
    DbConfig {
        update_schema: true,
        ..DbConfig::sqlite(path.display().to_string())
    }
}

/// Route library logs through the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fresh database with both tables created.
pub async fn sqlite_factory() -> (TempDir, SessionFactory) {
    init_tracing();
    let dir = TempDir::new().expect("tempdir");
    let factory = SessionFactoryBuilder::new(sqlite_config(&dir), mappings())
        .build()
        .await
        .expect("factory");
    (dir, factory)
}

/// Sink that keeps every statement it sees.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub statements: Mutex<Vec<(String, bool)>>,
}

impl RecordingSink {
    pub fn sql(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn failures(&self) -> usize {
        self.statements.lock().unwrap().iter().filter(|(_, ok)| !ok).count()
    }
}

impl DiagnosticSink for RecordingSink {
    fn on_statement(&self, event: &StatementEvent<'_>) {
        self.statements
            .lock()
            .unwrap()
            .push((event.sql.to_owned(), event.error.is_none()));
    }
}

pub fn recording_sink() -> Arc<RecordingSink> {
    Arc::new(RecordingSink::default())
}
