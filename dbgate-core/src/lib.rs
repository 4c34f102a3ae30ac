//! dbgate-core: generic repository and session-factory facade over sqlx
//!
//! A `SessionFactory` is built once from a [`DbConfig`] and a set of entity
//! [`Mappings`]; a [`Repository`] per entity type then runs each operation in
//! its own session, wrapping writes in a transaction.
//!
//! Postgres, MySQL and SQLite are supported through sqlx's `Any` driver.
//! SQL Server is not: a `DBType` of `MSSQL` fails when the factory is built
//! (see [`DbKind`]).

pub mod config;
pub mod diagnostics;
pub mod dialect;
pub mod error;
pub mod factory;
pub mod filter;
pub mod mapping;
pub mod page;
pub mod params;
pub mod registration;
pub mod repository;
pub mod schema;
pub mod session;
pub mod value;

mod executor;
mod queries;
mod statement;

pub use config::DbConfig;
pub use diagnostics::{DiagnosticSink, NoopSink, ProfileStats, StatementEvent, TracingProfiler};
pub use dialect::DbKind;
pub use error::{DataError, Result};
pub use executor::EngineSettings;
pub use factory::{SessionFactory, SessionFactoryBuilder};
pub use filter::{col, CmpOp, ColumnRef, Filter};
pub use mapping::{Column, ColumnType, Entity, IdColumn, IdStrategy, Mapping, Mappings};
pub use page::Page;
pub use params::Params;
pub use registration::DataServices;
pub use repository::Repository;
pub use schema::SchemaPolicy;
pub use session::{Session, Transaction};
pub use statement::format_sql;
pub use value::{FromValue, Record, Value};
