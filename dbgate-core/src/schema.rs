//! Schema reconciliation against registered mappings
//!
//! Runs once while a session factory is built. Update is additive only:
//! missing tables are created and missing columns added, nothing is dropped
//! or renamed. Drop-and-create rebuilds every mapped table and loses data.

use sqlx::AnyConnection;
use tracing::{info, warn};

use crate::dialect::DbKind;
use crate::error::{DataError, Result};
use crate::executor::Engine;
use crate::mapping::{Column, Mapping, Mappings};
use crate::statement::Statement;
use crate::value::Value;

/// Which schema actions to run, as read from the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaPolicy {
    pub update: bool,
    pub drop_and_create: bool,
    pub validate: bool,
}

impl SchemaPolicy {
    pub fn is_noop(&self) -> bool {
        !(self.update || self.drop_and_create || self.validate)
    }
}

/// Apply `policy`: update wins over drop-and-create, validate runs after
/// whichever of the two ran.
pub(crate) async fn apply(
    engine: &Engine,
    conn: &mut AnyConnection,
    mappings: &Mappings,
    policy: SchemaPolicy,
) -> Result<()> {
    if policy.update {
        update(engine, conn, mappings).await?;
    } else if policy.drop_and_create {
        drop_and_create(engine, conn, mappings).await?;
    }
    if policy.validate {
        validate(engine, conn, mappings).await?;
    }
    Ok(())
}

fn column_ddl(kind: DbKind, column: &Column, enforce_not_null: bool) -> String {
    let mut ddl = format!("{} {}", kind.quote(column.name), kind.column_type(column.ty));
    if enforce_not_null && !column.nullable {
        ddl.push_str(" NOT NULL");
    }
    ddl
}

pub(crate) fn create_table_sql(kind: DbKind, mapping: &Mapping) -> String {
    let mut parts = vec![kind.id_column_ddl(&mapping.id)];
    parts.extend(mapping.columns.iter().map(|c| column_ddl(kind, c, true)));
    format!("CREATE TABLE {} ({})", kind.quote(mapping.table), parts.join(", "))
}

/// Added columns never carry NOT NULL: existing rows have no value for them.
pub(crate) fn add_column_sql(kind: DbKind, mapping: &Mapping, column: &Column) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        kind.quote(mapping.table),
        column_ddl(kind, column, false)
    )
}

fn introspect(kind: DbKind, table: &str) -> Statement {
    let mut stmt = Statement::new(kind);
    match kind {
        DbKind::Postgres => stmt.push(
            "SELECT CAST(column_name AS TEXT) AS column_name FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = ",
        ),
        DbKind::MySql => stmt.push(
            "SELECT column_name AS column_name FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = ",
        ),
        DbKind::Sqlite => stmt.push("SELECT name AS column_name FROM pragma_table_info("),
    };
    stmt.push_bind(Value::from(table), None);
    if kind == DbKind::Sqlite {
        stmt.push(")");
    }
    stmt
}

/// Column names of a live table, or `None` if the table does not exist.
async fn live_columns(
    engine: &Engine,
    conn: &mut AnyConnection,
    table: &str,
) -> Result<Option<Vec<String>>> {
    let stmt = introspect(engine.kind, table);
    let rows = engine.fetch_all(conn, &stmt).await?;
    let columns: Vec<String> = rows
        .into_iter()
        .filter_map(|row| row.into_values().into_iter().next())
        .filter_map(|value| match value {
            Value::Text(name) => Some(name),
            Value::Bytes(raw) => Some(String::from_utf8_lossy(&raw).into_owned()),
            _ => None,
        })
        .collect();
    Ok((!columns.is_empty()).then_some(columns))
}

fn has_column(live: &[String], name: &str) -> bool {
    live.iter().any(|c| c.eq_ignore_ascii_case(name))
}

async fn run_ddl(engine: &Engine, conn: &mut AnyConnection, sql: String) -> Result<()> {
    let mut stmt = Statement::new(engine.kind);
    stmt.push(&sql);
    engine.execute(conn, &stmt).await?;
    Ok(())
}

async fn update(engine: &Engine, conn: &mut AnyConnection, mappings: &Mappings) -> Result<()> {
    let kind = engine.kind;
    for mapping in mappings.iter() {
        match live_columns(engine, conn, mapping.table).await? {
            None => {
                info!(table = mapping.table, "creating table");
                run_ddl(engine, conn, create_table_sql(kind, mapping)).await?;
            }
            Some(live) => {
                for column in mapping.columns.iter().filter(|c| !has_column(&live, c.name)) {
                    info!(table = mapping.table, column = column.name, "adding column");
                    run_ddl(engine, conn, add_column_sql(kind, mapping, column)).await?;
                }
            }
        }
    }
    Ok(())
}

async fn drop_and_create(
    engine: &Engine,
    conn: &mut AnyConnection,
    mappings: &Mappings,
) -> Result<()> {
    let kind = engine.kind;
    warn!(tables = mappings.len(), "dropping and recreating mapped tables");
    for mapping in mappings.iter().rev() {
        run_ddl(engine, conn, format!("DROP TABLE IF EXISTS {}", kind.quote(mapping.table))).await?;
    }
    for mapping in mappings.iter() {
        run_ddl(engine, conn, create_table_sql(kind, mapping)).await?;
    }
    Ok(())
}

async fn validate(engine: &Engine, conn: &mut AnyConnection, mappings: &Mappings) -> Result<()> {
    let mut problems = Vec::new();
    for mapping in mappings.iter() {
        let Some(live) = live_columns(engine, conn, mapping.table).await? else {
            problems.push(format!("missing table '{}'", mapping.table));
            continue;
        };
        for name in mapping.column_names().filter(|name| !has_column(&live, name)) {
            problems.push(format!("missing column '{}.{}'", mapping.table, name));
        }
    }
    if problems.is_empty() {
        info!(tables = mappings.len(), "schema validated");
        Ok(())
    } else {
        Err(DataError::SchemaValidation { problems })
    }
}
