//! Per-database SQL differences
//!
//! Only what the facade itself renders lives here: placeholders, identifier
//! quoting, paging clauses, DDL column types and key generation. Everything
//! else is the database's own SQL, passed through untouched.

use std::fmt;
use std::str::FromStr;

use crate::error::{DataError, Result};
use crate::mapping::{ColumnType, IdColumn, IdStrategy};
use crate::page::Page;

/// Supported database kinds
///
/// `DBType` accepts Postgres, MySQL (or MariaDB) and SQLite. SQL Server
/// (`MSSQL`) is not available: sqlx ships no driver for it, so that value
/// fails configuration with a `Config` error naming the supported kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbKind {
    Postgres,
    MySql,
    /// File-based embedded database
    Sqlite,
}

impl FromStr for DbKind {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "" => Err(DataError::config("DBType is required")),
            "mssql" | "sqlserver" => Err(DataError::config(
                "MSSQL is not supported (no SQL Server driver); expected Postgres|MySql|SQLite",
            )),
            _ => Err(DataError::config(format!(
                "unrecognized database kind '{}'; expected Postgres|MySql|SQLite",
                s.trim()
            ))),
        }
    }
}

impl fmt::Display for DbKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Postgres => "Postgres",
            Self::MySql => "MySql",
            Self::Sqlite => "SQLite",
        })
    }
}

impl DbKind {
    /// Whether connection parameters come from a file path instead of a server.
    pub fn is_file_based(self) -> bool {
        matches!(self, Self::Sqlite)
    }

    /// Default server port, if the kind has one.
    pub fn default_port(self) -> Option<u16> {
        match self {
            Self::Postgres => Some(5432),
            Self::MySql => Some(3306),
            Self::Sqlite => None,
        }
    }

    /// Positional placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${index}"),
            Self::MySql | Self::Sqlite => "?".to_owned(),
        }
    }

    /// Quote an identifier, doubling any embedded quote character.
    pub fn quote(self, ident: &str) -> String {
        let q = match self {
            Self::MySql => '`',
            Self::Postgres | Self::Sqlite => '"',
        };
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(q);
        for ch in ident.chars() {
            if ch == q {
                out.push(q);
            }
            out.push(ch);
        }
        out.push(q);
        out
    }

    /// `LIMIT`/`OFFSET` suffix (with a leading space), empty for `Page::all()`.
    ///
    /// Values are rendered as integer literals; they never come from SQL text.
    pub fn page_clause(self, page: Page) -> String {
        let mut clause = String::new();
        match (page.take_i64(), self) {
            (Some(take), _) => clause.push_str(&format!(" LIMIT {take}")),
            (None, Self::Sqlite) if page.skip > 0 => clause.push_str(" LIMIT -1"),
            (None, Self::MySql) if page.skip > 0 => {
                clause.push_str(" LIMIT 18446744073709551615")
            }
            (None, _) => {}
        }
        if page.skip > 0 {
            clause.push_str(&format!(" OFFSET {}", page.skip_i64()));
        }
        clause
    }

    /// DDL type for a mapped column.
    pub fn column_type(self, ty: ColumnType) -> String {
        match (self, ty) {
            (_, ColumnType::Integer) => "INTEGER".into(),
            (_, ColumnType::BigInt) => "BIGINT".into(),
            (Self::Postgres, ColumnType::Double) => "DOUBLE PRECISION".into(),
            (Self::MySql, ColumnType::Double) => "DOUBLE".into(),
            (Self::Sqlite, ColumnType::Double) => "REAL".into(),
            (_, ColumnType::Text) => "TEXT".into(),
            (_, ColumnType::String(len)) => format!("VARCHAR({len})"),
            // SQLite has no boolean storage class; 0/1 integers read back through FromValue.
            (Self::Sqlite, ColumnType::Boolean) => "INTEGER".into(),
            (_, ColumnType::Boolean) => "BOOLEAN".into(),
            (Self::Postgres, ColumnType::Binary) => "BYTEA".into(),
            (Self::MySql | Self::Sqlite, ColumnType::Binary) => "BLOB".into(),
        }
    }

    /// Column definition for a primary key.
    pub fn id_column_ddl(self, id: &IdColumn) -> String {
        let name = self.quote(id.name);
        match (id.strategy, self) {
            (IdStrategy::Generated, Self::Postgres) => {
                format!("{name} BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY")
            }
            (IdStrategy::Generated, Self::MySql) => {
                format!("{name} BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY")
            }
            // SQLite only auto-assigns rowid aliases declared exactly as INTEGER.
            (IdStrategy::Generated, Self::Sqlite) => {
                format!("{name} INTEGER PRIMARY KEY AUTOINCREMENT")
            }
            (IdStrategy::Assigned, _) => {
                format!("{name} {} NOT NULL PRIMARY KEY", self.column_type(id.ty))
            }
        }
    }

    /// Whether `INSERT … RETURNING` reports generated keys.
    pub fn supports_returning(self) -> bool {
        matches!(self, Self::Postgres | Self::Sqlite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_kinds_case_insensitively() {
        assert_eq!("Postgres".parse::<DbKind>().unwrap(), DbKind::Postgres);
        assert_eq!("postgresql".parse::<DbKind>().unwrap(), DbKind::Postgres);
        assert_eq!("MySQL".parse::<DbKind>().unwrap(), DbKind::MySql);
        assert_eq!(" SQLite ".parse::<DbKind>().unwrap(), DbKind::Sqlite);
    }

    #[test]
    fn rejects_unknown_kind_with_config_error() {
        let err = "Oracle".parse::<DbKind>().unwrap_err();
        assert!(matches!(err, DataError::Config { .. }));
        assert!(err.to_string().contains("Oracle"));
    }

    #[test]
    fn sql_server_is_named_as_unsupported() {
        let err = "MSSQL".parse::<DbKind>().unwrap_err();
        assert!(matches!(err, DataError::Config { .. }));
        assert!(err.to_string().contains("MSSQL is not supported"));
    }

    #[test]
    fn placeholders_follow_driver_syntax() {
        assert_eq!(DbKind::Postgres.placeholder(3), "$3");
        assert_eq!(DbKind::Sqlite.placeholder(3), "?");
        assert_eq!(DbKind::MySql.placeholder(1), "?");
    }

    #[test]
    fn quoting_escapes_embedded_quotes() {
        assert_eq!(DbKind::Postgres.quote("users"), "\"users\"");
        assert_eq!(DbKind::Sqlite.quote("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(DbKind::MySql.quote("a`b"), "`a``b`");
    }

    #[test]
    fn page_clause_per_dialect() {
        assert_eq!(DbKind::Postgres.page_clause(Page::all()), "");
        assert_eq!(DbKind::Postgres.page_clause(Page::new(5, 10)), " LIMIT 10 OFFSET 5");
        assert_eq!(DbKind::Postgres.page_clause(Page::skip(5)), " OFFSET 5");
        assert_eq!(DbKind::Sqlite.page_clause(Page::skip(5)), " LIMIT -1 OFFSET 5");
        assert_eq!(
            DbKind::MySql.page_clause(Page::skip(2)),
            " LIMIT 18446744073709551615 OFFSET 2"
        );
        assert_eq!(DbKind::Sqlite.page_clause(Page::new(0, 1)), " LIMIT 1");
    }

    #[test]
    fn generated_ids_use_native_identity() {
        let id = IdColumn::generated("id");
        assert_eq!(
            DbKind::Sqlite.id_column_ddl(&id),
            "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"
        );
        assert!(DbKind::Postgres.id_column_ddl(&id).contains("IDENTITY"));
        assert!(DbKind::MySql.id_column_ddl(&id).contains("AUTO_INCREMENT"));

        let assigned = IdColumn::assigned("code", ColumnType::String(36));
        assert_eq!(
            DbKind::Postgres.id_column_ddl(&assigned),
            "\"code\" VARCHAR(36) NOT NULL PRIMARY KEY"
        );
    }
}
