//! Statement execution
//!
//! Every statement the facade sends goes through `Engine`: it is echoed when
//! ShowSql is on, timed, and reported to the diagnostic sink whether it
//! succeeds or fails.

use std::sync::Arc;
use std::time::Instant;

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use sqlx::any::AnyQueryResult;
use sqlx::AnyConnection;
use tracing::info;

use crate::dialect::DbKind;
use crate::diagnostics::{DiagnosticSink, StatementEvent};
use crate::error::Result;
use crate::statement::{format_sql, Statement};
use crate::value::{record_from_row, Record};

/// Upper bound on bind parameters in one statement. Below SQLite's 32766
/// and Postgres' 65535.
pub(crate) const MAX_BIND_PARAMS: usize = 30_000;

/// Engine properties derived from the configuration at build time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Rows per multi-row insert or `IN (...)` delete
    pub batch_size: usize,
    /// Echo statements on `dbgate::sql`
    pub show_sql: bool,
    /// Pretty-print echoed statements
    pub format_sql: bool,
}

impl EngineSettings {
    /// ShowSql drives both echo settings.
    pub fn new(batch_size: usize, show_sql: bool) -> Self {
        Self {
            batch_size,
            show_sql,
            format_sql: show_sql,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Engine {
    pub(crate) kind: DbKind,
    pub(crate) settings: EngineSettings,
    pub(crate) sink: Arc<dyn DiagnosticSink>,
}

impl Engine {
    /// Rows per chunk for statements binding `width` values per row.
    pub(crate) fn chunk_size(&self, width: usize) -> usize {
        let by_params = MAX_BIND_PARAMS / width.max(1);
        self.settings.batch_size.min(by_params).max(1)
    }

    fn echo(&self, stmt: &Statement) {
        if !self.settings.show_sql {
            return;
        }
        if self.settings.format_sql {
            info!(target: "dbgate::sql", params = stmt.param_count(), "\n{}", format_sql(stmt.sql()));
        } else {
            info!(target: "dbgate::sql", params = stmt.param_count(), "{}", stmt.sql());
        }
    }

    fn report(&self, stmt: &Statement, started: Instant, rows: Option<u64>, error: Option<&sqlx::Error>) {
        self.sink.on_statement(&StatementEvent {
            sql: stmt.sql(),
            params: stmt.param_count(),
            elapsed: started.elapsed(),
            rows,
            error: error.map(ToString::to_string),
        });
    }

    pub(crate) async fn fetch_all(
        &self,
        conn: &mut AnyConnection,
        stmt: &Statement,
    ) -> Result<Vec<Record>> {
        self.echo(stmt);
        let started = Instant::now();
        match stmt.query().fetch_all(conn).await {
            Ok(rows) => {
                self.report(stmt, started, Some(rows.len() as u64), None);
                rows.iter().map(record_from_row).collect()
            }
            Err(err) => {
                self.report(stmt, started, None, Some(&err));
                Err(err.into())
            }
        }
    }

    /// Fetch at most `limit` rows and stop reading.
    pub(crate) async fn fetch_up_to(
        &self,
        conn: &mut AnyConnection,
        stmt: &Statement,
        limit: usize,
    ) -> Result<Vec<Record>> {
        self.echo(stmt);
        let started = Instant::now();
        let mut rows = Vec::new();
        let outcome = {
            let mut stream = stmt.query().fetch(conn);
            loop {
                if rows.len() >= limit {
                    break Ok(());
                }
                match stream.try_next().await {
                    Ok(Some(row)) => rows.push(row),
                    Ok(None) => break Ok(()),
                    Err(err) => break Err(err),
                }
            }
        };
        match outcome {
            Ok(()) => {
                self.report(stmt, started, Some(rows.len() as u64), None);
                rows.iter().map(record_from_row).collect()
            }
            Err(err) => {
                self.report(stmt, started, None, Some(&err));
                Err(err.into())
            }
        }
    }

    pub(crate) async fn execute(
        &self,
        conn: &mut AnyConnection,
        stmt: &Statement,
    ) -> Result<AnyQueryResult> {
        self.echo(stmt);
        let started = Instant::now();
        match stmt.query().execute(conn).await {
            Ok(done) => {
                self.report(stmt, started, Some(done.rows_affected()), None);
                Ok(done)
            }
            Err(err) => {
                self.report(stmt, started, None, Some(&err));
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NoopSink;

    fn engine(batch_size: usize) -> Engine {
        Engine {
            kind: DbKind::Sqlite,
            settings: EngineSettings::new(batch_size, false),
            sink: Arc::new(NoopSink),
        }
    }

    #[test]
    fn chunks_respect_batch_size_and_param_cap() {
        assert_eq!(engine(1000).chunk_size(3), 1000);
        assert_eq!(engine(50_000).chunk_size(1), MAX_BIND_PARAMS);
        assert_eq!(engine(50_000).chunk_size(7), MAX_BIND_PARAMS / 7);
        assert_eq!(engine(1).chunk_size(0), 1);
    }

    #[test]
    fn show_sql_drives_format_flag() {
        let settings = EngineSettings::new(10, true);
        assert!(settings.show_sql && settings.format_sql);
        assert!(!EngineSettings::new(10, false).format_sql);
    }
}
