//! Statement diagnostics
//!
//! The session factory reports every statement it runs to one
//! `DiagnosticSink`. The sink is chosen when the factory is built: an
//! explicitly injected sink wins, `UseProfiler` otherwise installs the
//! `TracingProfiler`, and the default is `NoopSink`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{info, warn};

/// One executed statement
#[derive(Debug, Clone)]
pub struct StatementEvent<'a> {
    pub sql: &'a str,
    /// Number of bound parameters
    pub params: usize,
    pub elapsed: Duration,
    /// Rows returned or affected, when known
    pub rows: Option<u64>,
    /// Driver error text if the statement failed
    pub error: Option<String>,
}

/// Receiver for statement events.
pub trait DiagnosticSink: Send + Sync + fmt::Debug {
    fn on_statement(&self, event: &StatementEvent<'_>);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn on_statement(&self, _event: &StatementEvent<'_>) {}
}

/// Profiler that times statements and logs them on `dbgate::profiler`.
#[derive(Debug, Default)]
pub struct TracingProfiler {
    statements: AtomicU64,
    failures: AtomicU64,
    total_micros: AtomicU64,
}

/// Snapshot of profiler counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileStats {
    pub statements: u64,
    pub failures: u64,
    pub total: Duration,
}

impl TracingProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> ProfileStats {
        ProfileStats {
            statements: self.statements.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            total: Duration::from_micros(self.total_micros.load(Ordering::Relaxed)),
        }
    }
}

impl DiagnosticSink for TracingProfiler {
    fn on_statement(&self, event: &StatementEvent<'_>) {
        let micros = u64::try_from(event.elapsed.as_micros()).unwrap_or(u64::MAX);
        self.statements.fetch_add(1, Ordering::Relaxed);
        self.total_micros.fetch_add(micros, Ordering::Relaxed);

        match &event.error {
            None => info!(
                target: "dbgate::profiler",
                elapsed_us = micros,
                params = event.params,
                rows = event.rows,
                sql = event.sql,
                "statement"
            ),
            Some(error) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    target: "dbgate::profiler",
                    elapsed_us = micros,
                    params = event.params,
                    sql = event.sql,
                    error = %error,
                    "statement failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiler_counts_statements_and_failures() {
        let profiler = TracingProfiler::new();
        let ok = StatementEvent {
            sql: "SELECT 1",
            params: 0,
            elapsed: Duration::from_micros(40),
            rows: Some(1),
            error: None,
        };
        let failed = StatementEvent {
            error: Some("syntax error".into()),
            rows: None,
            ..ok.clone()
        };

        profiler.on_statement(&ok);
        profiler.on_statement(&failed);

        let stats = profiler.stats();
        assert_eq!(stats.statements, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.total, Duration::from_micros(80));
    }
}
