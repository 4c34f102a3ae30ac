//! Command implementations for the dbgate CLI

pub mod check;
pub mod sql;

// Re-export dispatcher functions for flat access from main.rs
pub use check::run_check;
pub use sql::{run_exec, run_query, run_scalar};
