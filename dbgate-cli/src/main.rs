//! dbgate CLI - raw SQL and connection checks through the dbgate facade
//!
//! Reads one configuration section (default `[database]`) from a TOML file,
//! builds the session factory exactly as a hosting application would, and
//! runs a single command against it:
//! - `check`: connect and round-trip a trivial query
//! - `query`: print result rows as JSON lines
//! - `exec`: run a statement in a transaction and print the affected rows
//! - `scalar`: print a single value

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dbgate_core::{DataServices, DbConfig, Mappings};
use tracing::debug;

mod commands;
mod tracing_setup;

use commands::sql::{QueryArgs, SqlArgs};
use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "dbgate",
    author,
    version,
    about = "Run SQL through a configured dbgate session factory"
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Configuration file (TOML)
    #[arg(
        long,
        short = 'c',
        global = true,
        env = "DBGATE_CONFIG",
        default_value = "dbgate.toml"
    )]
    config: PathBuf,

    /// Table in the configuration file holding the database keys
    #[arg(long, global = true, default_value = "database")]
    section: String,

    /// Echo every statement (overrides ShowSql)
    #[arg(long, global = true)]
    show_sql: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect, apply the configured schema policy and run a trivial query
    Check,
    /// Run a query and print each row as a JSON object
    Query(QueryArgs),
    /// Run a statement in its own transaction and print the affected rows
    Exec(SqlArgs),
    /// Run a query that returns exactly one value and print it
    Scalar(SqlArgs),
}

async fn connect(cli: &Cli) -> Result<DataServices> {
    let mut config = DbConfig::load(&cli.config, &cli.section)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    config.show_sql |= cli.show_sql;
    debug!(section = %cli.section, db_type = %config.db_type, "configuration loaded");

    DataServices::from_config(config, Mappings::new(), None)
        .await
        .context("Failed to open database")
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    tracing_setup::init(&TracingConfig { debug: cli.debug }).ok();

    let services = connect(&cli).await?;
    let result = match &cli.command {
        Commands::Check => commands::run_check(&services).await,
        Commands::Query(args) => commands::run_query(&services, args).await,
        Commands::Exec(args) => commands::run_exec(&services, args).await,
        Commands::Scalar(args) => commands::run_scalar(&services, args).await,
    };
    services.factory().close().await;
    result
}
