//! Database configuration section
//!
//! Bound from one TOML table whose keys follow the hosting application's
//! conventions (`DBType`, `Host`, `DBFilePath`, ...). String values may
//! reference environment variables as `${VAR}`; `.env` in the current
//! directory is loaded first and never overrides variables already set.

use std::env;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::dialect::DbKind;
use crate::error::{DataError, Result};

/// Default statement batch size
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default pool size handed to the driver
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// SQLite file path that selects a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

static ENV_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is valid"));

/// Connection parameters and behavioral flags for one database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DbConfig {
    /// Database kind name, parsed by [`DbConfig::validate`]
    #[serde(rename = "DBType")]
    pub db_type: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(rename = "DBFilePath")]
    pub db_file_path: Option<String>,
    pub batch_size: usize,
    pub max_connections: u32,
    pub use_profiler: bool,
    pub show_sql: bool,
    pub update_schema: bool,
    pub drop_and_create_schema: bool,
    pub validate_schema: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            db_type: String::new(),
            host: None,
            port: None,
            database: None,
            username: None,
            password: None,
            db_file_path: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            use_profiler: false,
            show_sql: false,
            update_schema: false,
            drop_and_create_schema: false,
            validate_schema: false,
        }
    }
}

impl DbConfig {
    /// File-based configuration pointing at a SQLite database.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            db_type: DbKind::Sqlite.to_string(),
            db_file_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Load `section` from a TOML file.
    ///
    /// `section` may be dotted (`app.database`). Loads `.env` before
    /// expanding `${VAR}` references.
    pub fn load(path: impl AsRef<Path>, section: &str) -> Result<Self> {
        let path = path.as_ref();
        dotenvy::dotenv().ok();

        let content = fs::read_to_string(path).map_err(|e| {
            DataError::config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content, section)
    }

    /// Bind `section` of a TOML document.
    pub fn from_toml_str(content: &str, section: &str) -> Result<Self> {
        let root: toml::Table = toml::from_str(content)
            .map_err(|e| DataError::config(format!("invalid TOML: {e}")))?;

        let mut table = root;
        for key in section.split('.').filter(|k| !k.is_empty()) {
            table = match table.remove(key) {
                Some(toml::Value::Table(inner)) => inner,
                Some(_) => {
                    return Err(DataError::config(format!(
                        "configuration section '{section}' is not a table"
                    )))
                }
                None => {
                    return Err(DataError::config(format!(
                        "configuration section '{section}' not found"
                    )))
                }
            };
        }

        let mut config: Self = toml::Value::Table(table)
            .try_into()
            .map_err(|e| DataError::config(format!("section '{section}': {e}")))?;
        config.expand_variables();
        Ok(config)
    }

    fn expand_variables(&mut self) {
        self.db_type = expand_string(&self.db_type);
        for field in [
            &mut self.host,
            &mut self.database,
            &mut self.username,
            &mut self.password,
            &mut self.db_file_path,
        ] {
            if let Some(value) = field.as_mut() {
                *value = expand_string(value);
            }
        }
    }

    /// Check that the fields required by the database kind are present.
    pub fn validate(&self) -> Result<DbKind> {
        let kind: DbKind = self.db_type.parse()?;

        if self.batch_size == 0 {
            return Err(DataError::config("BatchSize must be a positive integer"));
        }
        if self.max_connections == 0 {
            return Err(DataError::config("MaxConnections must be a positive integer"));
        }

        if kind.is_file_based() {
            if is_blank(&self.db_file_path) {
                return Err(DataError::config(format!("DBFilePath is required for {kind}")));
            }
            return Ok(kind);
        }

        let mut missing = Vec::new();
        if is_blank(&self.host) {
            missing.push("Host");
        }
        if is_blank(&self.database) {
            missing.push("Database");
        }
        if is_blank(&self.username) {
            missing.push("Username");
        }
        // an empty password is allowed, an absent one is not
        if self.password.is_none() {
            missing.push("Password");
        }
        if !missing.is_empty() {
            return Err(DataError::config(format!(
                "{} required for {kind}",
                missing.join(", ")
            )));
        }
        Ok(kind)
    }

    /// Whether this is a private in-memory SQLite database.
    pub fn is_in_memory(&self) -> bool {
        self.db_file_path.as_deref().map(str::trim) == Some(IN_MEMORY_PATH)
    }

    /// Driver connection URL for an already validated kind.
    pub fn connection_url(&self, kind: DbKind) -> Result<String> {
        let scheme = match kind {
            DbKind::Postgres => "postgres",
            DbKind::MySql => "mysql",
            DbKind::Sqlite if self.is_in_memory() => return Ok("sqlite::memory:".to_owned()),
            DbKind::Sqlite => {
                let path = self.db_file_path.as_deref().unwrap_or_default().trim();
                return Ok(format!("sqlite://{path}?mode=rwc"));
            }
        };
        let host = self.host.as_deref().unwrap_or_default();
        let mut url = Url::parse(&format!("{scheme}://localhost"))
            .map_err(|e| DataError::config(format!("invalid URL scheme: {e}")))?;
        url.set_host(Some(host))
            .map_err(|e| DataError::config(format!("invalid Host '{host}': {e}")))?;
        url.set_port(self.port.or(kind.default_port()))
            .map_err(|_| DataError::config("invalid Port"))?;
        url.set_username(self.username.as_deref().unwrap_or_default())
            .map_err(|_| DataError::config("invalid Username"))?;
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            url.set_password(Some(password))
                .map_err(|_| DataError::config("invalid Password"))?;
        }
        url.set_path(self.database.as_deref().unwrap_or_default());
        Ok(url.into())
    }

    /// Connection target for log lines; never includes credentials.
    pub fn describe(&self, kind: DbKind) -> String {
        if kind.is_file_based() {
            format!("{kind} {}", self.db_file_path.as_deref().unwrap_or_default())
        } else {
            format!(
                "{kind} {}:{}/{}",
                self.host.as_deref().unwrap_or_default(),
                self.port.or(kind.default_port()).unwrap_or_default(),
                self.database.as_deref().unwrap_or_default()
            )
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Replace `${VAR}` with the variable's value; unset variables expand to "".
fn expand_string(s: &str) -> String {
    ENV_VAR
        .replace_all(s, |caps: &Captures<'_>| env::var(&caps[1]).unwrap_or_default())
        .into_owned()
}
