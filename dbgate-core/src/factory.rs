//! Session factory construction
//!
//! `SessionFactoryBuilder` turns a validated configuration and a set of
//! mappings into a long-lived `SessionFactory`:
//!
//! 1. the configuration is validated and the database kind selected
//! 2. the driver pool is opened with the configured connection limit
//! 3. the diagnostic sink is installed
//! 4. schema policy runs once
//!
//! Any failure aborts the build; there is no partially built factory.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::any::{install_default_drivers, AnyConnectOptions, AnyPoolOptions};
use sqlx::{AnyPool, ConnectOptions};
use tracing::{info, instrument};

use crate::config::DbConfig;
use crate::dialect::DbKind;
use crate::diagnostics::{DiagnosticSink, NoopSink, TracingProfiler};
use crate::error::{DataError, Result};
use crate::executor::{Engine, EngineSettings};
use crate::mapping::Mappings;
use crate::schema::{self, SchemaPolicy};
use crate::session::Session;

/// How long a session waits for a pooled connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds a [`SessionFactory`] from configuration plus mappings.
#[derive(Debug)]
pub struct SessionFactoryBuilder {
    config: DbConfig,
    mappings: Mappings,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
}

impl SessionFactoryBuilder {
    pub fn new(config: DbConfig, mappings: Mappings) -> Self {
        Self {
            config,
            mappings,
            diagnostics: None,
        }
    }

    /// Receive every statement event. Takes precedence over `UseProfiler`.
    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    fn schema_policy(&self) -> SchemaPolicy {
        SchemaPolicy {
            update: self.config.update_schema,
            drop_and_create: self.config.drop_and_create_schema,
            validate: self.config.validate_schema,
        }
    }

    #[instrument(skip_all, fields(db_type = %self.config.db_type))]
    pub async fn build(self) -> Result<SessionFactory> {
        let kind = self.config.validate()?;
        let policy = self.schema_policy();
        let url = self.config.connection_url(kind)?;
        let settings = EngineSettings::new(self.config.batch_size, self.config.show_sql);

        install_default_drivers();
        let mut options = AnyConnectOptions::from_str(&url)
            .map_err(|e| DataError::config(format!("invalid connection settings: {e}")))?;
        if !settings.show_sql {
            options = options.disable_statement_logging();
        }

        // every connection to ":memory:" is a separate database, so keep one alive
        let pool_options = if self.config.is_in_memory() {
            AnyPoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            AnyPoolOptions::new().max_connections(self.config.max_connections)
        };
        let pool = pool_options
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;
        info!(
            database = %self.config.describe(kind),
            max_connections = pool.options().get_max_connections(),
            "connected"
        );

        let sink: Arc<dyn DiagnosticSink> = match self.diagnostics {
            Some(sink) => sink,
            None if self.config.use_profiler => {
                info!("statement profiler enabled");
                Arc::new(TracingProfiler::new())
            }
            None => Arc::new(NoopSink),
        };
        let engine = Arc::new(Engine {
            kind,
            settings,
            sink,
        });

        if !policy.is_noop() {
            let mut conn = pool.acquire().await?;
            let applied = schema::apply(&engine, &mut conn, &self.mappings, policy).await;
            drop(conn);
            if let Err(err) = applied {
                pool.close().await;
                return Err(err);
            }
        }

        Ok(SessionFactory {
            inner: Arc::new(FactoryInner {
                pool,
                engine,
                mappings: self.mappings,
            }),
        })
    }
}

/// Long-lived, thread-safe source of sessions.
///
/// Cheap to clone; every clone shares the same pool.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    inner: Arc<FactoryInner>,
}

#[derive(Debug)]
struct FactoryInner {
    pool: AnyPool,
    engine: Arc<Engine>,
    mappings: Mappings,
}

impl SessionFactory {
    /// Acquire a pooled connection for one unit of work.
    pub async fn open_session(&self) -> Result<Session> {
        let conn = self.inner.pool.acquire().await?;
        Ok(Session::new(conn, Arc::clone(&self.inner.engine)))
    }

    pub fn kind(&self) -> DbKind {
        self.inner.engine.kind
    }

    pub fn settings(&self) -> EngineSettings {
        self.inner.engine.settings
    }

    pub fn mappings(&self) -> &Mappings {
        &self.inner.mappings
    }

    /// Close the pool; sessions already open finish their work first.
    pub async fn close(&self) {
        self.inner.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.pool.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::col;
    use crate::mapping::{Column, Entity, IdColumn, Mapping};
    use crate::page::Page;
    use crate::params::Params;
    use crate::repository::Repository;
    use crate::value::{Record, Value};
    use url::Url;

    // Integration tests require a real database
    // Run with: DATABASE_URL=postgres://... cargo test -p dbgate-core

    #[derive(Debug, Clone, PartialEq)]
    struct Probe {
        id: Option<i64>,
        label: String,
    }

    impl Entity for Probe {
        const MAPPING: Mapping = Mapping::new(
            "dbgate_probe",
            IdColumn::generated("id"),
            &[Column::string("label", 64)],
        );

        fn id(&self) -> Option<Value> {
            self.id.map(Value::Int)
        }

        fn set_generated_id(&mut self, id: i64) {
            self.id = Some(id);
        }

        fn values(&self) -> Vec<Value> {
            vec![self.label.clone().into()]
        }

        fn from_record(record: &Record) -> Result<Self> {
            Ok(Self {
                id: record.get_as("id")?,
                label: record.get_as("label")?,
            })
        }
    }

    fn config_from_url(raw: &str) -> DbConfig {
        let url = Url::parse(raw).expect("DATABASE_URL must be a URL");
        DbConfig {
            db_type: url.scheme().to_owned(),
            host: url.host_str().map(str::to_owned),
            port: url.port(),
            database: Some(url.path().trim_start_matches('/').to_owned()),
            username: Some(url.username().to_owned()),
            password: Some(url.password().unwrap_or_default().to_owned()),
            drop_and_create_schema: true,
            validate_schema: true,
            ..DbConfig::default()
        }
    }

    async fn server_factory() -> SessionFactory {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        SessionFactoryBuilder::new(config_from_url(&url), Mappings::new().with::<Probe>())
            .build()
            .await
            .expect("factory build failed")
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn server_round_trip() {
        let factory = server_factory().await;
        let repo = Repository::<Probe>::new(factory);

        let mut probe = Probe {
            id: None,
            label: "first".into(),
        };
        repo.insert(&mut probe).await.expect("insert failed");
        let fetched = repo
            .get_by_id(probe.id.expect("generated id"))
            .await
            .expect("get failed");
        assert_eq!(fetched, Some(probe.clone()));

        let params = Params::new().with("label", "first");
        let count: i64 = repo
            .execute_scalar("SELECT COUNT(*) FROM dbgate_probe WHERE label = :label", Some(&params))
            .await
            .expect("scalar failed");
        assert_eq!(count, 1);
        assert_eq!(
            repo.get_count_by_predicate(&col("label").eq("first"))
                .await
                .expect("count failed"),
            1
        );
        assert_eq!(repo.get_all(Page::new(1, 10)).await.expect("page failed").len(), 0);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn concurrent_sessions() {
        let factory = server_factory().await;

        // Spawn 10 concurrent tasks
        let handles: Vec<_> = (0..10_i64)
            .map(|i| {
                let factory = factory.clone();
                tokio::spawn(async move {
                    let mut session = factory.open_session().await.expect("session failed");
                    let params = Params::new().with("i", i);
                    session
                        .scalar::<i64>("SELECT :i + 0", Some(&params))
                        .await
                        .expect("concurrent query failed")
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.await.expect("task panicked");
            assert_eq!(result, i as i64);
        }
    }
}
