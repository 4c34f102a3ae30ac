//! Registration entry point for hosting applications

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::DbConfig;
use crate::diagnostics::DiagnosticSink;
use crate::error::Result;
use crate::factory::{SessionFactory, SessionFactoryBuilder};
use crate::mapping::{Entity, Mappings};
use crate::repository::Repository;

/// Shared data-access services: the bound configuration and the singleton
/// session factory built from it.
#[derive(Debug, Clone)]
pub struct DataServices {
    inner: Arc<DataServicesInner>,
}

#[derive(Debug)]
struct DataServicesInner {
    config: DbConfig,
    factory: SessionFactory,
}

impl DataServices {
    /// Bind `section` of the TOML file at `source` and build the factory.
    pub async fn register(
        source: impl AsRef<Path>,
        section: &str,
        mappings: Mappings,
    ) -> Result<Self> {
        let config = DbConfig::load(source, section)?;
        Self::from_config(config, mappings, None).await
    }

    /// Build from an already bound configuration, optionally with a sink.
    pub async fn from_config(
        config: DbConfig,
        mappings: Mappings,
        diagnostics: Option<Arc<dyn DiagnosticSink>>,
    ) -> Result<Self> {
        let mut builder = SessionFactoryBuilder::new(config.clone(), mappings);
        if let Some(sink) = diagnostics {
            builder = builder.diagnostics(sink);
        }
        let factory = builder.build().await?;
        info!(kind = %factory.kind(), mappings = factory.mappings().len(), "data services registered");

        Ok(Self {
            inner: Arc::new(DataServicesInner { config, factory }),
        })
    }

    pub fn config(&self) -> &DbConfig {
        &self.inner.config
    }

    pub fn factory(&self) -> &SessionFactory {
        &self.inner.factory
    }

    pub fn repository<T: Entity>(&self) -> Repository<T> {
        Repository::new(self.inner.factory.clone())
    }
}
