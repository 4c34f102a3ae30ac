//! Generic per-entity repository
//!
//! Every call opens its own session and releases it before returning.
//! Reads run without a transaction. Writes run in one transaction that is
//! committed once after all entities are processed; any error before the
//! commit drops the transaction, which rolls it back.
//!
//! Calls are independent: two repository calls are never atomic together.
//! Open a session and use its `Transaction` directly when they must be.

use std::fmt;
use std::marker::PhantomData;

use tracing::debug;

use crate::error::Result;
use crate::factory::SessionFactory;
use crate::filter::Filter;
use crate::mapping::Entity;
use crate::page::Page;
use crate::params::Params;
use crate::value::{FromValue, Record, Value};

/// Repository bound to entity type `T`
pub struct Repository<T> {
    factory: SessionFactory,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("table", &T::MAPPING.table)
            .finish()
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(factory: SessionFactory) -> Self {
        Self {
            factory,
            _entity: PhantomData,
        }
    }

    pub fn factory(&self) -> &SessionFactory {
        &self.factory
    }

    /// Load by primary key; `None` when no row matches.
    pub async fn get_by_id(&self, id: impl Into<Value>) -> Result<Option<T>> {
        let mut session = self.factory.open_session().await?;
        session.get(id).await
    }

    /// Every entity within `page`. Paged results are ordered by id.
    pub async fn get_all(&self, page: Page) -> Result<Vec<T>> {
        self.get_by_predicate(&Filter::all(), page).await
    }

    pub async fn get_by_predicate(&self, filter: &Filter, page: Page) -> Result<Vec<T>> {
        let mut session = self.factory.open_session().await?;
        session.list(filter, page).await
    }

    /// Number of rows `get_by_predicate(filter, Page::all())` would return.
    pub async fn get_count_by_predicate(&self, filter: &Filter) -> Result<u64> {
        let mut session = self.factory.open_session().await?;
        session.count::<T>(filter).await
    }

    /// The one entity matching `filter`; fails on zero or several.
    pub async fn get_single_by_predicate(&self, filter: &Filter) -> Result<T> {
        let mut session = self.factory.open_session().await?;
        session.single(filter).await
    }

    /// Raw SQL mapped onto `T`. Rows must carry every mapped column.
    pub async fn get_by_raw_sql(
        &self,
        sql: &str,
        params: Option<&Params>,
        page: Page,
    ) -> Result<Vec<T>> {
        let mut session = self.factory.open_session().await?;
        session.query_as(sql, params, page).await
    }

    /// Raw SQL as untyped rows.
    pub async fn get_records_by_raw_sql(
        &self,
        sql: &str,
        params: Option<&Params>,
        page: Page,
    ) -> Result<Vec<Record>> {
        let mut session = self.factory.open_session().await?;
        session.query_records(sql, params, page).await
    }

    pub async fn execute_scalar<S: FromValue>(&self, sql: &str, params: Option<&Params>) -> Result<S> {
        let mut session = self.factory.open_session().await?;
        session.scalar(sql, params).await
    }

    /// Run a statement in its own transaction and return the affected rows.
    pub async fn execute_non_query(&self, sql: &str, params: Option<&Params>) -> Result<u64> {
        let mut session = self.factory.open_session().await?;
        let mut tx = session.begin().await?;
        let affected = tx.execute(sql, params).await?;
        tx.commit().await?;
        debug!(table = T::MAPPING.table, affected, "non-query committed");
        Ok(affected)
    }

    pub async fn insert(&self, entity: &mut T) -> Result<()> {
        let mut session = self.factory.open_session().await?;
        let mut tx = session.begin().await?;
        tx.insert(entity).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn insert_all(&self, entities: &mut [T]) -> Result<()> {
        let mut session = self.factory.open_session().await?;
        let mut tx = session.begin().await?;
        tx.insert_all(entities).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn update(&self, entity: &T) -> Result<()> {
        let mut session = self.factory.open_session().await?;
        let mut tx = session.begin().await?;
        tx.update(entity).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn update_all(&self, entities: &[T]) -> Result<()> {
        let mut session = self.factory.open_session().await?;
        let mut tx = session.begin().await?;
        tx.update_all(entities).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn insert_or_update(&self, entity: &mut T) -> Result<()> {
        let mut session = self.factory.open_session().await?;
        let mut tx = session.begin().await?;
        tx.save(entity).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn insert_or_update_all(&self, entities: &mut [T]) -> Result<()> {
        let mut session = self.factory.open_session().await?;
        let mut tx = session.begin().await?;
        tx.save_all(entities).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, entity: &T) -> Result<()> {
        let mut session = self.factory.open_session().await?;
        let mut tx = session.begin().await?;
        tx.delete(entity).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete_all(&self, entities: &[T]) -> Result<()> {
        let mut session = self.factory.open_session().await?;
        let mut tx = session.begin().await?;
        tx.delete_all(entities).await?;
        tx.commit().await?;
        Ok(())
    }
}
