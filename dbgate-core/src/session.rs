//! Sessions and transactions
//!
//! A `Session` owns one pooled connection for the length of a unit of work
//! and returns it to the pool when dropped. Writes go through a
//! `Transaction`, which rolls back on drop unless `commit` was awaited, so
//! every exit path that skips the commit discards the work.
//!
//! ```ignore
//! let mut session = factory.open_session().await?;
//! let mut tx = session.begin().await?;
//! tx.insert(&mut order).await?;
//! tx.update(&customer).await?;
//! tx.commit().await?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, Connection};
use tracing::debug;

use crate::dialect::DbKind;
use crate::error::{DataError, Result};
use crate::executor::Engine;
use crate::filter::Filter;
use crate::mapping::{Entity, IdStrategy};
use crate::page::Page;
use crate::params::Params;
use crate::queries;
use crate::value::{FromValue, Record, Value};

/// Identity of an entity, treating an explicit `Value::Null` as none.
fn identity<T: Entity>(entity: &T) -> Option<Value> {
    entity.id().filter(|id| !id.is_null())
}

fn require_id<T: Entity>(entity: &T) -> Result<Value> {
    identity(entity).ok_or(DataError::TransientEntity {
        table: T::MAPPING.table,
    })
}

fn values_of<T: Entity>(entity: &T) -> Result<Vec<Value>> {
    let values = entity.values();
    let expected = T::MAPPING.columns.len();
    if values.len() != expected {
        return Err(DataError::mapping(format!(
            "entity of table '{}' produced {} values for {} mapped columns",
            T::MAPPING.table,
            values.len(),
            expected
        )));
    }
    Ok(values)
}

/// Exactly one row, or `NoResult` / `MultipleResults`.
fn unique(mut rows: Vec<Record>) -> Result<Record> {
    match rows.len() {
        0 => Err(DataError::NoResult),
        1 => Ok(rows.remove(0)),
        count => Err(DataError::MultipleResults { count }),
    }
}

/// Operations over one borrowed connection, shared by sessions and
/// transactions.
struct Runner<'c> {
    engine: &'c Engine,
    conn: &'c mut AnyConnection,
}

impl<'c> Runner<'c> {
    fn new(engine: &'c Engine, conn: &'c mut AnyConnection) -> Self {
        Self { engine, conn }
    }

    fn kind(&self) -> DbKind {
        self.engine.kind
    }

    async fn get<T: Entity>(&mut self, id: Value) -> Result<Option<T>> {
        let stmt = queries::select_by_id(self.kind(), &T::MAPPING, id);
        let rows = self.engine.fetch_up_to(self.conn, &stmt, 1).await?;
        rows.first().map(T::from_record).transpose()
    }

    async fn exists<T: Entity>(&mut self, id: Value) -> Result<bool> {
        let stmt = queries::exists(self.kind(), &T::MAPPING, id);
        let rows = self.engine.fetch_up_to(self.conn, &stmt, 1).await?;
        Ok(!rows.is_empty())
    }

    async fn list<T: Entity>(&mut self, filter: &Filter, page: Page) -> Result<Vec<T>> {
        let stmt = queries::select_where(self.kind(), &T::MAPPING, filter, page)?;
        let rows = self.engine.fetch_all(self.conn, &stmt).await?;
        rows.iter().map(T::from_record).collect()
    }

    async fn count<T: Entity>(&mut self, filter: &Filter) -> Result<u64> {
        let stmt = queries::count_where(self.kind(), &T::MAPPING, filter)?;
        let row = unique(self.engine.fetch_up_to(self.conn, &stmt, 2).await?)?;
        let count = row.into_values().into_iter().next().unwrap_or_default();
        let count = i64::from_value(count)?;
        u64::try_from(count).map_err(|_| DataError::mapping(format!("negative count {count}")))
    }

    async fn single<T: Entity>(&mut self, filter: &Filter) -> Result<T> {
        let stmt = queries::select_where(self.kind(), &T::MAPPING, filter, Page::new(0, 2))?;
        let row = unique(self.engine.fetch_all(self.conn, &stmt).await?)?;
        T::from_record(&row)
    }

    async fn records(&mut self, sql: &str, params: Option<&Params>, page: Page) -> Result<Vec<Record>> {
        let stmt = queries::raw(self.kind(), sql, params, page)?;
        self.engine.fetch_all(self.conn, &stmt).await
    }

    async fn scalar<S: FromValue>(&mut self, sql: &str, params: Option<&Params>) -> Result<S> {
        let stmt = queries::raw(self.kind(), sql, params, Page::all())?;
        let row = unique(self.engine.fetch_up_to(self.conn, &stmt, 2).await?)?;
        if row.len() != 1 {
            return Err(DataError::ScalarShape { columns: row.len() });
        }
        let value = row.into_values().into_iter().next().unwrap_or_default();
        S::from_value(value)
    }

    async fn execute(&mut self, sql: &str, params: Option<&Params>) -> Result<u64> {
        let stmt = queries::raw(self.kind(), sql, params, Page::all())?;
        Ok(self.engine.execute(self.conn, &stmt).await?.rows_affected())
    }

    async fn insert<T: Entity>(&mut self, entity: &mut T) -> Result<()> {
        let mapping = &T::MAPPING;
        let values = values_of(entity)?;

        if mapping.id.strategy == IdStrategy::Assigned {
            let id = require_id(entity)?;
            let stmt = queries::insert(self.kind(), mapping, Some(&id), &values);
            self.engine.execute(self.conn, &stmt).await?;
            return Ok(());
        }

        if let Some(id) = identity(entity) {
            return Err(DataError::AlreadyPersistent {
                table: mapping.table,
                id: id.to_string(),
            });
        }
        let stmt = queries::insert(self.kind(), mapping, None, &values);
        let generated = if self.kind().supports_returning() {
            let rows = self.engine.fetch_all(self.conn, &stmt).await?;
            rows.first()
                .and_then(|row| row.iter().next())
                .and_then(|(_, value)| value.as_i64())
        } else {
            self.engine.execute(self.conn, &stmt).await?.last_insert_id()
        };
        let id = generated.ok_or_else(|| {
            DataError::mapping(format!(
                "insert into '{}' did not report a generated id",
                mapping.table
            ))
        })?;
        entity.set_generated_id(id);
        Ok(())
    }

    async fn insert_all<T: Entity>(&mut self, entities: &mut [T]) -> Result<()> {
        let mapping = &T::MAPPING;
        if mapping.id.strategy == IdStrategy::Generated {
            for entity in entities.iter_mut() {
                self.insert(entity).await?;
            }
            return Ok(());
        }

        let chunk = self.engine.chunk_size(mapping.columns.len() + 1);
        for batch in entities.chunks(chunk) {
            let rows = batch
                .iter()
                .map(|entity| Ok((require_id(entity)?, values_of(entity)?)))
                .collect::<Result<Vec<_>>>()?;
            let stmt = queries::insert_rows(self.kind(), mapping, &rows);
            self.engine.execute(self.conn, &stmt).await?;
        }
        Ok(())
    }

    async fn update<T: Entity>(&mut self, entity: &T) -> Result<()> {
        let mapping = &T::MAPPING;
        let id = require_id(entity)?;
        let values = values_of(entity)?;

        let affected = if mapping.columns.is_empty() {
            0
        } else {
            let stmt = queries::update(self.kind(), mapping, id.clone(), &values);
            self.engine.execute(self.conn, &stmt).await?.rows_affected()
        };
        // MySQL reports changed rows, not matched rows, so zero is not proof
        if affected == 0 && !self.exists::<T>(id.clone()).await? {
            return Err(DataError::stale(mapping.table, id));
        }
        Ok(())
    }

    async fn save<T: Entity>(&mut self, entity: &mut T) -> Result<()> {
        let strategy = T::MAPPING.id.strategy;
        let Some(id) = identity(entity) else {
            return match strategy {
                IdStrategy::Generated => self.insert(entity).await,
                IdStrategy::Assigned => Err(DataError::TransientEntity {
                    table: T::MAPPING.table,
                }),
            };
        };
        let persisted = match strategy {
            IdStrategy::Generated => true,
            IdStrategy::Assigned => self.exists::<T>(id).await?,
        };
        if persisted {
            self.update(entity).await
        } else {
            self.insert(entity).await
        }
    }

    async fn delete<T: Entity>(&mut self, entity: &T) -> Result<()> {
        let mapping = &T::MAPPING;
        let id = require_id(entity)?;
        let stmt = queries::delete_by_id(self.kind(), mapping, id.clone());
        if self.engine.execute(self.conn, &stmt).await?.rows_affected() == 0 {
            return Err(DataError::stale(mapping.table, id));
        }
        Ok(())
    }

    async fn delete_all<T: Entity>(&mut self, entities: &[T]) -> Result<()> {
        let mapping = &T::MAPPING;
        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(entities.len());
        for entity in entities {
            let id = require_id(entity)?;
            if seen.insert(id.to_string()) {
                ids.push(id);
            }
        }

        for batch in ids.chunks(self.engine.chunk_size(1)) {
            let stmt = queries::select_ids_in(self.kind(), mapping, batch);
            let found: HashSet<String> = self
                .engine
                .fetch_all(self.conn, &stmt)
                .await?
                .into_iter()
                .filter_map(|row| row.into_values().into_iter().next())
                .map(|id| id.to_string())
                .collect();
            if let Some(missing) = batch.iter().find(|id| !found.contains(&id.to_string())) {
                return Err(DataError::stale(mapping.table, missing));
            }

            let stmt = queries::delete_in(self.kind(), mapping, batch);
            let affected = self.engine.execute(self.conn, &stmt).await?.rows_affected();
            debug!(table = mapping.table, affected, "batch delete");
        }
        Ok(())
    }
}

/// One pooled connection held for a unit of work.
pub struct Session {
    conn: PoolConnection<Any>,
    engine: Arc<Engine>,
}

impl Session {
    pub(crate) fn new(conn: PoolConnection<Any>, engine: Arc<Engine>) -> Self {
        Self { conn, engine }
    }

    fn runner(&mut self) -> Runner<'_> {
        Runner::new(&self.engine, &mut self.conn)
    }

    pub fn kind(&self) -> DbKind {
        self.engine.kind
    }

    /// Load by primary key; `None` when no row matches.
    pub async fn get<T: Entity>(&mut self, id: impl Into<Value>) -> Result<Option<T>> {
        self.runner().get(id.into()).await
    }

    pub async fn list<T: Entity>(&mut self, filter: &Filter, page: Page) -> Result<Vec<T>> {
        self.runner().list(filter, page).await
    }

    /// Native `COUNT(*)` over the same filter `list` uses.
    pub async fn count<T: Entity>(&mut self, filter: &Filter) -> Result<u64> {
        self.runner().count::<T>(filter).await
    }

    pub async fn single<T: Entity>(&mut self, filter: &Filter) -> Result<T> {
        self.runner().single(filter).await
    }

    pub async fn query_records(
        &mut self,
        sql: &str,
        params: Option<&Params>,
        page: Page,
    ) -> Result<Vec<Record>> {
        self.runner().records(sql, params, page).await
    }

    /// Raw SQL whose rows carry every column `T` maps.
    pub async fn query_as<T: Entity>(
        &mut self,
        sql: &str,
        params: Option<&Params>,
        page: Page,
    ) -> Result<Vec<T>> {
        let rows = self.runner().records(sql, params, page).await?;
        rows.iter().map(T::from_record).collect()
    }

    /// Exactly one row with exactly one column.
    pub async fn scalar<S: FromValue>(&mut self, sql: &str, params: Option<&Params>) -> Result<S> {
        self.runner().scalar(sql, params).await
    }

    pub async fn begin(&mut self) -> Result<Transaction<'_>> {
        let tx = Connection::begin(&mut *self.conn).await?;
        Ok(Transaction {
            tx,
            engine: Arc::clone(&self.engine),
        })
    }
}

/// A transaction on a session's connection.
///
/// Dropping it without `commit` rolls back.
pub struct Transaction<'s> {
    tx: sqlx::Transaction<'s, Any>,
    engine: Arc<Engine>,
}

impl Transaction<'_> {
    fn runner(&mut self) -> Runner<'_> {
        Runner::new(&self.engine, &mut self.tx)
    }

    pub async fn get<T: Entity>(&mut self, id: impl Into<Value>) -> Result<Option<T>> {
        self.runner().get(id.into()).await
    }

    pub async fn list<T: Entity>(&mut self, filter: &Filter, page: Page) -> Result<Vec<T>> {
        self.runner().list(filter, page).await
    }

    pub async fn count<T: Entity>(&mut self, filter: &Filter) -> Result<u64> {
        self.runner().count::<T>(filter).await
    }

    /// Raw statement; returns the affected-row count as the driver reports it.
    pub async fn execute(&mut self, sql: &str, params: Option<&Params>) -> Result<u64> {
        self.runner().execute(sql, params).await
    }

    /// Persist a new entity. Generated keys are written back into it.
    pub async fn insert<T: Entity>(&mut self, entity: &mut T) -> Result<()> {
        self.runner().insert(entity).await
    }

    pub async fn insert_all<T: Entity>(&mut self, entities: &mut [T]) -> Result<()> {
        self.runner().insert_all(entities).await
    }

    pub async fn update<T: Entity>(&mut self, entity: &T) -> Result<()> {
        self.runner().update(entity).await
    }

    pub async fn update_all<T: Entity>(&mut self, entities: &[T]) -> Result<()> {
        let mut runner = self.runner();
        for entity in entities {
            runner.update(entity).await?;
        }
        Ok(())
    }

    /// Insert when the entity has no persisted row yet, update otherwise.
    pub async fn save<T: Entity>(&mut self, entity: &mut T) -> Result<()> {
        self.runner().save(entity).await
    }

    pub async fn save_all<T: Entity>(&mut self, entities: &mut [T]) -> Result<()> {
        let mut runner = self.runner();
        for entity in entities.iter_mut() {
            runner.save(entity).await?;
        }
        Ok(())
    }

    pub async fn delete<T: Entity>(&mut self, entity: &T) -> Result<()> {
        self.runner().delete(entity).await
    }

    pub async fn delete_all<T: Entity>(&mut self, entities: &[T]) -> Result<()> {
        self.runner().delete_all(entities).await
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
