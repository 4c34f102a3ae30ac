//! Entity mapping definitions
//!
//! # Design Principles
//!
//! - Mappings are plain `const` data: one table, one id column, ordered columns
//! - An entity converts itself to column values and back; nothing is inferred
//! - The same definitions drive persistence, filters and schema reconciliation

use crate::error::{DataError, Result};
use crate::value::{Record, Value};

/// Storage type of a mapped column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// 32-bit integer
    Integer,
    /// 64-bit integer
    BigInt,
    /// Double precision float
    Double,
    /// Unbounded text
    Text,
    /// Bounded text
    String(u32),
    Boolean,
    /// Raw bytes
    Binary,
}

/// A mapped, non-identity column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

impl Column {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
        }
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub const fn big_int(name: &'static str) -> Self {
        Self::new(name, ColumnType::BigInt)
    }

    pub const fn double(name: &'static str) -> Self {
        Self::new(name, ColumnType::Double)
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub const fn string(name: &'static str, len: u32) -> Self {
        Self::new(name, ColumnType::String(len))
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, ColumnType::Boolean)
    }

    pub const fn binary(name: &'static str) -> Self {
        Self::new(name, ColumnType::Binary)
    }

    /// Allow NULL in this column.
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Who assigns an entity's identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStrategy {
    /// The store generates a 64-bit integer on insert
    Generated,
    /// The caller sets the id before the first save
    Assigned,
}

/// Primary key column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdColumn {
    pub name: &'static str,
    pub ty: ColumnType,
    pub strategy: IdStrategy,
}

impl IdColumn {
    /// Store-generated `BigInt` key.
    pub const fn generated(name: &'static str) -> Self {
        Self {
            name,
            ty: ColumnType::BigInt,
            strategy: IdStrategy::Generated,
        }
    }

    /// Caller-assigned key of the given type.
    pub const fn assigned(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            strategy: IdStrategy::Assigned,
        }
    }
}

/// How one entity type maps onto one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub table: &'static str,
    pub id: IdColumn,
    pub columns: &'static [Column],
}

impl Mapping {
    pub const fn new(table: &'static str, id: IdColumn, columns: &'static [Column]) -> Self {
        Self { table, id, columns }
    }

    /// Type of a mapped column, id included.
    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        if self.id.name == name {
            return Some(self.id.ty);
        }
        self.columns.iter().find(|c| c.name == name).map(|c| c.ty)
    }

    /// Id column first, then the mapped columns in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.id.name).chain(self.columns.iter().map(|c| c.name))
    }

    /// Fails with `Mapping` unless `name` is the id or a mapped column.
    pub fn require_column(&self, name: &str) -> Result<ColumnType> {
        self.column_type(name).ok_or_else(|| {
            DataError::mapping(format!(
                "table '{}' has no mapped column '{}'",
                self.table, name
            ))
        })
    }
}

/// A type the repository can persist.
///
/// `values()` must yield exactly one value per entry of `MAPPING.columns`, in
/// the same order. The id is never part of `values()`.
///
/// ```ignore
/// impl Entity for User {
///     const MAPPING: Mapping = Mapping::new(
///         "users",
///         IdColumn::generated("id"),
///         &[Column::string("name", 100), Column::text("email").nullable()],
///     );
///     fn id(&self) -> Option<Value> { self.id.map(Value::Int) }
///     fn set_generated_id(&mut self, id: i64) { self.id = Some(id) }
///     fn values(&self) -> Vec<Value> { vec![self.name.clone().into(), self.email.clone().into()] }
///     fn from_record(r: &Record) -> Result<Self> { ... }
/// }
/// ```
pub trait Entity: Sized + Send + Sync + Unpin + 'static {
    const MAPPING: Mapping;

    /// Current identity, `None` while transient.
    fn id(&self) -> Option<Value>;

    /// Receives the key generated by the store after an insert.
    fn set_generated_id(&mut self, _id: i64) {}

    /// Column values in `MAPPING.columns` order.
    fn values(&self) -> Vec<Value>;

    /// Rebuild an entity from a row that carries every mapped column.
    fn from_record(record: &Record) -> Result<Self>;
}

/// The set of mappings a session factory reconciles at startup.
#[derive(Debug, Clone, Default)]
pub struct Mappings {
    items: Vec<Mapping>,
}

impl Mappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity's mapping. Registering a table twice is a no-op.
    pub fn with<T: Entity>(self) -> Self {
        self.add(T::MAPPING)
    }

    pub fn add(mut self, mapping: Mapping) -> Self {
        if !self.items.iter().any(|m| m.table == mapping.table) {
            self.items.push(mapping);
        }
        self
    }

    pub fn get(&self, table: &str) -> Option<&Mapping> {
        self.items.iter().find(|m| m.table == table)
    }

    /// Mappings in registration order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Mapping> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
