//! Typed values and dynamic rows
//!
//! `Value` is the tagged union every bind parameter and every decoded column
//! passes through. `Record` is an ordered column-name → `Value` row used for
//! raw SQL results and as the input to `Entity::from_record`.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use sqlx::any::{AnyArguments, AnyRow, AnyTypeInfoKind};
use sqlx::query::Query;
use sqlx::{Any, Column as _, Row, ValueRef as _};

use crate::error::{DataError, Result};
use crate::mapping::ColumnType;

pub(crate) type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

/// A single SQL value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type label used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Bytes(b) => serializer.serialize_bytes(b),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident($conv:expr)),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant($conv(v))
                }
            }
        )*
    };
}

value_from! {
    bool => Bool(|v| v),
    i16 => Int(i64::from),
    i32 => Int(i64::from),
    i64 => Int(|v| v),
    u32 => Int(i64::from),
    f32 => Float(f64::from),
    f64 => Float(|v| v),
    String => Text(|v| v),
    &str => Text(str::to_owned),
    &String => Text(String::clone),
    Vec<u8> => Bytes(|v| v),
    &[u8] => Bytes(<[u8]>::to_vec),
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Conversion out of a decoded `Value`.
///
/// Used for execute-scalar results and `Record` accessors. Integers widen to
/// floats and 0/1 integers read as booleans, because SQLite and MySQL store
/// booleans as integers.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch(expected: &str, found: &Value) -> DataError {
    DataError::mapping(format!("expected {expected}, found {}", found.kind()))
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| mismatch("integer", &value))
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide)
            .map_err(|_| DataError::mapping(format!("integer {wide} does not fit in i32")))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(x) => Ok(x),
            Value::Int(i) => Ok(i as f64),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b),
            other => Err(mismatch("bytes", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// One result row: column names in select order with their values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.fields.push((column.into(), value.into()));
    }

    /// Builder form of `push`.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value);
        self
    }

    /// Value of a column. Exact match first, then ASCII case-insensitive,
    /// since Postgres folds unquoted aliases to lower case.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .or_else(|| {
                self.fields
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(column))
            })
            .map(|(_, value)| value)
    }

    /// Typed column read; a missing column is a `Mapping` error.
    pub fn get_as<T: FromValue>(&self, column: &str) -> Result<T> {
        let value = self
            .get(column)
            .ok_or_else(|| DataError::mapping(format!("row has no column '{column}'")))?;
        T::from_value(value.clone()).map_err(|err| match err {
            DataError::Mapping { reason } => DataError::mapping(format!("column '{column}': {reason}")),
            other => other,
        })
    }

    pub fn get_i64(&self, column: &str) -> Result<i64> {
        self.get_as(column)
    }

    pub fn get_f64(&self, column: &str) -> Result<f64> {
        self.get_as(column)
    }

    /// Accepts 0/1 integers as well as native booleans.
    pub fn get_bool(&self, column: &str) -> Result<bool> {
        self.get_as(column)
    }

    pub fn get_string(&self, column: &str) -> Result<String> {
        self.get_as(column)
    }

    /// Borrowed text; `None` for NULL, a missing column, or a non-text value.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn into_values(self) -> Vec<Value> {
        self.fields.into_iter().map(|(_, value)| value).collect()
    }

    /// JSON object keyed by column name.
    ///
    /// Serializer errors are returned to the caller; non-finite floats
    /// become `null`.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Decode a driver row into a `Record`, using each value's runtime type.
pub(crate) fn record_from_row(row: &AnyRow) -> Result<Record> {
    let mut record = Record::new();
    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let kind = raw.type_info().kind();
            match kind {
                AnyTypeInfoKind::Null => Value::Null,
                AnyTypeInfoKind::Bool => Value::Bool(row.try_get::<bool, _>(index)?),
                AnyTypeInfoKind::SmallInt => Value::Int(i64::from(row.try_get::<i16, _>(index)?)),
                AnyTypeInfoKind::Integer => Value::Int(i64::from(row.try_get::<i32, _>(index)?)),
                AnyTypeInfoKind::BigInt => Value::Int(row.try_get::<i64, _>(index)?),
                AnyTypeInfoKind::Real => Value::Float(f64::from(row.try_get::<f32, _>(index)?)),
                AnyTypeInfoKind::Double => Value::Float(row.try_get::<f64, _>(index)?),
                AnyTypeInfoKind::Text => Value::Text(row.try_get::<String, _>(index)?),
                AnyTypeInfoKind::Blob => Value::Bytes(row.try_get::<Vec<u8>, _>(index)?),
            }
        };
        record.push(column.name(), value);
    }
    Ok(record)
}

/// Bind one value. `hint` picks the SQL type of a NULL so Postgres does not
/// have to guess it.
pub(crate) fn bind_value<'q>(
    query: AnyQuery<'q>,
    value: &Value,
    hint: Option<ColumnType>,
) -> AnyQuery<'q> {
    match value {
        Value::Null => match hint {
            Some(ColumnType::Integer) => query.bind(Option::<i32>::None),
            Some(ColumnType::BigInt) => query.bind(Option::<i64>::None),
            Some(ColumnType::Double) => query.bind(Option::<f64>::None),
            Some(ColumnType::Boolean) => query.bind(Option::<bool>::None),
            Some(ColumnType::Binary) => query.bind(Option::<Vec<u8>>::None),
            Some(ColumnType::Text | ColumnType::String(_)) | None => {
                query.bind(Option::<String>::None)
            }
        },
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => match (hint, i32::try_from(*i)) {
            (Some(ColumnType::Integer), Ok(narrow)) => query.bind(narrow),
            _ => query.bind(*i),
        },
        Value::Float(x) => query.bind(*x),
        Value::Text(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_impls_cover_options() {
        assert_eq!(Value::from(Some("a")), Value::Text("a".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(7_i32), Value::Int(7));
    }

    #[test]
    fn scalar_conversions_are_lenient_where_stores_differ() {
        assert!(bool::from_value(Value::Int(1)).unwrap());
        assert!(!bool::from_value(Value::Int(0)).unwrap());
        assert!(bool::from_value(Value::Int(2)).is_err());
        assert_eq!(f64::from_value(Value::Int(3)).unwrap(), 3.0);
        assert_eq!(Option::<i64>::from_value(Value::Null).unwrap(), None);
        assert!(i32::from_value(Value::Int(i64::MAX)).is_err());
        assert!(String::from_value(Value::Int(1)).is_err());
    }

    #[test]
    fn record_lookup_falls_back_to_case_insensitive() {
        let record = Record::new().with("Name", "Alice").with("name", "exact");
        assert_eq!(record.get("name"), Some(&Value::Text("exact".into())));

        let record = Record::new().with("Name", "Alice");
        assert_eq!(record.get_as::<String>("NAME").unwrap(), "Alice");
        let err = record.get_as::<String>("email").unwrap_err();
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn record_serializes_as_object() {
        let record = Record::new()
            .with("id", 1_i64)
            .with("name", "Alice")
            .with("email", None::<String>);
        let json = record.to_json().unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["name"], "Alice");
        assert!(json["email"].is_null());
    }

    #[test]
    fn non_finite_float_serializes_as_null() {
        let json = Record::new().with("ratio", f64::NAN).to_json().unwrap();
        assert!(json["ratio"].is_null());
    }
}
