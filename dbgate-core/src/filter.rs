//! Predicate expressions over mapped columns
//!
//! A `Filter` is data, not a closure: it renders into a `WHERE` clause with
//! bound values, and the same tree serves both row queries and the native
//! `COUNT(*)` query, so counts can never disagree with the rows they count.
//!
//! ```ignore
//! let adults = col("age").ge(18) & !col("email").is_null();
//! repo.get_by_predicate(&adults, Page::new(0, 20)).await?;
//! ```

use std::ops::{BitAnd, BitOr, Not};

use crate::error::Result;
use crate::mapping::Mapping;
use crate::statement::Statement;
use crate::value::Value;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => " = ",
            Self::Ne => " <> ",
            Self::Lt => " < ",
            Self::Le => " <= ",
            Self::Gt => " > ",
            Self::Ge => " >= ",
        }
    }
}

/// Boolean predicate over an entity's columns
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        column: String,
        op: CmpOp,
        value: Value,
    },
    Like {
        column: String,
        pattern: String,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

/// Column reference used to start a filter expression.
#[derive(Debug, Clone)]
pub struct ColumnRef(String);

/// Reference a mapped column by name.
pub fn col(name: impl Into<String>) -> ColumnRef {
    ColumnRef(name.into())
}

impl ColumnRef {
    fn compare(self, op: CmpOp, value: impl Into<Value>) -> Filter {
        Filter::Compare {
            column: self.0,
            op,
            value: value.into(),
        }
    }

    /// Equality; comparing with `Value::Null` renders `IS NULL`.
    pub fn eq(self, value: impl Into<Value>) -> Filter {
        self.compare(CmpOp::Eq, value)
    }

    /// Inequality; comparing with `Value::Null` renders `IS NOT NULL`.
    pub fn ne(self, value: impl Into<Value>) -> Filter {
        self.compare(CmpOp::Ne, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Filter {
        self.compare(CmpOp::Lt, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Filter {
        self.compare(CmpOp::Le, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Filter {
        self.compare(CmpOp::Gt, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Filter {
        self.compare(CmpOp::Ge, value)
    }

    /// SQL `LIKE` with the store's own wildcard and case rules.
    pub fn like(self, pattern: impl Into<String>) -> Filter {
        Filter::Like {
            column: self.0,
            pattern: pattern.into(),
        }
    }

    pub fn is_null(self) -> Filter {
        Filter::IsNull {
            column: self.0,
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Filter {
        Filter::IsNull {
            column: self.0,
            negated: true,
        }
    }

    /// Membership; an empty list matches nothing.
    pub fn in_list<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Filter {
        Filter::In {
            column: self.0,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl Filter {
    /// Matches every row.
    pub fn all() -> Self {
        Filter::And(Vec::new())
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut parts) => {
                parts.push(other);
                Filter::And(parts)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut parts) => {
                parts.push(other);
                Filter::Or(parts)
            }
            first => Filter::Or(vec![first, other]),
        }
    }

    /// True for the empty conjunction, which renders no `WHERE` clause at all.
    pub fn is_all(&self) -> bool {
        matches!(self, Filter::And(parts) if parts.is_empty())
    }

    /// Append ` WHERE …` (or nothing for `Filter::all()`).
    pub(crate) fn render_where(&self, mapping: &Mapping, stmt: &mut Statement) -> Result<()> {
        if self.is_all() {
            return Ok(());
        }
        stmt.push(" WHERE ");
        self.render(mapping, stmt)
    }

    fn render(&self, mapping: &Mapping, stmt: &mut Statement) -> Result<()> {
        match self {
            Filter::Compare { column, op, value } => {
                let ty = mapping.require_column(column)?;
                stmt.push_ident(column);
                match (op, value) {
                    (CmpOp::Eq, Value::Null) => {
                        stmt.push(" IS NULL");
                    }
                    (CmpOp::Ne, Value::Null) => {
                        stmt.push(" IS NOT NULL");
                    }
                    _ => {
                        stmt.push(op.as_sql()).push_bind(value.clone(), Some(ty));
                    }
                }
            }
            Filter::Like { column, pattern } => {
                mapping.require_column(column)?;
                stmt.push_ident(column)
                    .push(" LIKE ")
                    .push_bind(Value::Text(pattern.clone()), None);
            }
            Filter::IsNull { column, negated } => {
                mapping.require_column(column)?;
                stmt.push_ident(column);
                stmt.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Filter::In { column, values } => {
                let ty = mapping.require_column(column)?;
                if values.is_empty() {
                    stmt.push("1 = 0");
                    return Ok(());
                }
                stmt.push_ident(column).push(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        stmt.push(", ");
                    }
                    stmt.push_bind(value.clone(), Some(ty));
                }
                stmt.push(")");
            }
            Filter::And(parts) => render_group(parts, " AND ", "1 = 1", mapping, stmt)?,
            Filter::Or(parts) => render_group(parts, " OR ", "1 = 0", mapping, stmt)?,
            Filter::Not(inner) => {
                stmt.push("NOT (");
                inner.render(mapping, stmt)?;
                stmt.push(")");
            }
        }
        Ok(())
    }
}

fn render_group(
    parts: &[Filter],
    joiner: &str,
    empty: &str,
    mapping: &Mapping,
    stmt: &mut Statement,
) -> Result<()> {
    if parts.is_empty() {
        stmt.push(empty);
        return Ok(());
    }
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            stmt.push(joiner);
        }
        stmt.push("(");
        part.render(mapping, stmt)?;
        stmt.push(")");
    }
    Ok(())
}

impl BitAnd for Filter {
    type Output = Filter;

    fn bitand(self, rhs: Filter) -> Filter {
        self.and(rhs)
    }
}

impl BitOr for Filter {
    type Output = Filter;

    fn bitor(self, rhs: Filter) -> Filter {
        self.or(rhs)
    }
}

impl Not for Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        Filter::Not(Box::new(self))
    }
}
