//! SQL text plus its positional bind values

use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::Any;

use crate::dialect::DbKind;
use crate::mapping::ColumnType;
use crate::value::{bind_value, AnyQuery, Value};

/// A statement being assembled for one dialect.
///
/// `push_bind` writes the dialect's placeholder and records the value, so the
/// text and the argument list can never drift apart.
#[derive(Debug, Clone)]
pub(crate) struct Statement {
    kind: DbKind,
    sql: String,
    args: Vec<(Value, Option<ColumnType>)>,
}

impl Statement {
    pub(crate) fn new(kind: DbKind) -> Self {
        Self {
            kind,
            sql: String::new(),
            args: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    pub(crate) fn push_ident(&mut self, ident: &str) -> &mut Self {
        let quoted = self.kind.quote(ident);
        self.sql.push_str(&quoted);
        self
    }

    pub(crate) fn push_bind(&mut self, value: Value, hint: Option<ColumnType>) -> &mut Self {
        self.args.push((value, hint));
        let placeholder = self.kind.placeholder(self.args.len());
        self.sql.push_str(&placeholder);
        self
    }

    /// Comma-separated quoted identifiers.
    pub(crate) fn push_idents<'a>(&mut self, idents: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for (i, ident) in idents.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.push_ident(ident);
        }
        self
    }

    /// Surround the text built so far; bound values keep their positions.
    pub(crate) fn wrap(&mut self, prefix: &str, suffix: &str) -> &mut Self {
        self.sql.insert_str(0, prefix);
        self.sql.push_str(suffix);
        self
    }

    pub(crate) fn sql(&self) -> &str {
        &self.sql
    }

    pub(crate) fn param_count(&self) -> usize {
        self.args.len()
    }

    /// Driver query with every value bound in order.
    pub(crate) fn query(&self) -> AnyQuery<'_> {
        self.args
            .iter()
            .fold(sqlx::query::<Any>(&self.sql), |query, (value, hint)| {
                bind_value(query, value, *hint)
            })
    }
}

static CLAUSE_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s+\b(FROM|WHERE|GROUP BY|ORDER BY|HAVING|LIMIT|OFFSET|VALUES|SET|RETURNING|UNION|INNER JOIN|LEFT JOIN|RIGHT JOIN|JOIN|AND|OR)\b\s+",
    )
    .expect("clause keyword pattern is valid")
});

/// Multi-line rendering of a statement for the SQL echo.
///
/// Breaks before top-level clause keywords and indents `AND`/`OR`. Display
/// only; the text sent to the database is never reformatted.
pub fn format_sql(sql: &str) -> String {
    let collapsed = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    CLAUSE_KEYWORDS
        .replace_all(&collapsed, |caps: &regex::Captures<'_>| {
            let keyword = &caps[1];
            if keyword.eq_ignore_ascii_case("and") || keyword.eq_ignore_ascii_case("or") {
                format!("\n    {keyword} ")
            } else {
                format!("\n{keyword} ")
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_follow_dialect_placeholders() {
        let mut stmt = Statement::new(DbKind::Postgres);
        stmt.push("SELECT * FROM ")
            .push_ident("users")
            .push(" WHERE ")
            .push_ident("name")
            .push(" = ")
            .push_bind("Alice".into(), None)
            .push(" AND ")
            .push_ident("age")
            .push(" > ")
            .push_bind(30_i64.into(), Some(ColumnType::Integer));
        assert_eq!(
            stmt.sql(),
            "SELECT * FROM \"users\" WHERE \"name\" = $1 AND \"age\" > $2"
        );
        assert_eq!(stmt.param_count(), 2);

        let mut stmt = Statement::new(DbKind::MySql);
        stmt.push_idents(["a", "b"]).push(" ").push_bind(Value::Null, None);
        assert_eq!(stmt.sql(), "`a`, `b` ?");
    }

    #[test]
    fn format_sql_breaks_clauses() {
        let formatted = format_sql("SELECT a, b FROM t WHERE a = 1 AND b = 2 ORDER BY a LIMIT 5");
        assert_eq!(
            formatted,
            "SELECT a, b\nFROM t\nWHERE a = 1\n    AND b = 2\nORDER BY a\nLIMIT 5"
        );
    }
}
