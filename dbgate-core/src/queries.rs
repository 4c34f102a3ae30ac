//! Statement builders for mapped entities and raw SQL

use crate::dialect::DbKind;
use crate::error::Result;
use crate::filter::Filter;
use crate::mapping::Mapping;
use crate::page::Page;
use crate::params::{bind_named, strip_terminator, Params};
use crate::statement::Statement;
use crate::value::Value;

fn select_columns(kind: DbKind, mapping: &Mapping) -> Statement {
    let mut stmt = Statement::new(kind);
    stmt.push("SELECT ")
        .push_idents(mapping.column_names())
        .push(" FROM ")
        .push_ident(mapping.table);
    stmt
}

fn where_id(stmt: &mut Statement, mapping: &Mapping, id: Value) {
    stmt.push(" WHERE ")
        .push_ident(mapping.id.name)
        .push(" = ")
        .push_bind(id, Some(mapping.id.ty));
}

fn push_row(stmt: &mut Statement, mapping: &Mapping, id: Option<&Value>, values: &[Value]) {
    stmt.push("(");
    let mut first = true;
    if let Some(id) = id {
        stmt.push_bind(id.clone(), Some(mapping.id.ty));
        first = false;
    }
    for (column, value) in mapping.columns.iter().zip(values) {
        if !first {
            stmt.push(", ");
        }
        stmt.push_bind(value.clone(), Some(column.ty));
        first = false;
    }
    stmt.push(")");
}

fn insert_head(stmt: &mut Statement, mapping: &Mapping, with_id: bool) {
    stmt.push("INSERT INTO ").push_ident(mapping.table).push(" (");
    let names = mapping.column_names().skip(usize::from(!with_id));
    stmt.push_idents(names).push(") VALUES ");
}

pub(crate) fn select_by_id(kind: DbKind, mapping: &Mapping, id: Value) -> Statement {
    let mut stmt = select_columns(kind, mapping);
    where_id(&mut stmt, mapping, id);
    stmt
}

/// Rows matching `filter`, ordered by id so every page is a slice of the
/// unpaged result.
pub(crate) fn select_where(
    kind: DbKind,
    mapping: &Mapping,
    filter: &Filter,
    page: Page,
) -> Result<Statement> {
    let mut stmt = select_columns(kind, mapping);
    filter.render_where(mapping, &mut stmt)?;
    stmt.push(" ORDER BY ").push_ident(mapping.id.name);
    stmt.push(&kind.page_clause(page));
    Ok(stmt)
}

pub(crate) fn count_where(kind: DbKind, mapping: &Mapping, filter: &Filter) -> Result<Statement> {
    let mut stmt = Statement::new(kind);
    stmt.push("SELECT COUNT(*) FROM ").push_ident(mapping.table);
    filter.render_where(mapping, &mut stmt)?;
    Ok(stmt)
}

pub(crate) fn exists(kind: DbKind, mapping: &Mapping, id: Value) -> Statement {
    let mut stmt = Statement::new(kind);
    stmt.push("SELECT 1 FROM ").push_ident(mapping.table);
    where_id(&mut stmt, mapping, id);
    stmt
}

/// Single-row insert. `id` is `None` for store-generated keys, in which case
/// the key is requested back with `RETURNING` where the dialect has it.
pub(crate) fn insert(kind: DbKind, mapping: &Mapping, id: Option<&Value>, values: &[Value]) -> Statement {
    let mut stmt = Statement::new(kind);
    if id.is_none() && mapping.columns.is_empty() {
        stmt.push("INSERT INTO ").push_ident(mapping.table);
        stmt.push(match kind {
            DbKind::MySql => " () VALUES ()",
            DbKind::Postgres | DbKind::Sqlite => " DEFAULT VALUES",
        });
    } else {
        insert_head(&mut stmt, mapping, id.is_some());
        push_row(&mut stmt, mapping, id, values);
    }
    if id.is_none() && kind.supports_returning() {
        stmt.push(" RETURNING ").push_ident(mapping.id.name);
    }
    stmt
}

/// Multi-row insert of caller-assigned keys.
pub(crate) fn insert_rows(kind: DbKind, mapping: &Mapping, rows: &[(Value, Vec<Value>)]) -> Statement {
    let mut stmt = Statement::new(kind);
    insert_head(&mut stmt, mapping, true);
    for (i, (id, values)) in rows.iter().enumerate() {
        if i > 0 {
            stmt.push(", ");
        }
        push_row(&mut stmt, mapping, Some(id), values);
    }
    stmt
}

/// `UPDATE` of every mapped column; `mapping.columns` must not be empty.
pub(crate) fn update(kind: DbKind, mapping: &Mapping, id: Value, values: &[Value]) -> Statement {
    let mut stmt = Statement::new(kind);
    stmt.push("UPDATE ").push_ident(mapping.table).push(" SET ");
    for (i, (column, value)) in mapping.columns.iter().zip(values).enumerate() {
        if i > 0 {
            stmt.push(", ");
        }
        stmt.push_ident(column.name)
            .push(" = ")
            .push_bind(value.clone(), Some(column.ty));
    }
    where_id(&mut stmt, mapping, id);
    stmt
}

pub(crate) fn delete_by_id(kind: DbKind, mapping: &Mapping, id: Value) -> Statement {
    let mut stmt = Statement::new(kind);
    stmt.push("DELETE FROM ").push_ident(mapping.table);
    where_id(&mut stmt, mapping, id);
    stmt
}

fn id_in(stmt: &mut Statement, mapping: &Mapping, ids: &[Value]) {
    stmt.push(" WHERE ").push_ident(mapping.id.name).push(" IN (");
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            stmt.push(", ");
        }
        stmt.push_bind(id.clone(), Some(mapping.id.ty));
    }
    stmt.push(")");
}

pub(crate) fn select_ids_in(kind: DbKind, mapping: &Mapping, ids: &[Value]) -> Statement {
    let mut stmt = Statement::new(kind);
    stmt.push("SELECT ")
        .push_ident(mapping.id.name)
        .push(" FROM ")
        .push_ident(mapping.table);
    id_in(&mut stmt, mapping, ids);
    stmt
}

pub(crate) fn delete_in(kind: DbKind, mapping: &Mapping, ids: &[Value]) -> Statement {
    let mut stmt = Statement::new(kind);
    stmt.push("DELETE FROM ").push_ident(mapping.table);
    id_in(&mut stmt, mapping, ids);
    stmt
}

/// Caller SQL with named parameters bound; a page wraps it as a derived table.
pub(crate) fn raw(kind: DbKind, sql: &str, params: Option<&Params>, page: Page) -> Result<Statement> {
    if page.is_all() {
        return bind_named(kind, sql, params);
    }
    let inner = strip_terminator(kind, sql);
    let mut stmt = bind_named(kind, &inner, params)?;
    // closing paren on its own line so a trailing `--` comment cannot hide it
    stmt.wrap("SELECT * FROM (", &format!("\n) AS paged{}", kind.page_clause(page)));
    Ok(stmt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::col;
    use crate::mapping::{Column, ColumnType, IdColumn};

    const USERS: Mapping = Mapping::new(
        "users",
        IdColumn::generated("id"),
        &[Column::string("name", 100), Column::text("email").nullable()],
    );

    const TAGS: Mapping = Mapping::new(
        "tags",
        IdColumn::assigned("code", ColumnType::String(16)),
        &[Column::integer("weight")],
    );

    const TICKETS: Mapping = Mapping::new("tickets", IdColumn::generated("id"), &[]);

    #[test]
    fn select_always_orders_by_id() {
        let stmt = select_where(DbKind::Sqlite, &USERS, &Filter::all(), Page::all()).unwrap();
        assert_eq!(
            stmt.sql(),
            "SELECT \"id\", \"name\", \"email\" FROM \"users\" ORDER BY \"id\""
        );

        let stmt = select_where(DbKind::Postgres, &USERS, &col("name").eq("A"), Page::new(1, 10)).unwrap();
        assert_eq!(
            stmt.sql(),
            "SELECT \"id\", \"name\", \"email\" FROM \"users\" WHERE \"name\" = $1 ORDER BY \"id\" LIMIT 10 OFFSET 1"
        );
    }

    #[test]
    fn count_reuses_the_filter() {
        let stmt = count_where(DbKind::MySql, &USERS, &col("name").eq("Alice")).unwrap();
        assert_eq!(stmt.sql(), "SELECT COUNT(*) FROM `users` WHERE `name` = ?");
        assert_eq!(stmt.param_count(), 1);
    }

    #[test]
    fn generated_insert_returns_key_where_supported() {
        let values = [Value::from("Alice"), Value::Null];
        let stmt = insert(DbKind::Postgres, &USERS, None, &values);
        assert_eq!(
            stmt.sql(),
            "INSERT INTO \"users\" (\"name\", \"email\") VALUES ($1, $2) RETURNING \"id\""
        );
        let stmt = insert(DbKind::MySql, &USERS, None, &values);
        assert_eq!(stmt.sql(), "INSERT INTO `users` (`name`, `email`) VALUES (?, ?)");
    }

    #[test]
    fn insert_without_columns_uses_defaults() {
        assert_eq!(
            insert(DbKind::Sqlite, &TICKETS, None, &[]).sql(),
            "INSERT INTO \"tickets\" DEFAULT VALUES RETURNING \"id\""
        );
        assert_eq!(
            insert(DbKind::MySql, &TICKETS, None, &[]).sql(),
            "INSERT INTO `tickets` () VALUES ()"
        );
    }

    #[test]
    fn assigned_rows_insert_in_one_statement() {
        let rows = vec![
            (Value::from("a"), vec![Value::from(1)]),
            (Value::from("b"), vec![Value::from(2)]),
        ];
        let stmt = insert_rows(DbKind::Postgres, &TAGS, &rows);
        assert_eq!(
            stmt.sql(),
            "INSERT INTO \"tags\" (\"code\", \"weight\") VALUES ($1, $2), ($3, $4)"
        );
    }

    #[test]
    fn update_and_delete_target_the_id() {
        let stmt = update(DbKind::Sqlite, &USERS, Value::Int(4), &[Value::from("B"), Value::Null]);
        assert_eq!(
            stmt.sql(),
            "UPDATE \"users\" SET \"name\" = ?, \"email\" = ? WHERE \"id\" = ?"
        );
        assert_eq!(stmt.param_count(), 3);

        let stmt = delete_in(DbKind::Postgres, &USERS, &[Value::Int(1), Value::Int(2)]);
        assert_eq!(stmt.sql(), "DELETE FROM \"users\" WHERE \"id\" IN ($1, $2)");
    }

    #[test]
    fn raw_sql_pages_as_derived_table() {
        let params = Params::new().with("min", 3);
        let stmt = raw(
            DbKind::Postgres,
            "SELECT * FROM users WHERE age > :min;",
            Some(&params),
            Page::new(2, 5),
        )
        .unwrap();
        assert_eq!(
            stmt.sql(),
            "SELECT * FROM (SELECT * FROM users WHERE age > $1\n) AS paged LIMIT 5 OFFSET 2"
        );

        let stmt = raw(
            DbKind::Sqlite,
            "SELECT * FROM users; -- everyone",
            None,
            Page::new(0, 1),
        )
        .unwrap();
        assert_eq!(
            stmt.sql(),
            "SELECT * FROM (SELECT * FROM users -- everyone\n) AS paged LIMIT 1"
        );

        let stmt = raw(DbKind::Sqlite, "SELECT 1;", None, Page::all()).unwrap();
        assert_eq!(stmt.sql(), "SELECT 1;");
    }
}
