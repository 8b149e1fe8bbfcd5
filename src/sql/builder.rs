//! Builds parameterized SELECT, INSERT, UPDATE, DELETE for a reflected table.
//! Rows come back as one JSON object per row via row_to_json.

use crate::config::{ColumnInfo, ResourceModel};
use crate::store::Row;
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from reflection).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and return its placeholder, cast to the column's type (parameters bind as text).
    /// Array columns bind their JSON text and unpack it element by element; NULL stays NULL.
    fn push_param(&mut self, v: Value, column: &ColumnInfo) -> String {
        self.params.push(v);
        let n = self.params.len();
        if column.db_type.ends_with("[]") {
            format!(
                "(CASE WHEN ${n}::json IS NULL THEN NULL ELSE ARRAY(SELECT json_array_elements_text(${n}::json)) END)::{}",
                column.db_type
            )
        } else {
            format!("${}::{}", n, column.db_type)
        }
    }
}

fn column_list(model: &ResourceModel) -> String {
    model
        .columns
        .iter()
        .map(|c| quoted(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `col IS NOT DISTINCT FROM $n` so null filters match NULL; json has no equality operator, compare as jsonb.
fn equality(q: &mut QueryBuf, column: &ColumnInfo, value: Value) -> String {
    let ident = quoted(&column.name);
    let ph = q.push_param(value, column);
    if column.db_type.eq_ignore_ascii_case("json") {
        format!("{}::jsonb IS NOT DISTINCT FROM {}::jsonb", ident, ph)
    } else {
        format!("{} IS NOT DISTINCT FROM {}", ident, ph)
    }
}

fn wrap_json(inner: &str, model: &ResourceModel) -> String {
    format!(
        "SELECT row_to_json(t) FROM ({}) t ORDER BY t.{}",
        inner,
        quoted(&model.pk_column)
    )
}

/// SELECT by primary key. Single param: the id.
pub fn select_by_id(model: &ResourceModel, schema: &str, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, &model.table_name);
    let ph = q.push_param(id.clone(), model.pk());
    let inner = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        column_list(model),
        table,
        quoted(&model.pk_column),
        ph
    );
    q.sql = wrap_json(&inner, model);
    q
}

/// SELECT ordered by primary key with optional LIMIT and OFFSET.
pub fn select_page(model: &ResourceModel, schema: &str, limit: Option<u64>, offset: u64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, &model.table_name);
    let limit_clause = limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_clause = if offset > 0 {
        format!(" OFFSET {}", offset)
    } else {
        String::new()
    };
    let inner = format!(
        "SELECT {} FROM {} ORDER BY {}{}{}",
        column_list(model),
        table,
        quoted(&model.pk_column),
        limit_clause,
        offset_clause
    );
    q.sql = wrap_json(&inner, model);
    q
}

/// First row equal on every filter column. Unknown columns are ignored (callers validate first).
pub fn select_matching(model: &ResourceModel, schema: &str, filter: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, &model.table_name);
    let mut where_parts = Vec::new();
    for (k, v) in filter {
        let Some(c) = model.column(k) else { continue };
        where_parts.push(equality(&mut q, c, v.clone()));
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let inner = format!(
        "SELECT {} FROM {}{} ORDER BY {} LIMIT 1",
        column_list(model),
        table,
        where_clause,
        quoted(&model.pk_column)
    );
    q.sql = wrap_json(&inner, model);
    q
}

pub fn count(model: &ResourceModel, schema: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("SELECT COUNT(*) FROM {}", qualified_table(schema, &model.table_name));
    q
}

/// INSERT only the columns present in `values`; the database fills defaults (or NULL) for the rest.
pub fn insert(model: &ResourceModel, schema: &str, values: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, &model.table_name);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &model.columns {
        let Some(v) = values.get(&c.name) else { continue };
        placeholders.push(q.push_param(v.clone(), c));
        cols.push(quoted(&c.name));
    }
    let insert = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", table)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            cols.join(", "),
            placeholders.join(", ")
        )
    };
    q.sql = format!(
        "WITH t AS ({} RETURNING {}) SELECT row_to_json(t) FROM t",
        insert,
        column_list(model)
    );
    q
}

/// UPDATE by id: SET only declared, non-key columns present in `changes`.
/// With nothing to set this degrades to a SELECT by id.
pub fn update(model: &ResourceModel, schema: &str, id: &Value, changes: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, &model.table_name);
    let mut sets = Vec::new();
    for c in &model.columns {
        if c.is_pk {
            continue;
        }
        let Some(v) = changes.get(&c.name) else { continue };
        let ph = q.push_param(v.clone(), c);
        sets.push(format!("{} = {}", quoted(&c.name), ph));
    }
    if sets.is_empty() {
        return select_by_id(model, schema, id);
    }
    let id_ph = q.push_param(id.clone(), model.pk());
    q.sql = format!(
        "WITH t AS (UPDATE {} SET {} WHERE {} = {} RETURNING {}) SELECT row_to_json(t) FROM t",
        table,
        sets.join(", "),
        quoted(&model.pk_column),
        id_ph,
        column_list(model)
    );
    q
}

/// DELETE by id.
pub fn delete(model: &ResourceModel, schema: &str, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, &model.table_name);
    let ph = q.push_param(id.clone(), model.pk());
    q.sql = format!("DELETE FROM {} WHERE {} = {}", table, quoted(&model.pk_column), ph);
    q
}
