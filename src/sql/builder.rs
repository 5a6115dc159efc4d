//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from entity descriptors.

use super::params::PgBindValue;
use crate::error::AppError;
use crate::objects::Ingestion;
use crate::orm::EntityRow;
use crate::schema::{ColumnInfo, ColumnType, EntityDescriptor, SPEC_COLUMN};
use serde_json::Value;

pub const INGESTIONS_TABLE: &str = "ingestions";

/// Quote identifier for PostgreSQL (safe: only from static descriptors).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: PgBindValue) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// Bind `v` and return its placeholder, cast to the column's type.
    fn placeholder(&mut self, column_type: ColumnType, v: PgBindValue) -> String {
        let n = self.push_param(v);
        format!("${}::{}", n, column_type.pg_type())
    }
}

/// Row order for list queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first.
    Inserted,
    /// Most recently updated first.
    RecentlyUpdated,
}

impl SortOrder {
    fn clause(self) -> &'static str {
        match self {
            SortOrder::Inserted => " ORDER BY \"date_created\", \"id\"",
            SortOrder::RecentlyUpdated => " ORDER BY \"date_updated\" DESC, \"id\" DESC",
        }
    }
}

/// SELECT list: every column plus the spec blob.
pub fn select_columns(desc: &EntityDescriptor) -> String {
    desc.columns()
        .map(|c| quoted(c.name))
        .chain(std::iter::once(quoted(SPEC_COLUMN)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn bind_column(q: &mut QueryBuf, c: &ColumnInfo, v: &Value) -> Result<String, AppError> {
    let value = match c.column_type {
        ColumnType::Json => PgBindValue::json(v.clone()),
        _ => PgBindValue::from_json(v)?,
    };
    Ok(q.placeholder(c.column_type, value))
}

fn where_clause(q: &mut QueryBuf, desc: &EntityDescriptor, filters: &[(String, Value)]) -> Result<String, AppError> {
    let mut parts = Vec::new();
    for (field, value) in filters {
        let column = desc.column(field).ok_or_else(|| {
            AppError::Validation(format!("{} has no column {}", desc.table_name, field))
        })?;
        let ph = bind_column(q, column, value)?;
        parts.push(format!("{} = {}", quoted(field), ph));
    }
    Ok(if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    })
}

/// INSERT of a mapped row. Null columns that carry a DB default are omitted so the default applies.
/// Both timestamps come from the database clock.
pub fn insert(desc: &EntityDescriptor, row: &EntityRow) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut values = Vec::new();
    for c in desc.columns() {
        if c.column_type == ColumnType::Timestamp {
            cols.push(quoted(c.name));
            values.push("clock_timestamp()".to_string());
            continue;
        }
        let v = row.column(c.name);
        if v.is_null() && c.default.is_some() {
            continue;
        }
        cols.push(quoted(c.name));
        values.push(bind_column(&mut q, c, v)?);
    }
    let spec = row.spec.clone().map(Value::Object).unwrap_or(Value::Null);
    cols.push(quoted(SPEC_COLUMN));
    values.push(q.placeholder(ColumnType::Json, PgBindValue::json(spec)));

    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING \"id\"",
        quoted(desc.table_name),
        cols.join(", "),
        values.join(", ")
    );
    Ok(q)
}

/// SELECT with exact-match filters. `lock` appends FOR UPDATE.
pub fn select_list(
    desc: &EntityDescriptor,
    filters: &[(String, Value)],
    order: SortOrder,
    lock: bool,
) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, desc, filters)?;
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}",
        select_columns(desc),
        quoted(desc.table_name),
        where_sql,
        order.clause(),
        if lock { " FOR UPDATE" } else { "" }
    );
    Ok(q)
}

/// UPDATE every writable column and the spec from a merged row; bumps date_updated.
pub fn update_by_id(desc: &EntityDescriptor, row: &EntityRow) -> Result<QueryBuf, AppError> {
    let id = row
        .id()
        .ok_or_else(|| AppError::Validation(format!("{} row without id", desc.table_name)))?
        .to_string();
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in desc.columns().filter(|c| desc.is_writable(c.name)) {
        let v = row.column(c.name);
        if v.is_null() && !c.nullable {
            continue;
        }
        let ph = bind_column(&mut q, c, v)?;
        sets.push(format!("{} = {}", quoted(c.name), ph));
    }
    let spec = row.spec.clone().map(Value::Object).unwrap_or(Value::Null);
    let ph = q.placeholder(ColumnType::Json, PgBindValue::json(spec));
    sets.push(format!("{} = {}", quoted(SPEC_COLUMN), ph));
    sets.push(format!("{} = clock_timestamp()", quoted("date_updated")));

    let id_ph = q.placeholder(ColumnType::Text, PgBindValue::String(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE \"id\" = {}",
        quoted(desc.table_name),
        sets.join(", "),
        id_ph
    );
    Ok(q)
}

/// DELETE every row matching the filters. Returns the deleted ids.
pub fn delete_where(desc: &EntityDescriptor, filters: &[(String, Value)]) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, desc, filters)?;
    q.sql = format!(
        "DELETE FROM {}{} RETURNING \"id\"",
        quoted(desc.table_name),
        where_sql
    );
    Ok(q)
}

/// Labels owned by any of `parents`, in insertion order. The names go in as one `text[]`.
pub fn select_labels(desc: &EntityDescriptor, parents: &[String]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = quoted(&desc.labels_table());
    if parents.is_empty() {
        q.sql = format!("SELECT \"id\", \"name\", \"value\", \"parent\" FROM {} WHERE 1 = 0", table);
        return q;
    }
    let n = q.push_param(PgBindValue::TextArray(parents.to_vec()));
    q.sql = format!(
        "SELECT \"id\", \"name\", \"value\", \"parent\" FROM {} WHERE \"parent\" = ANY(${}::text[]) ORDER BY \"id\"",
        table, n
    );
    q
}

pub fn insert_label(desc: &EntityDescriptor, parent: &str, name: &str, value: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let p = q.placeholder(ColumnType::Text, parent.into());
    let n = q.placeholder(ColumnType::Text, name.into());
    let v = q.placeholder(ColumnType::Text, value.into());
    q.sql = format!(
        "INSERT INTO {} (\"parent\", \"name\", \"value\") VALUES ({}, {}, {})",
        quoted(&desc.labels_table()),
        p,
        n,
        v
    );
    q
}

pub fn update_label(desc: &EntityDescriptor, id: i64, value: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let v = q.placeholder(ColumnType::Text, value.into());
    let n = q.push_param(PgBindValue::I64(id));
    q.sql = format!(
        "UPDATE {} SET \"value\" = {} WHERE \"id\" = ${}",
        quoted(&desc.labels_table()),
        v,
        n
    );
    q
}

pub fn delete_label(desc: &EntityDescriptor, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(PgBindValue::I64(id));
    q.sql = format!("DELETE FROM {} WHERE \"id\" = ${}", quoted(&desc.labels_table()), n);
    q
}

pub fn insert_ingestion(ingestion: &Ingestion) -> QueryBuf {
    let mut q = QueryBuf::new();
    let values = [
        q.placeholder(ColumnType::Text, ingestion.data_source_id.as_str().into()),
        q.placeholder(ColumnType::Text, ingestion.data_source_version.clone().into()),
        q.placeholder(ColumnType::Text, ingestion.document_id.as_str().into()),
        q.placeholder(ColumnType::Text, ingestion.document_version.clone().into()),
        q.placeholder(
            ColumnType::Json,
            PgBindValue::json(ingestion.extra_data.clone().unwrap_or(Value::Null)),
        ),
    ];
    q.sql = format!(
        "INSERT INTO {} (\"data_source_id\", \"data_source_version\", \"document_id\", \"document_version\", \"extra_data\") VALUES ({})",
        quoted(INGESTIONS_TABLE),
        values.join(", ")
    );
    q
}

pub fn select_ingestions(document_id: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(ColumnType::Text, document_id.into());
    q.sql = format!(
        "SELECT \"data_source_id\", \"data_source_version\", \"document_id\", \"document_version\", \"extra_data\" FROM {} WHERE \"document_id\" = {} ORDER BY \"data_source_id\"",
        quoted(INGESTIONS_TABLE),
        ph
    );
    q
}
