//! Generic CRUD execution against PostgreSQL, for any [`ApiObject`].

use super::filter::ListFilter;
use crate::error::AppError;
use crate::objects::{ApiObject, Ingestion, ListOutput, OutputMode};
use crate::orm::{from_row, merge_into_row, to_row, EntityRow, LabelChange, LabelRow};
use crate::schema::{ColumnType, EntityDescriptor, SPEC_COLUMN};
use crate::sql::{
    delete_label, delete_where, insert, insert_label, insert_ingestion, select_ingestions, select_labels,
    select_list, update_by_id, update_label, QueryBuf, SortOrder,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Connection, PgConnection, Postgres, Row};
use std::collections::HashMap;
use uuid::Uuid;

pub struct CrudService;

impl CrudService {
    /// Insert a new entity and its labels in one transaction. Returns the stored object.
    pub async fn create<T: ApiObject>(conn: &mut PgConnection, obj: &T) -> Result<T, AppError> {
        let desc = T::descriptor();
        let id = Uuid::new_v4().simple().to_string();
        let row = to_row(obj, Some(id.clone()))?;
        tracing::debug!(kind = %desc.kind, name = obj.name(), id = %id, "create");

        let mut tx = conn.begin().await?;
        let q = insert(desc, &row)?;
        Self::execute(&mut tx, &q)
            .await
            .map_err(|e| AppError::from_write(e, || describe(desc, obj.name())))?;
        for label in &row.labels {
            let q = insert_label(desc, &label.parent, &label.name, &label.value);
            Self::execute(&mut tx, &q)
                .await
                .map_err(|e| AppError::from_write(e, || format!("label {} on {}", label.name, describe(desc, obj.name()))))?;
        }
        let created = Self::load_by_id(&mut tx, desc, &id).await?;
        tx.commit().await?;
        from_row(&created)
    }

    /// Exactly-matching entity. With several matches the most recently updated wins.
    pub async fn get<T: ApiObject>(conn: &mut PgConnection, filters: &[(String, Value)]) -> Result<T, AppError> {
        let desc = T::descriptor();
        tracing::debug!(kind = %desc.kind, filters = ?filters, "get");
        let q = select_list(desc, filters, SortOrder::RecentlyUpdated, false)?;
        let rows = Self::fetch_rows(conn, desc, &q).await?;
        let mut row = Self::first_match(desc, filters, rows)?;
        Self::load_labels(conn, desc, std::slice::from_mut(&mut row)).await?;
        from_row(&row)
    }

    /// Sparse merge of `obj` into the matching row: locks it, writes columns and spec, applies label changes.
    pub async fn update<T: ApiObject>(
        conn: &mut PgConnection,
        obj: &T,
        filters: &[(String, Value)],
    ) -> Result<T, AppError> {
        let desc = T::descriptor();
        tracing::debug!(kind = %desc.kind, filters = ?filters, "update");

        let mut tx = conn.begin().await?;
        let q = select_list(desc, filters, SortOrder::RecentlyUpdated, true)?;
        let rows = Self::fetch_rows(&mut tx, desc, &q).await?;
        let mut row = Self::first_match(desc, filters, rows)?;
        Self::load_labels(&mut tx, desc, std::slice::from_mut(&mut row)).await?;

        let changes = merge_into_row(obj, &mut row)?;
        let id = row
            .id()
            .ok_or_else(|| AppError::Validation(format!("{} row without id", desc.table_name)))?
            .to_string();
        let name = row.name().unwrap_or_default().to_string();
        let q = update_by_id(desc, &row)?;
        Self::execute(&mut tx, &q)
            .await
            .map_err(|e| AppError::from_write(e, || describe(desc, &name)))?;
        Self::apply_label_changes(&mut tx, desc, &name, &changes).await?;

        let updated = Self::load_by_id(&mut tx, desc, &id).await?;
        tx.commit().await?;
        tracing::debug!(kind = %desc.kind, id = %id, label_changes = changes.len(), "updated");
        from_row(&updated)
    }

    /// Delete every match; labels go with their owner. Zero matches is not an error.
    pub async fn delete<T: ApiObject>(conn: &mut PgConnection, filters: &[(String, Value)]) -> Result<u64, AppError> {
        let desc = T::descriptor();
        if filters.is_empty() {
            return Err(AppError::Validation(format!(
                "delete from {} needs at least one match field",
                desc.table_name
            )));
        }
        let mut tx = conn.begin().await?;
        let q = delete_where(desc, filters)?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let deleted = bind_all(&q).fetch_all(&mut *tx).await?;
        tx.commit().await?;
        tracing::debug!(kind = %desc.kind, filters = ?filters, deleted = deleted.len(), "delete");
        Ok(deleted.len() as u64)
    }

    /// Rows matching every non-null filter field, oldest first, in the requested projection.
    pub async fn list<T: ApiObject>(
        conn: &mut PgConnection,
        filter: &ListFilter,
        mode: OutputMode,
    ) -> Result<ListOutput<T>, AppError> {
        let desc = T::descriptor();
        let fields = filter.fields();
        if let Some((field, _)) = fields.iter().find(|(f, _)| desc.column(f).is_none()) {
            return Err(AppError::Validation(format!(
                "{} cannot be filtered by {}",
                desc.table_name, field
            )));
        }
        if !filter.labels_match().is_empty() {
            tracing::warn!(
                kind = %desc.kind,
                labels = ?filter.labels_match(),
                "label filters are not applied"
            );
        }
        let q = select_list(desc, fields, SortOrder::Inserted, false)?;
        let mut rows = Self::fetch_rows(conn, desc, &q).await?;
        tracing::debug!(kind = %desc.kind, filters = ?fields, rows = rows.len(), "list");
        if mode != OutputMode::Names {
            Self::load_labels(conn, desc, &mut rows).await?;
        }
        let items = rows.iter().map(from_row::<T>).collect::<Result<Vec<_>, _>>()?;
        ListOutput::project(items, mode)
    }

    /// Record that a document was ingested into a data source.
    pub async fn link_ingestion(conn: &mut PgConnection, ingestion: &Ingestion) -> Result<Ingestion, AppError> {
        tracing::debug!(
            document_id = %ingestion.document_id,
            data_source_id = %ingestion.data_source_id,
            "link ingestion"
        );
        let mut tx = conn.begin().await?;
        let q = insert_ingestion(ingestion);
        Self::execute(&mut tx, &q).await.map_err(|e| {
            AppError::from_write(e, || {
                format!(
                    "ingestion of document {} into data source {}",
                    ingestion.document_id, ingestion.data_source_id
                )
            })
        })?;
        tx.commit().await?;
        Ok(ingestion.clone())
    }

    pub async fn list_ingestions(conn: &mut PgConnection, document_id: &str) -> Result<Vec<Ingestion>, AppError> {
        let q = select_ingestions(document_id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(&q).fetch_all(&mut *conn).await?;
        rows.iter()
            .map(|r| -> Result<Ingestion, AppError> {
                Ok(Ingestion {
                    data_source_id: r.try_get("data_source_id")?,
                    data_source_version: r.try_get("data_source_version")?,
                    document_id: r.try_get("document_id")?,
                    document_version: r.try_get("document_version")?,
                    extra_data: r.try_get("extra_data")?,
                })
            })
            .collect()
    }

    fn first_match(
        desc: &EntityDescriptor,
        filters: &[(String, Value)],
        rows: Vec<EntityRow>,
    ) -> Result<EntityRow, AppError> {
        if rows.len() > 1 {
            tracing::warn!(
                kind = %desc.kind,
                filters = ?filters,
                matches = rows.len(),
                "several rows match; using the most recently updated"
            );
        }
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(describe_filters(desc, filters)))
    }

    async fn load_by_id(conn: &mut PgConnection, desc: &EntityDescriptor, id: &str) -> Result<EntityRow, AppError> {
        let filters = [("id".to_string(), Value::String(id.to_string()))];
        let q = select_list(desc, &filters, SortOrder::Inserted, false)?;
        let rows = Self::fetch_rows(conn, desc, &q).await?;
        let mut row = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(describe_filters(desc, &filters)))?;
        Self::load_labels(conn, desc, std::slice::from_mut(&mut row)).await?;
        Ok(row)
    }

    async fn fetch_rows(conn: &mut PgConnection, desc: &EntityDescriptor, q: &QueryBuf) -> Result<Vec<EntityRow>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(q).fetch_all(&mut *conn).await?;
        rows.iter().map(|r| decode_entity(desc, r)).collect()
    }

    /// Attach stored labels to each row, matched by owner name.
    async fn load_labels(conn: &mut PgConnection, desc: &EntityDescriptor, rows: &mut [EntityRow]) -> Result<(), AppError> {
        let parents: Vec<String> = rows.iter().filter_map(|r| r.name().map(str::to_string)).collect();
        if parents.is_empty() {
            return Ok(());
        }
        let q = select_labels(desc, &parents);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let labels = bind_all(&q).fetch_all(&mut *conn).await?;
        let mut owners: HashMap<String, usize> = HashMap::with_capacity(parents.len());
        for (i, row) in rows.iter().enumerate() {
            if let Some(name) = row.name() {
                owners.insert(name.to_string(), i);
            }
        }
        for r in &labels {
            let label = LabelRow {
                id: Some(r.try_get("id")?),
                name: r.try_get("name")?,
                value: r.try_get("value")?,
                parent: r.try_get("parent")?,
            };
            if let Some(&i) = owners.get(label.parent.as_str()) {
                rows[i].labels.push(label);
            }
        }
        Ok(())
    }

    async fn apply_label_changes(
        conn: &mut PgConnection,
        desc: &EntityDescriptor,
        parent: &str,
        changes: &[LabelChange],
    ) -> Result<(), AppError> {
        for change in changes {
            let q = match change {
                LabelChange::Insert { name, value } => insert_label(desc, parent, name, value),
                LabelChange::Update { id, value } => update_label(desc, *id, value),
                LabelChange::Delete { id } => delete_label(desc, *id),
            };
            Self::execute(conn, &q)
                .await
                .map_err(|e| AppError::from_write(e, || format!("label on {}", describe(desc, parent))))?;
        }
        Ok(())
    }

    async fn execute(conn: &mut PgConnection, q: &QueryBuf) -> Result<u64, sqlx::Error> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let done = bind_all(q).execute(&mut *conn).await?;
        Ok(done.rows_affected())
    }
}

fn bind_all(q: &QueryBuf) -> Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

fn decode_entity(desc: &EntityDescriptor, row: &PgRow) -> Result<EntityRow, AppError> {
    let mut out = EntityRow::default();
    for c in desc.columns() {
        let v = match c.column_type {
            ColumnType::Text => row.try_get::<Option<String>, _>(c.name)?.map(Value::String),
            ColumnType::Boolean => row.try_get::<Option<bool>, _>(c.name)?.map(Value::Bool),
            ColumnType::Json => row.try_get::<Option<Value>, _>(c.name)?,
            ColumnType::Timestamp => row
                .try_get::<Option<DateTime<Utc>>, _>(c.name)?
                .map(|d| Value::String(d.to_rfc3339())),
        };
        out.columns.insert(c.name.to_string(), v.unwrap_or(Value::Null));
    }
    out.spec = match row.try_get::<Option<Value>, _>(SPEC_COLUMN)? {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    };
    Ok(out)
}

fn describe(desc: &EntityDescriptor, name: &str) -> String {
    format!("{} {:?}", desc.kind, name)
}

fn describe_filters(desc: &EntityDescriptor, filters: &[(String, Value)]) -> String {
    let terms: Vec<String> = filters.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{} where {}", desc.kind, terms.join(", "))
}
