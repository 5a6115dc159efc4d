//! Table DDL and database bootstrap. Entity tables, their `_labels` tables and `ingestions`
//! are created in the schema the pool's `search_path` points at.

use crate::error::{AppError, ConfigError};
use crate::schema::{ColumnInfo, EntityDescriptor, EntityKind, SPEC_COLUMN};
use crate::sql::{quoted, INGESTIONS_TABLE};
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

fn column_def(c: &ColumnInfo) -> String {
    let mut def = format!("{} {}", quoted(c.name), c.column_type.pg_type().to_uppercase());
    if !c.nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(d) = c.default {
        def.push_str(" DEFAULT ");
        def.push_str(d);
    }
    if c.unique {
        def.push_str(" UNIQUE");
    }
    if let Some(fk) = c.references {
        def.push_str(&format!(
            " REFERENCES {} ({}) ON DELETE {}",
            quoted(fk.table),
            quoted(fk.column),
            fk.on_delete.as_sql()
        ));
    }
    def
}

/// CREATE TABLE for one entity kind: metadata columns, top-level columns, then the spec blob.
pub fn entity_table_ddl(desc: &EntityDescriptor) -> String {
    let mut col_defs: Vec<String> = desc.columns().map(column_def).collect();
    col_defs.push(format!("{} JSONB", quoted(SPEC_COLUMN)));
    col_defs.push(format!("PRIMARY KEY ({})", quoted("id")));
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        quoted(desc.table_name),
        col_defs.join(",\n  ")
    )
}

/// CREATE TABLE and index for the kind's labels. Labels follow their owner's name.
pub fn labels_table_ddl(desc: &EntityDescriptor) -> [String; 2] {
    let table = desc.labels_table();
    [
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  \"id\" BIGSERIAL PRIMARY KEY,\n  \"name\" TEXT NOT NULL,\n  \"value\" TEXT NOT NULL,\n  \"parent\" TEXT NOT NULL REFERENCES {} (\"name\") ON DELETE CASCADE ON UPDATE CASCADE,\n  UNIQUE (\"name\", \"parent\")\n)",
            quoted(&table),
            quoted(desc.table_name)
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} (\"name\", \"value\")",
            quoted(&format!("{}_name_value_idx", table)),
            quoted(&table)
        ),
    ]
}

pub fn ingestions_table_ddl() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  \"data_source_id\" TEXT NOT NULL REFERENCES \"data_sources\" (\"id\") ON DELETE CASCADE,\n  \"data_source_version\" TEXT,\n  \"document_id\" TEXT NOT NULL REFERENCES \"documents\" (\"id\") ON DELETE CASCADE,\n  \"document_version\" TEXT,\n  \"extra_data\" JSONB,\n  PRIMARY KEY (\"data_source_id\", \"document_id\")\n)",
        quoted(INGESTIONS_TABLE)
    )
}

fn has_ingestions(kinds: &[EntityKind]) -> bool {
    kinds.contains(&EntityKind::Document) && kinds.contains(&EntityKind::DataSource)
}

/// Every statement `create_tables` runs, in order.
pub fn table_statements(drop_old: bool, kinds: &[EntityKind]) -> Vec<String> {
    let ordered: Vec<EntityKind> = EntityKind::ALL.into_iter().filter(|k| kinds.contains(k)).collect();
    let mut stmts = Vec::new();
    if drop_old {
        if kinds.contains(&EntityKind::Document) || kinds.contains(&EntityKind::DataSource) {
            stmts.push(format!("DROP TABLE IF EXISTS {} CASCADE", quoted(INGESTIONS_TABLE)));
        }
        for kind in ordered.iter().rev() {
            let desc = kind.descriptor();
            stmts.push(format!("DROP TABLE IF EXISTS {} CASCADE", quoted(&desc.labels_table())));
            stmts.push(format!("DROP TABLE IF EXISTS {} CASCADE", quoted(desc.table_name)));
        }
    }
    for kind in &ordered {
        let desc = kind.descriptor();
        stmts.push(entity_table_ddl(desc));
        stmts.extend(labels_table_ddl(desc));
    }
    if has_ingestions(kinds) {
        stmts.push(ingestions_table_ddl());
    }
    stmts
}

/// Create (or with `drop_old`, drop and recreate) the tables for `kinds`, in foreign-key order.
/// Runs in one transaction.
pub async fn create_tables(pool: &PgPool, drop_old: bool, kinds: &[EntityKind]) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    for sql in table_statements(drop_old, kinds) {
        tracing::debug!(sql = %sql, "ddl");
        sqlx::query(&sql).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    tracing::info!(drop_old, count = kinds.len(), "tables ready");
    Ok(())
}

/// CREATE SCHEMA IF NOT EXISTS. A no-op for `public`.
pub async fn ensure_schema(pool: &PgPool, schema: &str) -> Result<(), AppError> {
    if schema == "public" {
        return Ok(());
    }
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema)))
        .execute(pool)
        .await?;
    Ok(())
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| ConfigError::DatabaseUrl(e.to_string()))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
    let path_start = url
        .get(scheme_end..)
        .and_then(|rest| rest.find('/'))
        .map(|i| scheme_end + i + 1)
        .ok_or_else(|| ConfigError::DatabaseUrl(format!("{}: no database path", url)))?;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let mut parts = path_and_query.splitn(2, '?');
    let db_name = parts.next().unwrap_or("").trim();
    let query = parts.next().map(|q| format!("?{}", q)).unwrap_or_default();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres{}", base, query);
    Ok((admin_url, db_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ddl_carries_constraints() {
        let ddl = entity_table_ddl(EntityKind::PromptTemplate.descriptor());
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"prompt_templates\""));
        assert!(ddl.contains("\"name\" TEXT NOT NULL UNIQUE"));
        assert!(ddl.contains("\"version\" TEXT NOT NULL DEFAULT ''"));
        assert!(ddl.contains("\"owner_id\" TEXT REFERENCES \"users\" (\"id\") ON DELETE SET NULL"));
        assert!(ddl.contains("\"project_id\" TEXT NOT NULL REFERENCES \"projects\" (\"id\") ON DELETE CASCADE"));
        assert!(ddl.contains("\"model_id\" TEXT UNIQUE REFERENCES \"models\" (\"id\") ON DELETE SET NULL"));
        assert!(ddl.contains("\"spec\" JSONB"));
        assert!(ddl.contains("PRIMARY KEY (\"id\")"));
    }

    #[test]
    fn users_default_to_non_admin() {
        let ddl = entity_table_ddl(EntityKind::User.descriptor());
        assert!(ddl.contains("\"is_admin\" BOOLEAN NOT NULL DEFAULT FALSE"));
        assert!(ddl.contains("\"date_created\" TIMESTAMPTZ NOT NULL"));
    }

    #[test]
    fn labels_cascade_from_their_owner() {
        let [table, index] = labels_table_ddl(EntityKind::Model.descriptor());
        assert!(table.contains("REFERENCES \"models\" (\"name\") ON DELETE CASCADE ON UPDATE CASCADE"));
        assert!(table.contains("UNIQUE (\"name\", \"parent\")"));
        assert!(index.contains("ON \"models_labels\" (\"name\", \"value\")"));
    }

    #[test]
    fn statements_follow_foreign_key_order() {
        let stmts = table_statements(true, &EntityKind::ALL);
        let pos = |needle: &str| stmts.iter().position(|s| s.contains(needle)).unwrap();
        assert!(stmts[0].starts_with("DROP TABLE IF EXISTS \"ingestions\""));
        assert!(pos("DROP TABLE IF EXISTS \"chat_sessions\"") < pos("DROP TABLE IF EXISTS \"users\""));
        assert!(pos("CREATE TABLE IF NOT EXISTS \"users\"") < pos("CREATE TABLE IF NOT EXISTS \"projects\""));
        assert!(pos("CREATE TABLE IF NOT EXISTS \"documents\"") < pos("CREATE TABLE IF NOT EXISTS \"ingestions\""));
    }

    #[test]
    fn subset_skips_ingestions() {
        let stmts = table_statements(false, &[EntityKind::User, EntityKind::Project]);
        assert!(stmts.iter().all(|s| !s.contains("ingestions") && !s.starts_with("DROP")));
        assert_eq!(stmts.len(), 6);
    }

    #[test]
    fn admin_url_keeps_host_and_query() {
        let (admin, db) = parse_db_name_from_url("postgres://u:p@db:5432/factory?sslmode=disable").unwrap();
        assert_eq!(db, "factory");
        assert_eq!(admin, "postgres://u:p@db:5432/postgres?sslmode=disable");
        assert!(parse_db_name_from_url("postgres://localhost").is_err());
    }
}
