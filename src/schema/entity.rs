//! Static entity descriptors: which fields are metadata, which are promoted to columns, and what the rest is.

use crate::error::AppError;
use std::fmt;
use std::str::FromStr;

/// Fields common to every entity. Anything not listed here or in a descriptor's `top_level` is spec data.
pub const METADATA_FIELDS: [&str; 8] = [
    "id",
    "name",
    "version",
    "description",
    "owner_id",
    "labels",
    "date_created",
    "date_updated",
];

/// Server-assigned; never written from a client object.
pub const TIMESTAMP_FIELDS: [&str; 2] = ["date_created", "date_updated"];

pub const LABELS_FIELD: &str = "labels";
pub const SPEC_COLUMN: &str = "spec";

/// Storage type of a column; drives DDL, placeholder casts and row decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Boolean,
    Json,
    Timestamp,
}

impl ColumnType {
    pub fn pg_type(self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
            ColumnType::Json => "jsonb",
            ColumnType::Timestamp => "timestamptz",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    SetNull,
}

impl OnDelete {
    pub fn as_sql(self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::SetNull => "SET NULL",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
    pub on_delete: OnDelete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub unique: bool,
    /// SQL literal used as the column default.
    pub default: Option<&'static str>,
    pub references: Option<ForeignKey>,
}

impl ColumnInfo {
    pub const fn new(name: &'static str, column_type: ColumnType) -> Self {
        ColumnInfo {
            name,
            column_type,
            nullable: true,
            unique: false,
            default: None,
            references: None,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, ColumnType::Boolean)
    }

    pub const fn required(self) -> Self {
        let mut c = self;
        c.nullable = false;
        c
    }

    pub const fn unique(self) -> Self {
        let mut c = self;
        c.unique = true;
        c
    }

    pub const fn default(self, literal: &'static str) -> Self {
        let mut c = self;
        c.default = Some(literal);
        c
    }

    /// Foreign key to `table(id)`.
    pub const fn references(self, table: &'static str, on_delete: OnDelete) -> Self {
        let mut c = self;
        c.references = Some(ForeignKey {
            table,
            column: "id",
            on_delete,
        });
        c
    }
}

/// Columns backing the metadata fields, in table order. `labels` lives in its own table.
pub const METADATA_COLUMNS: &[ColumnInfo] = &[
    ColumnInfo::text("id").required(),
    ColumnInfo::text("name").required().unique(),
    ColumnInfo::text("version").required().default("''"),
    ColumnInfo::text("description"),
    ColumnInfo::text("owner_id").references("users", OnDelete::SetNull),
    ColumnInfo::new("date_created", ColumnType::Timestamp).required(),
    ColumnInfo::new("date_updated", ColumnType::Timestamp).required(),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Project,
    DataSource,
    Dataset,
    Model,
    PromptTemplate,
    Document,
    Workflow,
    ChatSession,
}

impl EntityKind {
    /// Every kind, ordered so that referenced tables come before the tables referencing them.
    pub const ALL: [EntityKind; 9] = [
        EntityKind::User,
        EntityKind::Project,
        EntityKind::DataSource,
        EntityKind::Dataset,
        EntityKind::Model,
        EntityKind::PromptTemplate,
        EntityKind::Document,
        EntityKind::Workflow,
        EntityKind::ChatSession,
    ];

    pub fn descriptor(self) -> &'static EntityDescriptor {
        use crate::schema::kinds::*;
        match self {
            EntityKind::User => &USERS,
            EntityKind::Project => &PROJECTS,
            EntityKind::DataSource => &DATA_SOURCES,
            EntityKind::Dataset => &DATASETS,
            EntityKind::Model => &MODELS,
            EntityKind::PromptTemplate => &PROMPT_TEMPLATES,
            EntityKind::Document => &DOCUMENTS,
            EntityKind::Workflow => &WORKFLOWS,
            EntityKind::ChatSession => &CHAT_SESSIONS,
        }
    }

    pub fn table_name(self) -> &'static str {
        self.descriptor().table_name
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for EntityKind {
    type Err = AppError;

    /// Accepts the table name (`data_sources`) or the singular form (`data_source`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        EntityKind::ALL
            .into_iter()
            .find(|k| {
                let table = k.table_name();
                table == s || table.strip_suffix('s') == Some(s.as_str())
            })
            .ok_or_else(|| AppError::Validation(format!("unknown entity kind: {}", s)))
    }
}

/// Per-kind field classification and table layout.
#[derive(Debug)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    pub table_name: &'static str,
    /// Entity-specific fields promoted to dedicated, filterable columns.
    pub top_level: &'static [ColumnInfo],
    /// Fields dropped by the short list projection.
    pub extra_fields: &'static [&'static str],
}

impl EntityDescriptor {
    pub fn labels_table(&self) -> String {
        format!("{}_labels", self.table_name)
    }

    /// Every real column except `spec`, metadata first.
    pub fn columns(&self) -> impl Iterator<Item = &'static ColumnInfo> {
        METADATA_COLUMNS.iter().chain(self.top_level.iter())
    }

    pub fn column(&self, name: &str) -> Option<&'static ColumnInfo> {
        self.columns().find(|c| c.name == name)
    }

    pub fn top_level_fields(&self) -> impl Iterator<Item = &'static str> {
        self.top_level.iter().map(|c| c.name)
    }

    /// True for metadata and top-level fields; everything else goes to the spec bag.
    pub fn is_declared(&self, field: &str) -> bool {
        METADATA_FIELDS.contains(&field) || self.top_level_fields().any(|f| f == field)
    }

    /// A column a client object may set on create or merge.
    pub fn is_writable(&self, field: &str) -> bool {
        field != "id" && !TIMESTAMP_FIELDS.contains(&field) && self.column(field).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_fields_are_classified() {
        let d = EntityKind::Model.descriptor();
        assert!(d.is_declared("name"));
        assert!(d.is_declared("labels"));
        assert!(d.is_declared("base_model"));
        assert!(!d.is_declared("deployment"));
        assert!(!d.is_declared("producer"));
        assert!(d.is_writable("model_type"));
        assert!(!d.is_writable("date_created"));
        assert!(!d.is_writable("id"));
        assert!(!d.is_writable("labels"));
    }

    #[test]
    fn columns_start_with_metadata() {
        let names: Vec<_> = EntityKind::DataSource.descriptor().columns().map(|c| c.name).collect();
        assert_eq!(
            names,
            vec![
                "id",
                "name",
                "version",
                "description",
                "owner_id",
                "date_created",
                "date_updated",
                "project_id",
                "data_source_type"
            ]
        );
    }

    #[test]
    fn kind_parses_from_table_or_singular_name() {
        assert_eq!("data_sources".parse::<EntityKind>().unwrap(), EntityKind::DataSource);
        assert_eq!("chat_session".parse::<EntityKind>().unwrap(), EntityKind::ChatSession);
        assert_eq!(" Users ".parse::<EntityKind>().unwrap(), EntityKind::User);
        assert!("gadgets".parse::<EntityKind>().is_err());
    }

    #[test]
    fn referenced_tables_come_first() {
        for (i, kind) in EntityKind::ALL.iter().enumerate() {
            for col in kind.descriptor().columns() {
                if let Some(fk) = col.references {
                    let target = EntityKind::ALL
                        .iter()
                        .position(|k| k.table_name() == fk.table)
                        .unwrap();
                    assert!(target <= i, "{} references {} before it exists", kind, fk.table);
                }
            }
        }
    }
}
