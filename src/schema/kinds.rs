//! Descriptors for the nine entity kinds.

use super::entity::{ColumnInfo, EntityDescriptor, EntityKind, OnDelete};

const PROJECT_ID: ColumnInfo = ColumnInfo::text("project_id")
    .required()
    .references("projects", OnDelete::Cascade);

const USER_COLUMNS: &[ColumnInfo] = &[
    ColumnInfo::text("email").required().unique(),
    ColumnInfo::text("full_name"),
    ColumnInfo::boolean("is_admin").required().default("FALSE"),
];

const DATA_SOURCE_COLUMNS: &[ColumnInfo] = &[PROJECT_ID, ColumnInfo::text("data_source_type").required()];

const DATASET_COLUMNS: &[ColumnInfo] = &[PROJECT_ID, ColumnInfo::text("task"), ColumnInfo::text("path")];

const MODEL_COLUMNS: &[ColumnInfo] = &[
    PROJECT_ID,
    ColumnInfo::text("model_type").required(),
    ColumnInfo::text("base_model").required(),
    ColumnInfo::text("task"),
];

const PROMPT_TEMPLATE_COLUMNS: &[ColumnInfo] = &[
    PROJECT_ID,
    ColumnInfo::text("text").required(),
    ColumnInfo::text("model_id")
        .unique()
        .references("models", OnDelete::SetNull),
    ColumnInfo::text("model_version"),
];

const DOCUMENT_COLUMNS: &[ColumnInfo] = &[PROJECT_ID, ColumnInfo::text("path").required()];

const WORKFLOW_COLUMNS: &[ColumnInfo] = &[
    PROJECT_ID,
    ColumnInfo::text("workflow_type").required(),
    ColumnInfo::text("workflow_function"),
];

const CHAT_SESSION_COLUMNS: &[ColumnInfo] = &[
    PROJECT_ID,
    ColumnInfo::text("workflow_id")
        .required()
        .references("workflows", OnDelete::Cascade),
    ColumnInfo::text("user_id")
        .required()
        .references("users", OnDelete::Cascade),
];

pub static USERS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::User,
    table_name: "users",
    top_level: USER_COLUMNS,
    extra_fields: &["policy", "features"],
};

pub static PROJECTS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Project,
    table_name: "projects",
    top_level: &[],
    extra_fields: &[],
};

pub static DATA_SOURCES: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::DataSource,
    table_name: "data_sources",
    top_level: DATA_SOURCE_COLUMNS,
    extra_fields: &[],
};

pub static DATASETS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Dataset,
    table_name: "datasets",
    top_level: DATASET_COLUMNS,
    extra_fields: &[],
};

pub static MODELS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Model,
    table_name: "models",
    top_level: MODEL_COLUMNS,
    extra_fields: &["path", "producer", "deployment"],
};

pub static PROMPT_TEMPLATES: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::PromptTemplate,
    table_name: "prompt_templates",
    top_level: PROMPT_TEMPLATE_COLUMNS,
    extra_fields: &["arguments"],
};

pub static DOCUMENTS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Document,
    table_name: "documents",
    top_level: DOCUMENT_COLUMNS,
    extra_fields: &["origin"],
};

pub static WORKFLOWS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Workflow,
    table_name: "workflows",
    top_level: WORKFLOW_COLUMNS,
    extra_fields: &[],
};

pub static CHAT_SESSIONS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::ChatSession,
    table_name: "chat_sessions",
    top_level: CHAT_SESSION_COLUMNS,
    extra_fields: &["history"],
};
