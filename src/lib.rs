//! GenAI controller: metadata control-plane for a generative-AI application factory.
//!
//! Typed API objects are mapped onto PostgreSQL rows (fixed columns, a `spec` JSONB bag
//! and a per-kind labels table) and served through generic CRUD and list verbs.

pub mod client;
pub mod error;
pub mod objects;
pub mod orm;
pub mod response;
pub mod schema;
pub mod service;
pub mod settings;
pub mod sql;
pub mod store;

pub use client::{Bootstrap, Client};
pub use error::{AppError, ConfigError};
pub use objects::{ApiObject, ListOutput, Metadata, OutputMode};
pub use response::ApiResponse;
pub use schema::{EntityDescriptor, EntityKind};
pub use service::{CrudService, ListFilter};
pub use settings::Settings;
pub use store::{create_tables, ensure_database_exists, ensure_schema};
