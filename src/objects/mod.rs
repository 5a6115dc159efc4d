//! Typed API objects: what callers build and what the engine hands back.

mod application;
mod entities;
mod output;

pub use application::{ingest_path, pipeline_run_path, IngestRequest, QueryItem};
pub use entities::*;
pub use output::{to_dict, ListOutput, OutputMode};

use crate::schema::EntityDescriptor;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label name to value. A `None` value on update removes the label.
pub type LabelMap = BTreeMap<String, Option<String>>;

/// Fields shared by every entity, flattened into each object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub labels: Option<LabelMap>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_updated: Option<DateTime<Utc>>,
}

impl Metadata {
    pub fn new(name: impl Into<String>) -> Self {
        Metadata {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels
            .get_or_insert_with(LabelMap::new)
            .insert(name.into(), Some(value.into()));
        self
    }
}

/// A typed object bound to one entity kind. The descriptor decides how its fields split
/// between columns and the spec bag.
pub trait ApiObject: Serialize + DeserializeOwned + Send + Sync {
    fn descriptor() -> &'static EntityDescriptor;

    fn metadata(&self) -> &Metadata;

    fn name(&self) -> &str {
        &self.metadata().name
    }
}
