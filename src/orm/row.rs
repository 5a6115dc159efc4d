//! Persisted representation of an entity: fixed columns, spec blob and owned label rows.

use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelRow {
    /// `None` until the label has been inserted.
    pub id: Option<i64>,
    pub name: String,
    pub value: String,
    /// Name of the owning entity.
    pub parent: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityRow {
    /// Column name to value; timestamps are RFC 3339 strings.
    pub columns: Map<String, Value>,
    pub spec: Option<Map<String, Value>>,
    pub labels: Vec<LabelRow>,
}

impl EntityRow {
    pub fn id(&self) -> Option<&str> {
        self.columns.get("id").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.columns.get("name").and_then(Value::as_str)
    }

    pub fn column(&self, name: &str) -> &Value {
        self.columns.get(name).unwrap_or(&Value::Null)
    }
}
