//! Typed object <-> row mapping, driven by the object's descriptor.

use super::labels::{new_labels, replace_labels, to_label_map, LabelChange};
use super::row::EntityRow;
use crate::error::AppError;
use crate::objects::{ApiObject, LabelMap, FACTORY_LABEL};
use crate::schema::{EntityKind, LABELS_FIELD, TIMESTAMP_FIELDS};
use serde_json::{Map, Value};

/// Object as a flat field map. With `drop_none`, null fields are omitted.
pub fn flatten<T: ApiObject>(obj: &T, drop_none: bool) -> Result<Map<String, Value>, AppError> {
    let value = serde_json::to_value(obj).map_err(|e| AppError::Validation(e.to_string()))?;
    let Value::Object(mut map) = value else {
        return Err(AppError::Validation(format!(
            "{} did not serialize to an object",
            T::descriptor().kind
        )));
    };
    if drop_none {
        map.retain(|_, v| !v.is_null());
    }
    Ok(map)
}

fn take_labels(map: &mut Map<String, Value>) -> Result<Option<LabelMap>, AppError> {
    match map.remove(LABELS_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v)
            .map(Some)
            .map_err(|e| AppError::Validation(format!("labels: {}", e))),
    }
}

/// Row for a new entity. Declared columns keep their nulls so the insert can fall back to column defaults.
/// Projects always carry the factory label.
pub fn to_row<T: ApiObject>(obj: &T, generated_id: Option<String>) -> Result<EntityRow, AppError> {
    let desc = T::descriptor();
    let mut fields = flatten(obj, false)?;
    let labels = take_labels(&mut fields)?;

    let mut row = EntityRow::default();
    let mut spec = Map::new();
    for (key, value) in fields {
        if TIMESTAMP_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if desc.column(&key).is_some() {
            row.columns.insert(key, value);
        } else if !value.is_null() {
            spec.insert(key, value);
        }
    }
    if row.column("version").is_null() {
        row.columns.insert("version".into(), Value::String(String::new()));
    }
    if let Some(id) = generated_id {
        row.columns.insert("id".into(), Value::String(id));
    }
    if !spec.is_empty() {
        row.spec = Some(spec);
    }
    let mut labels = labels.unwrap_or_default();
    if desc.kind == EntityKind::Project {
        labels
            .entry(FACTORY_LABEL.to_string())
            .and_modify(|v| {
                v.get_or_insert_with(|| "true".into());
            })
            .or_insert_with(|| Some("true".into()));
    }
    row.labels = new_labels(obj.name(), &labels);
    Ok(row)
}

/// Typed object from a stored row. Spec keys never shadow columns.
pub fn from_row<T: ApiObject>(row: &EntityRow) -> Result<T, AppError> {
    let mut fields = row.columns.clone();
    if let Some(spec) = &row.spec {
        for (key, value) in spec {
            if !fields.contains_key(key) {
                fields.insert(key.clone(), value.clone());
            }
        }
    }
    if !row.labels.is_empty() {
        let labels: Map<String, Value> = to_label_map(&row.labels)
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        fields.insert(LABELS_FIELD.into(), Value::Object(labels));
    }
    serde_json::from_value(Value::Object(fields)).map_err(|e| {
        AppError::Validation(format!(
            "stored {} row {} does not match its object: {}",
            T::descriptor().kind,
            row.name().unwrap_or("?"),
            e
        ))
    })
}

/// Sparse merge of `obj` into an existing row; fields the object leaves null are untouched.
pub fn merge_into_row<T: ApiObject>(obj: &T, row: &mut EntityRow) -> Result<Vec<LabelChange>, AppError> {
    let desc = T::descriptor();
    let mut fields = flatten(obj, true)?;
    let labels = take_labels(&mut fields)?;

    for (key, value) in fields {
        if key == "id" || TIMESTAMP_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if desc.is_writable(&key) {
            row.columns.insert(key, value);
        } else {
            row.spec.get_or_insert_with(Map::new).insert(key, value);
        }
    }

    let parent = row.name().unwrap_or_default().to_string();
    Ok(match labels {
        Some(labels) => replace_labels(&mut row.labels, &parent, &labels),
        None => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{ChatRole, ChatSession, Dataset, Message, Metadata, Model, ModelType, Project};
    use crate::orm::LabelRow;
    use serde_json::json;

    fn model() -> Model {
        let mut m = Model::new("llama", "p1", ModelType::Model, "llama-7b");
        m.metadata = Metadata::new("llama")
            .with_description("base")
            .with_label("env", "dev");
        m.deployment = Some("serving".into());
        m.producer = Some(json!({"kind": "trainer"}));
        m
    }

    #[test]
    fn to_row_splits_columns_and_spec() {
        let row = to_row(&model(), Some("abc".into())).unwrap();
        assert_eq!(row.columns["id"], json!("abc"));
        assert_eq!(row.columns["base_model"], json!("llama-7b"));
        assert_eq!(row.columns["model_type"], json!("model"));
        assert_eq!(row.columns["version"], json!(""));
        assert!(row.columns.contains_key("task"));
        assert!(!row.columns.contains_key("labels"));
        assert!(!row.columns.contains_key("date_created"));

        let spec = row.spec.unwrap();
        assert_eq!(spec["deployment"], json!("serving"));
        assert_eq!(spec["producer"], json!({"kind": "trainer"}));
        assert!(!spec.contains_key("path"));

        assert_eq!(row.labels.len(), 1);
        assert_eq!(row.labels[0].parent, "llama");
    }

    #[test]
    fn projects_always_get_the_factory_label() {
        let bare = Project {
            metadata: Metadata::new("p").with_label("team", "ml"),
        };
        let row = to_row(&bare, None).unwrap();
        let mut names: Vec<&str> = row.labels.iter().map(|l| l.name.as_str()).collect();
        names.sort();
        assert_eq!(names, ["_GENAI_FACTORY", "team"]);

        let mut cleared = Project::default();
        cleared.metadata = Metadata::new("p");
        cleared.metadata.labels = Some(LabelMap::from([(FACTORY_LABEL.to_string(), None)]));
        let row = to_row(&cleared, None).unwrap();
        assert_eq!(row.labels.len(), 1);
        assert_eq!(row.labels[0].value, "true");

        assert!(to_row(&Dataset::new("d", "p1"), None).unwrap().labels.is_empty());
    }

    #[test]
    fn row_round_trips_to_the_object() {
        let original = model();
        let row = to_row(&original, None).unwrap();
        let back: Model = from_row(&row).unwrap();
        assert_eq!(back.name(), "llama");
        assert_eq!(back.deployment, original.deployment);
        assert_eq!(back.producer, original.producer);
        assert_eq!(back.metadata.description.as_deref(), Some("base"));
        assert_eq!(back.metadata.labels, original.metadata.labels);
    }

    #[test]
    fn spec_keys_never_shadow_columns() {
        let mut row = to_row(&Dataset::new("d", "p1"), Some("id1".into())).unwrap();
        row.spec = Some(
            [("project_id".to_string(), json!("other")), ("sources".to_string(), json!(["s3"]))]
                .into_iter()
                .collect(),
        );
        let back: Dataset = from_row(&row).unwrap();
        assert_eq!(back.project_id, "p1");
        assert_eq!(back.sources, Some(vec!["s3".to_string()]));
    }

    #[test]
    fn from_row_rejects_malformed_history() {
        let mut row = to_row(&ChatSession::new("s", "p", "w", "u"), None).unwrap();
        row.spec = Some([("history".to_string(), json!([{"role": "Human"}]))].into_iter().collect());
        let err = from_row::<ChatSession>(&row).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn merge_is_sparse() {
        let mut row = to_row(&model(), Some("id1".into())).unwrap();
        row.labels[0].id = Some(7);

        let mut patch = Model::new("llama", "p1", ModelType::Model, "llama-7b");
        patch.metadata.description = Some("tuned".into());
        patch.path = Some("s3://bucket/llama".into());
        let changes = merge_into_row(&patch, &mut row).unwrap();

        assert!(changes.is_empty());
        assert_eq!(row.columns["description"], json!("tuned"));
        assert_eq!(row.columns["id"], json!("id1"));
        let spec = row.spec.as_ref().unwrap();
        assert_eq!(spec["deployment"], json!("serving"));
        assert_eq!(spec["path"], json!("s3://bucket/llama"));
        assert_eq!(row.labels[0].value, "dev");
    }

    #[test]
    fn merge_creates_spec_when_absent() {
        let mut row = to_row(&ChatSession::new("s", "p", "w", "u"), None).unwrap();
        assert!(row.spec.is_none());
        let mut patch = ChatSession::new("s", "p", "w", "u");
        patch.history = Some(vec![Message::new(ChatRole::Human, "hi")]);
        merge_into_row(&patch, &mut row).unwrap();
        assert_eq!(row.spec.unwrap()["history"][0]["body"], json!("hi"));
    }

    #[test]
    fn merge_routes_label_changes() {
        let mut row = to_row(&model(), None).unwrap();
        row.labels = vec![LabelRow {
            id: Some(3),
            name: "env".into(),
            value: "dev".into(),
            parent: "llama".into(),
        }];
        let mut patch = Model::new("llama", "p1", ModelType::Model, "llama-7b");
        patch.metadata.labels = Some(
            [("env".to_string(), None), ("tier".to_string(), Some("gold".to_string()))]
                .into_iter()
                .collect(),
        );
        let changes = merge_into_row(&patch, &mut row).unwrap();
        assert_eq!(
            changes,
            vec![
                LabelChange::Delete { id: 3 },
                LabelChange::Insert { name: "tier".into(), value: "gold".into() },
            ]
        );
    }
}
