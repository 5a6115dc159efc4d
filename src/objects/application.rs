//! Request bodies for the downstream application service (pipeline runs and document ingestion).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_COLLECTION: &str = "default";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryItem {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Search filter as (key, value) pairs.
    #[serde(default)]
    pub filter: Option<Vec<(String, String)>>,
    #[serde(default)]
    pub collection: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub path: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub from_file: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

pub fn pipeline_run_path(pipeline: &str) -> String {
    format!("pipeline/{}/run", pipeline)
}

pub fn ingest_path(collection: Option<&str>, loader: &str) -> String {
    format!(
        "collections/{}/{}/ingest",
        collection.unwrap_or(DEFAULT_COLLECTION),
        loader
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_item_serializes_filters_as_pairs() {
        let q = QueryItem {
            question: "what is a vector db?".into(),
            session_id: Some("s1".into()),
            filter: Some(vec![("topic".into(), "databases".into())]),
            collection: None,
        };
        assert_eq!(
            serde_json::to_value(&q).unwrap(),
            json!({
                "question": "what is a vector db?",
                "session_id": "s1",
                "filter": [["topic", "databases"]],
                "collection": null
            })
        );
    }

    #[test]
    fn ingest_request_omits_missing_metadata() {
        let r = IngestRequest {
            path: "docs/a.md".into(),
            version: None,
            from_file: true,
            metadata: None,
        };
        assert_eq!(
            serde_json::to_value(&r).unwrap(),
            json!({"path": "docs/a.md", "version": null, "from_file": true})
        );
    }

    #[test]
    fn paths_default_the_collection() {
        assert_eq!(pipeline_run_path("default"), "pipeline/default/run");
        assert_eq!(ingest_path(None, "web"), "collections/default/web/ingest");
        assert_eq!(ingest_path(Some("kb"), "pdf"), "collections/kb/pdf/ingest");
    }
}
