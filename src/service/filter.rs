//! Exact-match filters for list queries.

use serde_json::Value;

/// Field filters for `list`. Fields given as `None` impose no constraint.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListFilter {
    fields: Vec<(String, Value)>,
    labels_match: Vec<String>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match rows whose `field` equals `value`. `None` (or JSON null) is skipped.
    pub fn with(mut self, field: &str, value: Option<impl Into<Value>>) -> Self {
        let value: Option<Value> = value.map(Into::into);
        if let Some(v) = value.filter(|v| !v.is_null()) {
            self.fields.push((field.to_string(), v));
        }
        self
    }

    pub fn name(self, name: impl Into<String>) -> Self {
        let name: String = name.into();
        self.with("name", Some(name))
    }

    pub fn project(self, project_id: impl Into<String>) -> Self {
        let project_id: String = project_id.into();
        self.with("project_id", Some(project_id))
    }

    /// Label expressions (`name` or `name=value`). Accepted but not applied.
    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels_match.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn labels_match(&self) -> &[String] {
        &self.labels_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn none_values_impose_no_constraint() {
        let f = ListFilter::new()
            .with("task", None::<String>)
            .with("path", Some(Value::Null))
            .project("p1")
            .with("version", Some("v2"));
        assert_eq!(
            f.fields(),
            &[
                ("project_id".to_string(), json!("p1")),
                ("version".to_string(), json!("v2"))
            ]
        );
    }

    #[test]
    fn labels_are_recorded_separately() {
        let f = ListFilter::new().labels(["env=prod", "gpu"]);
        assert!(f.fields().is_empty());
        assert_eq!(f.labels_match(), &["env=prod".to_string(), "gpu".to_string()]);
    }
}
