//! The nine entity objects.

use super::{ApiObject, Metadata};
use crate::schema::{kinds, EntityDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

macro_rules! api_object {
    ($ty:ty, $descriptor:path) => {
        impl ApiObject for $ty {
            fn descriptor() -> &'static EntityDescriptor {
                &$descriptor
            }

            fn metadata(&self) -> &Metadata {
                &self.metadata
            }
        }
    };
}

/// Label stamped on every project created through [`Project::new`].
pub const FACTORY_LABEL: &str = "_GENAI_FACTORY";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataSourceType {
    Relational,
    Vector,
    Graph,
    KeyValue,
    ColumnFamily,
    Storage,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Model,
    Adapter,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    Ingestion,
    Application,
    DataProcessing,
    Training,
    Evaluation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    Human,
    AI,
    System,
    User,
    Agent,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChatRole::Human => "Human",
            ChatRole::AI => "AI",
            ChatRole::System => "System",
            ChatRole::User => "User",
            ChatRole::Agent => "Agent",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(flatten)]
    pub metadata: Metadata,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub is_admin: Option<bool>,
    #[serde(default)]
    pub features: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub policy: Option<BTreeMap<String, String>>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        User {
            metadata: Metadata::new(name),
            email: email.into(),
            full_name: None,
            is_admin: None,
            features: None,
            policy: None,
        }
    }
}

api_object!(User, kinds::USERS);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl Project {
    /// New project carrying the factory label.
    pub fn new(name: impl Into<String>) -> Self {
        Project {
            metadata: Metadata::new(name).with_label(FACTORY_LABEL, "true"),
        }
    }
}

api_object!(Project, kinds::PROJECTS);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    #[serde(flatten)]
    pub metadata: Metadata,
    pub project_id: String,
    pub data_source_type: DataSourceType,
    #[serde(default)]
    pub database_kwargs: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub secret_keys: Option<Vec<String>>,
}

impl DataSource {
    pub fn new(name: impl Into<String>, project_id: impl Into<String>, data_source_type: DataSourceType) -> Self {
        DataSource {
            metadata: Metadata::new(name),
            project_id: project_id.into(),
            data_source_type,
            database_kwargs: None,
            secret_keys: None,
        }
    }
}

api_object!(DataSource, kinds::DATA_SOURCES);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(flatten)]
    pub metadata: Metadata,
    pub project_id: String,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    #[serde(default)]
    pub producer: Option<Value>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, project_id: impl Into<String>) -> Self {
        Dataset {
            metadata: Metadata::new(name),
            project_id: project_id.into(),
            task: None,
            path: None,
            sources: None,
            producer: None,
        }
    }
}

api_object!(Dataset, kinds::DATASETS);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(flatten)]
    pub metadata: Metadata,
    pub project_id: String,
    pub model_type: ModelType,
    pub base_model: String,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub producer: Option<Value>,
    #[serde(default)]
    pub deployment: Option<String>,
}

impl Model {
    pub fn new(
        name: impl Into<String>,
        project_id: impl Into<String>,
        model_type: ModelType,
        base_model: impl Into<String>,
    ) -> Self {
        Model {
            metadata: Metadata::new(name),
            project_id: project_id.into(),
            model_type,
            base_model: base_model.into(),
            task: None,
            path: None,
            producer: None,
            deployment: None,
        }
    }
}

api_object!(Model, kinds::MODELS);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    #[serde(flatten)]
    pub metadata: Metadata,
    pub project_id: String,
    pub text: String,
    #[serde(default)]
    pub arguments: Option<Vec<String>>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub generation_config: Option<Value>,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, project_id: impl Into<String>, text: impl Into<String>) -> Self {
        PromptTemplate {
            metadata: Metadata::new(name),
            project_id: project_id.into(),
            text: text.into(),
            arguments: None,
            model_id: None,
            model_version: None,
            generation_config: None,
        }
    }
}

api_object!(PromptTemplate, kinds::PROMPT_TEMPLATES);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(flatten)]
    pub metadata: Metadata,
    pub project_id: String,
    pub path: String,
    #[serde(default)]
    pub origin: Option<String>,
}

impl Document {
    pub fn new(name: impl Into<String>, project_id: impl Into<String>, path: impl Into<String>) -> Self {
        Document {
            metadata: Metadata::new(name),
            project_id: project_id.into(),
            path: path.into(),
            origin: None,
        }
    }
}

api_object!(Document, kinds::DOCUMENTS);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(flatten)]
    pub metadata: Metadata,
    pub project_id: String,
    pub workflow_type: WorkflowType,
    #[serde(default)]
    pub workflow_function: Option<String>,
    #[serde(default)]
    pub configuration: Option<Value>,
    #[serde(default)]
    pub graph: Option<Value>,
    #[serde(default)]
    pub deployment: Option<String>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, project_id: impl Into<String>, workflow_type: WorkflowType) -> Self {
        Workflow {
            metadata: Metadata::new(name),
            project_id: project_id.into(),
            workflow_type,
            workflow_function: None,
            configuration: None,
            graph: None,
            deployment: None,
        }
    }
}

api_object!(Workflow, kinds::WORKFLOWS);

/// One message of a chat session history. `role` and `body` are required.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: ChatRole,
    pub body: String,
    #[serde(default)]
    pub extra_data: Option<Value>,
    #[serde(default)]
    pub sources: Option<Vec<Value>>,
    #[serde(default)]
    pub human_feedback: Option<Value>,
}

impl Message {
    pub fn new(role: ChatRole, body: impl Into<String>) -> Self {
        Message {
            role,
            body: body.into(),
            extra_data: None,
            sources: None,
            human_feedback: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    #[serde(flatten)]
    pub metadata: Metadata,
    pub project_id: String,
    pub workflow_id: String,
    pub user_id: String,
    #[serde(default)]
    pub history: Option<Vec<Message>>,
}

impl ChatSession {
    pub fn new(
        name: impl Into<String>,
        project_id: impl Into<String>,
        workflow_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        ChatSession {
            metadata: Metadata::new(name),
            project_id: project_id.into(),
            workflow_id: workflow_id.into(),
            user_id: user_id.into(),
            history: None,
        }
    }

    pub fn conversation(&self) -> Conversation<'_> {
        Conversation {
            messages: self.history.as_deref().unwrap_or(&[]),
        }
    }
}

api_object!(ChatSession, kinds::CHAT_SESSIONS);

/// Read-only view over a session history, rendered as `role: body` lines.
pub struct Conversation<'a> {
    pub messages: &'a [Message],
}

impl fmt::Display for Conversation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, m) in self.messages.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", m.role, m.body)?;
        }
        Ok(())
    }
}

/// Document to data source link recorded when a document is ingested.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ingestion {
    pub data_source_id: String,
    #[serde(default)]
    pub data_source_version: Option<String>,
    pub document_id: String,
    #[serde(default)]
    pub document_version: Option<String>,
    #[serde(default)]
    pub extra_data: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enum_values_use_wire_names() {
        assert_eq!(serde_json::to_value(DataSourceType::KeyValue).unwrap(), json!("key-value"));
        assert_eq!(serde_json::to_value(WorkflowType::DataProcessing).unwrap(), json!("data_processing"));
        assert_eq!(serde_json::to_value(ModelType::Adapter).unwrap(), json!("adapter"));
        assert_eq!(serde_json::to_value(ChatRole::AI).unwrap(), json!("AI"));
    }

    #[test]
    fn metadata_is_flattened() {
        let ds = DataSource::new("docs", "p1", DataSourceType::Vector);
        let v = serde_json::to_value(&ds).unwrap();
        assert_eq!(v["name"], json!("docs"));
        assert_eq!(v["project_id"], json!("p1"));
        assert_eq!(v["data_source_type"], json!("vector"));
        assert!(v.get("metadata").is_none());
    }

    #[test]
    fn project_new_carries_factory_label() {
        let p = Project::new("default");
        assert_eq!(
            p.metadata.labels.unwrap().get(FACTORY_LABEL),
            Some(&Some("true".to_string()))
        );
    }

    #[test]
    fn history_message_requires_body() {
        let raw = json!({
            "name": "s1",
            "project_id": "p",
            "workflow_id": "w",
            "user_id": "u",
            "history": [{"role": "Human"}]
        });
        assert!(serde_json::from_value::<ChatSession>(raw).is_err());
    }

    #[test]
    fn conversation_renders_role_and_body() {
        let mut s = ChatSession::new("s1", "p", "w", "u");
        s.history = Some(vec![
            Message::new(ChatRole::Human, "hi"),
            Message::new(ChatRole::AI, "hello"),
        ]);
        assert_eq!(s.conversation().to_string(), "Human: hi\nAI: hello");
    }
}
