//! Client facade: per-entity verbs over the generic engine, returning [`ApiResponse`].
//!
//! Every verb takes an optional caller session. With `None` a pooled connection is
//! acquired for the call; with `Some` the caller threads one connection through several
//! calls and owns its lifetime.

use crate::error::{AppError, ConfigError};
use crate::objects::{
    ApiObject, ChatSession, DataSource, DataSourceType, Dataset, Document, Ingestion, ListOutput, Model,
    OutputMode, Project, PromptTemplate, User, Workflow,
};
use crate::response::ApiResponse;
use crate::schema::{EntityDescriptor, EntityKind};
use crate::service::{CrudService, ListFilter};
use crate::settings::Settings;
use crate::store;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgConnection, PgPool, Postgres};
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

#[derive(Clone)]
pub struct Client {
    pool: PgPool,
    application_url: Option<String>,
}

/// Connection used for one verb: the caller's, or one borrowed from the pool.
enum Conn<'a> {
    Caller(&'a mut PgConnection),
    Pooled(PoolConnection<Postgres>),
}

impl Deref for Conn<'_> {
    type Target = PgConnection;

    fn deref(&self) -> &PgConnection {
        match self {
            Conn::Caller(c) => c,
            Conn::Pooled(c) => c,
        }
    }
}

impl DerefMut for Conn<'_> {
    fn deref_mut(&mut self) -> &mut PgConnection {
        match self {
            Conn::Caller(c) => c,
            Conn::Pooled(c) => c,
        }
    }
}

/// What [`Client::bootstrap`] created.
#[derive(Clone, Debug)]
pub struct Bootstrap {
    pub admin: User,
    pub project: Project,
    pub data_source: DataSource,
}

fn by_name(name: &str) -> [(String, Value); 1] {
    [("name".to_string(), Value::String(name.to_string()))]
}

fn respond<R>(verb: &str, desc: &EntityDescriptor, result: Result<R, AppError>) -> ApiResponse<R> {
    match &result {
        Err(e @ (AppError::Db(_) | AppError::Config(_))) => {
            tracing::error!(verb, kind = %desc.kind, error = %e, "call failed")
        }
        Err(e) => tracing::debug!(verb, kind = %desc.kind, error = %e, "call rejected"),
        Ok(_) => {}
    }
    result.into()
}

impl Client {
    /// Pool bound to the configured database, with `search_path` set to the configured schema.
    /// The schema is created if missing.
    pub async fn connect(settings: &Settings) -> Result<Self, AppError> {
        let mut opts = PgConnectOptions::from_str(&settings.database_url)
            .map_err(|e| ConfigError::DatabaseUrl(e.to_string()))?
            .options([("search_path", settings.db_schema.as_str())]);
        if !settings.verbose {
            opts = opts.disable_statement_logging();
        }
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect_with(opts)
            .await?;
        store::ensure_schema(&pool, &settings.db_schema).await?;
        tracing::info!(schema = %settings.db_schema, max_connections = settings.max_connections, "connected");
        Ok(Client {
            pool,
            application_url: settings.application_url.clone(),
        })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Client {
            pool,
            application_url: None,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// A pooled connection for callers that thread one session through several verbs.
    pub async fn session(&self) -> Result<PoolConnection<Postgres>, AppError> {
        Ok(self.pool.acquire().await?)
    }

    async fn acquire<'a>(&self, session: Option<&'a mut PgConnection>) -> Result<Conn<'a>, AppError> {
        Ok(match session {
            Some(c) => Conn::Caller(c),
            None => Conn::Pooled(self.pool.acquire().await?),
        })
    }

    /// URL of an endpoint on the downstream application service.
    pub fn application_endpoint(&self, path: &str) -> Result<String, AppError> {
        let base = self.application_url.as_deref().ok_or(ConfigError::Invalid {
            key: "GENAI_APPLICATION_URL",
            value: String::new(),
        })?;
        Ok(format!("{}/api/{}", base, path.trim_start_matches('/')))
    }

    pub async fn create<T: ApiObject>(&self, obj: &T, session: Option<&mut PgConnection>) -> ApiResponse<T> {
        let result: Result<T, AppError> = async {
            let mut conn = self.acquire(session).await?;
            CrudService::create(&mut conn, obj).await
        }
        .await;
        respond("create", T::descriptor(), result)
    }

    pub async fn get<T: ApiObject>(&self, name: &str, session: Option<&mut PgConnection>) -> ApiResponse<T> {
        let result: Result<T, AppError> = async {
            let mut conn = self.acquire(session).await?;
            CrudService::get(&mut conn, &by_name(name)).await
        }
        .await;
        respond("get", T::descriptor(), result)
    }

    /// Merge `obj` into the stored entity with the same name.
    pub async fn update<T: ApiObject>(&self, obj: &T, session: Option<&mut PgConnection>) -> ApiResponse<T> {
        self.update_named(obj.name(), obj, session).await
    }

    /// Merge `obj` into the stored entity called `name`; renames it when `obj` carries another name.
    pub async fn update_named<T: ApiObject>(
        &self,
        name: &str,
        obj: &T,
        session: Option<&mut PgConnection>,
    ) -> ApiResponse<T> {
        let result: Result<T, AppError> = async {
            let mut conn = self.acquire(session).await?;
            CrudService::update(&mut conn, obj, &by_name(name)).await
        }
        .await;
        respond("update", T::descriptor(), result)
    }

    /// Delete by name. Succeeds when nothing matches.
    pub async fn delete<T: ApiObject>(&self, name: &str, session: Option<&mut PgConnection>) -> ApiResponse<()> {
        let result: Result<u64, AppError> = async {
            let mut conn = self.acquire(session).await?;
            CrudService::delete::<T>(&mut conn, &by_name(name)).await
        }
        .await;
        match respond("delete", T::descriptor(), result) {
            ApiResponse { success: true, .. } => ApiResponse::empty(),
            failed => ApiResponse::fail(failed.error.unwrap_or_default()),
        }
    }

    pub async fn list<T: ApiObject>(
        &self,
        filter: &ListFilter,
        mode: OutputMode,
        session: Option<&mut PgConnection>,
    ) -> ApiResponse<ListOutput<T>> {
        let result: Result<ListOutput<T>, AppError> = async {
            let mut conn = self.acquire(session).await?;
            CrudService::list(&mut conn, filter, mode).await
        }
        .await;
        respond("list", T::descriptor(), result)
    }

    /// Create (or with `drop_old`, recreate) the tables for `kinds`, or for every kind.
    pub async fn create_tables(&self, drop_old: bool, kinds: Option<&[EntityKind]>) -> ApiResponse<()> {
        match store::create_tables(&self.pool, drop_old, kinds.unwrap_or(&EntityKind::ALL)).await {
            Ok(()) => ApiResponse::empty(),
            Err(e) => {
                tracing::error!(error = %e, "create tables failed");
                ApiResponse::fail(e.to_string())
            }
        }
    }

    /// Record that the named document was ingested into the named data source.
    pub async fn ingest_document(
        &self,
        document_name: &str,
        data_source_name: &str,
        extra_data: Option<Value>,
        session: Option<&mut PgConnection>,
    ) -> ApiResponse<Ingestion> {
        let result: Result<Ingestion, AppError> = async {
            let mut conn = self.acquire(session).await?;
            let document: Document = CrudService::get(&mut conn, &by_name(document_name)).await?;
            let data_source: DataSource = CrudService::get(&mut conn, &by_name(data_source_name)).await?;
            let ingestion = Ingestion {
                data_source_id: stored_id(&data_source)?,
                data_source_version: data_source.metadata.version.clone().filter(|v| !v.is_empty()),
                document_id: stored_id(&document)?,
                document_version: document.metadata.version.clone().filter(|v| !v.is_empty()),
                extra_data,
            };
            CrudService::link_ingestion(&mut conn, &ingestion).await
        }
        .await;
        respond("ingest", Document::descriptor(), result)
    }

    pub async fn list_ingestions(&self, document_name: &str, session: Option<&mut PgConnection>) -> ApiResponse<Vec<Ingestion>> {
        let result: Result<Vec<Ingestion>, AppError> = async {
            let mut conn = self.acquire(session).await?;
            let document: Document = CrudService::get(&mut conn, &by_name(document_name)).await?;
            CrudService::list_ingestions(&mut conn, &stored_id(&document)?).await
        }
        .await;
        respond("list ingestions", Document::descriptor(), result)
    }

    /// Admin user, default project and default vector data source, created on one session.
    pub async fn bootstrap(&self, session: Option<&mut PgConnection>) -> Result<Bootstrap, AppError> {
        let mut conn = self.acquire(session).await?;

        let mut admin = User::new("admin", "example@example.com");
        admin.full_name = Some("Admin User".into());
        admin.is_admin = Some(true);
        tracing::info!("creating admin user");
        let admin = self.create_user(&admin, Some(&mut *conn)).await.into_data()?;

        let mut project = Project::new("default");
        project.metadata.description = Some("Default Project".into());
        project.metadata.owner_id = admin.metadata.id.clone();
        tracing::info!("creating default project");
        let project = self.create_project(&project, Some(&mut *conn)).await.into_data()?;

        let mut data_source = DataSource::new("default", stored_id(&project)?, DataSourceType::Vector);
        data_source.metadata.description = Some("Default Data Source".into());
        data_source.metadata.owner_id = admin.metadata.id.clone();
        tracing::info!("creating default data source");
        let data_source = self.create_data_source(&data_source, Some(&mut *conn)).await.into_data()?;

        Ok(Bootstrap {
            admin,
            project,
            data_source,
        })
    }
}

fn stored_id<T: ApiObject>(obj: &T) -> Result<String, AppError> {
    obj.metadata().id.clone().ok_or_else(|| {
        AppError::Validation(format!("{} {:?} has no id", T::descriptor().kind, obj.name()))
    })
}

macro_rules! entity_verbs {
    ($ty:ty, $create:ident, $get:ident, $update:ident, $delete:ident, $list:ident) => {
        impl Client {
            pub async fn $create(&self, obj: &$ty, session: Option<&mut PgConnection>) -> ApiResponse<$ty> {
                self.create(obj, session).await
            }

            pub async fn $get(&self, name: &str, session: Option<&mut PgConnection>) -> ApiResponse<$ty> {
                self.get(name, session).await
            }

            pub async fn $update(&self, obj: &$ty, session: Option<&mut PgConnection>) -> ApiResponse<$ty> {
                self.update(obj, session).await
            }

            pub async fn $delete(&self, name: &str, session: Option<&mut PgConnection>) -> ApiResponse<()> {
                self.delete::<$ty>(name, session).await
            }

            pub async fn $list(
                &self,
                filter: &ListFilter,
                mode: OutputMode,
                session: Option<&mut PgConnection>,
            ) -> ApiResponse<ListOutput<$ty>> {
                self.list(filter, mode, session).await
            }
        }
    };
}

entity_verbs!(User, create_user, get_user, update_user, delete_user, list_users);
entity_verbs!(Project, create_project, get_project, update_project, delete_project, list_projects);
entity_verbs!(
    DataSource,
    create_data_source,
    get_data_source,
    update_data_source,
    delete_data_source,
    list_data_sources
);
entity_verbs!(Dataset, create_dataset, get_dataset, update_dataset, delete_dataset, list_datasets);
entity_verbs!(Model, create_model, get_model, update_model, delete_model, list_models);
entity_verbs!(
    PromptTemplate,
    create_prompt_template,
    get_prompt_template,
    update_prompt_template,
    delete_prompt_template,
    list_prompt_templates
);
entity_verbs!(Document, create_document, get_document, update_document, delete_document, list_documents);
entity_verbs!(Workflow, create_workflow, get_workflow, update_workflow, delete_workflow, list_workflows);
entity_verbs!(
    ChatSession,
    create_chat_session,
    get_chat_session,
    update_chat_session,
    delete_chat_session,
    list_chat_sessions
);
