//! Connection and runtime settings, read from the environment.

use crate::error::ConfigError;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/genai_factory";
pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_LOG_FILTER: &str = "genai_controller=info";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    /// Applied as the connection `search_path`.
    pub db_schema: String,
    pub max_connections: u32,
    /// Log every SQL statement sqlx runs.
    pub verbose: bool,
    /// Base URL of the downstream application service.
    pub application_url: Option<String>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: DEFAULT_DATABASE_URL.into(),
            db_schema: DEFAULT_SCHEMA.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            verbose: false,
            application_url: None,
            log_filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

impl Settings {
    /// From `DATABASE_URL`, `GENAI_DB_SCHEMA`, `GENAI_DB_MAX_CONNECTIONS`, `GENAI_VERBOSE`,
    /// `GENAI_APPLICATION_URL` and `GENAI_LOG`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Settings::default();

        let database_url = get("DATABASE_URL").unwrap_or(defaults.database_url);
        if !database_url.starts_with("postgres://") && !database_url.starts_with("postgresql://") {
            return Err(ConfigError::DatabaseUrl(database_url));
        }

        let db_schema = get("GENAI_DB_SCHEMA").unwrap_or(defaults.db_schema);
        if !is_identifier(&db_schema) {
            return Err(ConfigError::Invalid {
                key: "GENAI_DB_SCHEMA",
                value: db_schema,
            });
        }

        let max_connections = match get("GENAI_DB_MAX_CONNECTIONS") {
            None => defaults.max_connections,
            Some(v) => match v.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "GENAI_DB_MAX_CONNECTIONS",
                        value: v,
                    })
                }
            },
        };

        let verbose = match get("GENAI_VERBOSE") {
            None => false,
            Some(v) => parse_flag(&v).ok_or(ConfigError::Invalid {
                key: "GENAI_VERBOSE",
                value: v,
            })?,
        };

        Ok(Settings {
            database_url,
            db_schema,
            max_connections,
            verbose,
            application_url: get("GENAI_APPLICATION_URL").map(|u| u.trim_end_matches('/').to_string()),
            log_filter: get("GENAI_LOG").unwrap_or(defaults.log_filter),
        })
    }

    /// Same settings against another schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.db_schema = schema.into();
        self
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
