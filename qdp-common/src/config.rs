//! Configuration loading
//!
//! Resolution priority (highest first):
//! 1. Command-line arguments (applied by the binary on top of the result)
//! 2. Environment variables (a `.env` file is loaded into the environment first)
//! 3. TOML config file
//! 4. Compiled defaults

use crate::fields::FieldPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const ENV_API_TOKEN: &str = "API_TOKEN";
pub const ENV_API_TOKEN_ALT: &str = "QUALTRICS_API_TOKEN";
pub const ENV_DATA_CENTER: &str = "DATA_CENTER";
pub const ENV_DATA_CENTER_ALT: &str = "QUALTRICS_DATA_CENTER";
pub const ENV_API_BASE_URL: &str = "QUALTRICS_API_BASE_URL";
pub const ENV_SURVEY_IDS: &str = "SURVEY_IDS";
pub const ENV_API_TIMEOUT: &str = "API_TIMEOUT";
pub const ENV_DESTINATION_DIR: &str = "DESTINATION_DIR";
pub const ENV_POLL_MAX_SECONDS: &str = "EXPORT_POLL_MAX_SECONDS";
pub const ENV_POLL_INTERVAL: &str = "EXPORT_POLL_INTERVAL";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_DB_HOST: &str = "DB_HOST";
pub const ENV_DB_PORT: &str = "DB_PORT";
pub const ENV_DB_NAME: &str = "DB_NAME";
pub const ENV_DB_NAME_ALT: &str = "DB_DATABASE";
pub const ENV_DB_USER: &str = "DB_USER";
pub const ENV_DB_PASSWORD: &str = "DB_PASSWORD";
pub const ENV_DB_POOL_MIN: &str = "DB_POOL_MIN_CONN";
pub const ENV_DB_POOL_MAX: &str = "DB_POOL_MAX_CONN";
pub const ENV_INSERT_MODE: &str = "LOAD_INSERT_MODE";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// How row-level insert failures are treated during a response load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertMode {
    /// Failing rows are logged, skipped and counted; the rest commit
    #[default]
    Lenient,
    /// The first failing row rolls back the whole replace
    Strict,
}

impl FromStr for InsertMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(InsertMode::Lenient),
            "strict" => Ok(InsertMode::Strict),
            other => Err(Error::Config(format!(
                "Unknown insert mode '{}' (expected 'lenient' or 'strict')",
                other
            ))),
        }
    }
}

impl fmt::Display for InsertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertMode::Lenient => write!(f, "lenient"),
            InsertMode::Strict => write!(f, "strict"),
        }
    }
}

/// Complete ETL configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub qualtrics: QualtricsConfig,
    pub database: DatabaseConfig,
    pub export: ExportConfig,
    pub load: LoadConfig,
    pub fields: FieldsConfig,
    pub logging: LoggingConfig,
}

/// Survey platform API settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualtricsConfig {
    pub api_token: Option<String>,
    /// Data-center identifier, e.g. `iad1` in `iad1.qualtrics.com`
    pub data_center: Option<String>,
    /// Full API base URL; overrides the data-center derived URL
    pub base_url: Option<String>,
    pub survey_ids: Vec<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for QualtricsConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            data_center: None,
            base_url: None,
            survey_ids: Vec::new(),
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for QualtricsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QualtricsConfig")
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("data_center", &self.data_center)
            .field("base_url", &self.base_url)
            .field("survey_ids", &self.survey_ids)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl QualtricsConfig {
    /// API base URL without trailing slash
    pub fn api_base_url(&self) -> Result<String> {
        if let Some(url) = non_empty(self.base_url.as_deref()) {
            return Ok(url.trim_end_matches('/').to_string());
        }
        match non_empty(self.data_center.as_deref()) {
            Some(dc) => Ok(format!("https://{}.qualtrics.com/API/v3", dc)),
            None => Err(Error::Config(format!(
                "Survey platform data center not configured (set {} or {})",
                ENV_DATA_CENTER, ENV_API_BASE_URL
            ))),
        }
    }

    pub fn api_token(&self) -> Result<&str> {
        non_empty(self.api_token.as_deref())
            .ok_or_else(|| Error::Config(format!("API token not configured (set {})", ENV_API_TOKEN)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which store implementation a database configuration selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Postgres,
    Sqlite,
}

/// Relational store settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection URL; when set, the discrete fields below are ignored
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            name: None,
            user: None,
            password: None,
            min_connections: 1,
            max_connections: 5,
            acquire_timeout_secs: 30,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("min_connections", &self.min_connections)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .finish()
    }
}

impl DatabaseConfig {
    pub fn backend(&self) -> DatabaseBackend {
        match non_empty(self.url.as_deref()) {
            Some(url) if url.starts_with("sqlite:") => DatabaseBackend::Sqlite,
            _ => DatabaseBackend::Postgres,
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// Export polling and output location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub destination_dir: PathBuf,
    pub poll_max_seconds: u64,
    pub poll_interval_secs: f64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            destination_dir: PathBuf::from("./data"),
            poll_max_seconds: 300,
            poll_interval_secs: 2.0,
        }
    }
}

impl ExportConfig {
    pub fn poll_max_wait(&self) -> Duration {
        Duration::from_secs(self.poll_max_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.poll_interval_secs).unwrap_or(Duration::from_secs(2))
    }
}

/// Response load behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub insert_mode: InsertMode,
    pub replace_existing: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            insert_mode: InsertMode::Lenient,
            replace_existing: true,
        }
    }
}

/// Allow-list policies for mapping extraction and response selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldsConfig {
    pub mapping: FieldPolicy,
    pub response: FieldPolicy,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            mapping: FieldPolicy::mapping_fields(),
            response: FieldPolicy::response_key_fields(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl EtlConfig {
    /// Load configuration: TOML file (see [`resolve_config_path`], else
    /// compiled defaults), then environment overrides
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(config_path) {
            Some(path) => Self::from_toml_file(&path)?,
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Override fields from environment variables provided by `lookup`
    ///
    /// Empty values are treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_either = |a: &str, b: &str| get(a).or_else(|| get(b));

        if let Some(v) = get_either(ENV_API_TOKEN, ENV_API_TOKEN_ALT) {
            self.qualtrics.api_token = Some(v);
        }
        if let Some(v) = get_either(ENV_DATA_CENTER, ENV_DATA_CENTER_ALT) {
            self.qualtrics.data_center = Some(v);
        }
        if let Some(v) = get(ENV_API_BASE_URL) {
            self.qualtrics.base_url = Some(v);
        }
        if let Some(v) = get(ENV_SURVEY_IDS) {
            self.qualtrics.survey_ids = parse_survey_ids(&v);
        }
        if let Some(v) = get(ENV_API_TIMEOUT) {
            self.qualtrics.timeout_secs = parse_env(ENV_API_TIMEOUT, &v)?;
        }

        if let Some(v) = get(ENV_DESTINATION_DIR) {
            self.export.destination_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_POLL_MAX_SECONDS) {
            self.export.poll_max_seconds = parse_env(ENV_POLL_MAX_SECONDS, &v)?;
        }
        if let Some(v) = get(ENV_POLL_INTERVAL) {
            self.export.poll_interval_secs = parse_env(ENV_POLL_INTERVAL, &v)?;
        }

        if let Some(v) = get(ENV_DATABASE_URL) {
            self.database.url = Some(v);
        }
        if let Some(v) = get(ENV_DB_HOST) {
            self.database.host = v;
        }
        if let Some(v) = get(ENV_DB_PORT) {
            self.database.port = parse_env(ENV_DB_PORT, &v)?;
        }
        if let Some(v) = get_either(ENV_DB_NAME, ENV_DB_NAME_ALT) {
            self.database.name = Some(v);
        }
        if let Some(v) = get(ENV_DB_USER) {
            self.database.user = Some(v);
        }
        if let Some(v) = get(ENV_DB_PASSWORD) {
            self.database.password = Some(v);
        }
        if let Some(v) = get(ENV_DB_POOL_MIN) {
            self.database.min_connections = parse_env(ENV_DB_POOL_MIN, &v)?;
        }
        if let Some(v) = get(ENV_DB_POOL_MAX) {
            self.database.max_connections = parse_env(ENV_DB_POOL_MAX, &v)?;
        }

        if let Some(v) = get(ENV_INSERT_MODE) {
            self.load.insert_mode = v.parse()?;
        }
        if let Some(v) = get(ENV_LOG_LEVEL) {
            self.logging.level = v;
        }

        Ok(())
    }

    /// Range checks that do not depend on which subcommand runs
    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            return Err(Error::Config("Database pool max size must be at least 1".to_string()));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(Error::Config(format!(
                "Database pool min size ({}) exceeds max size ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }
        if !self.export.poll_interval_secs.is_finite() || self.export.poll_interval_secs <= 0.0 {
            return Err(Error::Config(format!(
                "Export poll interval must be positive, got {}",
                self.export.poll_interval_secs
            )));
        }
        if self.qualtrics.timeout_secs == 0 {
            return Err(Error::Config("API timeout must be at least 1 second".to_string()));
        }
        Ok(())
    }

    /// Survey ids to process, failing when none are configured
    pub fn require_survey_ids(&self) -> Result<&[String]> {
        if self.qualtrics.survey_ids.is_empty() {
            warn!("No survey ids configured");
            return Err(Error::Config(format!(
                "No survey ids configured (set {} or pass --survey)",
                ENV_SURVEY_IDS
            )));
        }
        Ok(&self.qualtrics.survey_ids)
    }
}

/// Split a whitespace-separated survey id list
pub fn parse_survey_ids(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Config file [`EtlConfig::load`] reads: the explicit path, else the default
/// location when it exists
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|path| path.exists()),
    }
}

/// `~/.config/qdp/config.toml` (platform equivalent elsewhere)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("qdp").join("config.toml"))
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid value for {}: '{}'", key, value)))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
