//! Survey store access
//!
//! [`SurveyStore`] is the only way pipeline code touches the database.
//! PostgreSQL backs production runs; SQLite backs local runs and tests.

pub mod postgres;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qdp_common::config::{DatabaseBackend, DatabaseConfig, InsertMode};
use qdp_common::Result;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::PreparedResponse;

pub use postgres::PgSurveyStore;
pub use sqlite::SqliteSurveyStore;

/// One row of the extraction log, as read back for duplicate checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionLogEntry {
    pub file_hash: Option<String>,
    pub extracted_at: DateTime<Utc>,
}

/// Extraction log row to write after a download
#[derive(Debug, Clone)]
pub struct NewExtraction {
    /// External survey id (the log is keyed by it, not by the internal UUID)
    pub survey_id: String,
    pub file_hash: Option<String>,
    pub file_path: Option<String>,
    pub extracted_at: DateTime<Utc>,
}

/// Row counts from a replace of a survey's responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub deleted: u64,
    pub inserted: u64,
    pub skipped: u64,
}

#[async_trait]
pub trait SurveyStore: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Internal id of the survey with this external id
    async fn find_survey_id(&self, qualtrics_survey_id: &str) -> Result<Option<Uuid>>;

    /// Overwrite `surveys.field_mapping`; returns rows affected
    async fn update_field_mapping(&self, qualtrics_survey_id: &str, mapping: &Value) -> Result<u64>;

    /// Most recent extraction log entries, newest first
    async fn latest_extractions(
        &self,
        qualtrics_survey_id: &str,
        limit: i64,
    ) -> Result<Vec<ExtractionLogEntry>>;

    async fn record_extraction(&self, entry: &NewExtraction) -> Result<()>;

    /// Delete (when `replace_existing`) and insert a survey's responses in one
    /// transaction
    ///
    /// In [`InsertMode::Lenient`] each insert runs in a savepoint and failing
    /// rows are skipped. In [`InsertMode::Strict`] the first failure rolls back
    /// everything, delete included, and is returned.
    async fn replace_responses(
        &self,
        survey_uuid: Uuid,
        rows: &[PreparedResponse],
        replace_existing: bool,
        mode: InsertMode,
    ) -> Result<ReplaceOutcome>;

    async fn count_responses(&self, survey_uuid: Uuid) -> Result<i64>;

    /// Names of required tables that do not exist
    async fn check_required_tables(&self) -> Result<Vec<String>>;
}

/// Open the store selected by the configured URL scheme
///
/// `sqlite:` URLs open (and initialize) a SQLite store; anything else is
/// treated as PostgreSQL.
pub async fn connect_store(config: &DatabaseConfig) -> Result<Arc<dyn SurveyStore>> {
    match (config.backend(), config.url.as_deref()) {
        (DatabaseBackend::Sqlite, Some(url)) => {
            let store = SqliteSurveyStore::connect(url, config).await?;
            Ok(Arc::new(store))
        }
        _ => {
            let store = PgSurveyStore::connect(config).await?;
            Ok(Arc::new(store))
        }
    }
}
