//! SQLite survey store
//!
//! UUIDs, timestamps and JSON documents are stored as TEXT. Timestamps use
//! fixed-width RFC 3339 so `ORDER BY extracted_at` sorts chronologically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qdp_common::config::{DatabaseConfig, InsertMode};
use qdp_common::db::{connect_sqlite, provision_survey, REQUIRED_TABLES};
use qdp_common::time::to_storage_text;
use qdp_common::{Error, Result};
use serde_json::Value;
use sqlx::{Connection, SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use super::{ExtractionLogEntry, NewExtraction, ReplaceOutcome, SurveyStore};
use crate::models::PreparedResponse;
use crate::utils::begin_monitored;

pub struct SqliteSurveyStore {
    pool: SqlitePool,
}

impl SqliteSurveyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `url` with the pipeline tables
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self> {
        Ok(Self::new(connect_sqlite(url, config).await?))
    }

    /// Private in-memory store
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:", &DatabaseConfig::default()).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Register a survey so responses and mappings can be loaded for it
    pub async fn add_survey(&self, qualtrics_survey_id: &str, name: &str) -> Result<Uuid> {
        provision_survey(&self.pool, qualtrics_survey_id, name).await
    }

    /// Stored field mapping document, if any
    pub async fn field_mapping(&self, qualtrics_survey_id: &str) -> Result<Option<Value>> {
        let raw: Option<Option<String>> =
            sqlx::query_scalar("SELECT field_mapping FROM surveys WHERE qualtrics_survey_id = ?")
                .bind(qualtrics_survey_id)
                .fetch_optional(&self.pool)
                .await?;
        match raw.flatten() {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }
}

async fn insert_response(
    conn: &mut SqliteConnection,
    survey_uuid: Uuid,
    row: &PreparedResponse,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO survey_responses
            (survey_id, qualtrics_response_id, submitted_at, period_year, period_month, response_data)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(survey_uuid.to_string())
    .bind(&row.qualtrics_response_id)
    .bind(row.submitted_at.map(to_storage_text))
    .bind(row.period_year)
    .bind(row.period_month.map(|d| d.format("%Y-%m-%d").to_string()))
    .bind(row.response_data.to_string())
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl SurveyStore for SqliteSurveyStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn find_survey_id(&self, qualtrics_survey_id: &str) -> Result<Option<Uuid>> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM surveys WHERE qualtrics_survey_id = ?")
                .bind(qualtrics_survey_id)
                .fetch_optional(&self.pool)
                .await?;

        id.map(|text| {
            Uuid::parse_str(&text)
                .map_err(|e| Error::CorruptValue(format!("surveys.id '{}': {}", text, e)))
        })
        .transpose()
    }

    async fn update_field_mapping(&self, qualtrics_survey_id: &str, mapping: &Value) -> Result<u64> {
        let result = sqlx::query("UPDATE surveys SET field_mapping = ? WHERE qualtrics_survey_id = ?")
            .bind(mapping.to_string())
            .bind(qualtrics_survey_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn latest_extractions(
        &self,
        qualtrics_survey_id: &str,
        limit: i64,
    ) -> Result<Vec<ExtractionLogEntry>> {
        let rows: Vec<(Option<String>, String)> = sqlx::query_as(
            r#"
            SELECT file_hash, extracted_at
            FROM survey_responses_extraction_log
            WHERE survey_id = ?
            ORDER BY extracted_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(qualtrics_survey_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(file_hash, extracted_at)| -> Result<ExtractionLogEntry> {
                let extracted_at = DateTime::parse_from_rfc3339(&extracted_at)
                    .map_err(|e| {
                        Error::CorruptValue(format!("extracted_at '{}': {}", extracted_at, e))
                    })?
                    .with_timezone(&Utc);
                Ok(ExtractionLogEntry {
                    file_hash,
                    extracted_at,
                })
            })
            .collect()
    }

    async fn record_extraction(&self, entry: &NewExtraction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO survey_responses_extraction_log (survey_id, file_hash, file_path, extracted_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&entry.survey_id)
        .bind(&entry.file_hash)
        .bind(&entry.file_path)
        .bind(to_storage_text(entry.extracted_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_responses(
        &self,
        survey_uuid: Uuid,
        rows: &[PreparedResponse],
        replace_existing: bool,
        mode: InsertMode,
    ) -> Result<ReplaceOutcome> {
        let mut tx = begin_monitored(&self.pool, "sqlite::replace_responses").await?;
        let mut outcome = ReplaceOutcome::default();

        if replace_existing {
            outcome.deleted = sqlx::query("DELETE FROM survey_responses WHERE survey_id = ?")
                .bind(survey_uuid.to_string())
                .execute(tx.conn())
                .await?
                .rows_affected();
            info!(%survey_uuid, deleted = outcome.deleted, "Deleted existing responses");
        }

        for (idx, row) in rows.iter().enumerate() {
            match mode {
                InsertMode::Strict => {
                    if let Err(e) = insert_response(tx.conn(), survey_uuid, row).await {
                        warn!(%survey_uuid, row = idx, error = %e, "Insert failed, rolling back replace");
                        tx.rollback().await?;
                        return Err(e.into());
                    }
                    outcome.inserted += 1;
                }
                InsertMode::Lenient => {
                    let mut savepoint = tx.conn().begin().await?;
                    match insert_response(&mut savepoint, survey_uuid, row).await {
                        Ok(()) => {
                            savepoint.commit().await?;
                            outcome.inserted += 1;
                        }
                        Err(e) => {
                            savepoint.rollback().await?;
                            warn!(
                                %survey_uuid,
                                row = idx,
                                response_id = %row.qualtrics_response_id,
                                error = %e,
                                "Skipping response that failed to insert"
                            );
                            outcome.skipped += 1;
                        }
                    }
                }
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }

    async fn count_responses(&self, survey_uuid: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM survey_responses WHERE survey_id = ?")
            .bind(survey_uuid.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn check_required_tables(&self) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for table in REQUIRED_TABLES {
            let found: Option<String> =
                sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                    .bind(*table)
                    .fetch_optional(&self.pool)
                    .await?;
            if found.is_none() {
                missing.push(table.to_string());
            }
        }
        Ok(missing)
    }
}
