//! PostgreSQL survey store
//!
//! Expects the reporting schema to exist already: `surveys.id` UUID,
//! `field_mapping` and `response_data` JSONB, `submitted_at` and
//! `extracted_at` TIMESTAMPTZ, `period_month` DATE.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qdp_common::config::{DatabaseConfig, InsertMode};
use qdp_common::db::{connect_postgres, REQUIRED_TABLES};
use qdp_common::Result;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{Connection, PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use super::{ExtractionLogEntry, NewExtraction, ReplaceOutcome, SurveyStore};
use crate::models::PreparedResponse;
use crate::utils::begin_monitored;

pub struct PgSurveyStore {
    pool: PgPool,
}

impl PgSurveyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self::new(connect_postgres(config).await?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn insert_response(
    conn: &mut PgConnection,
    survey_uuid: Uuid,
    row: &PreparedResponse,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO survey_responses
            (survey_id, qualtrics_response_id, submitted_at, period_year, period_month, response_data)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(survey_uuid)
    .bind(&row.qualtrics_response_id)
    .bind(row.submitted_at)
    .bind(row.period_year)
    .bind(row.period_month)
    .bind(Json(&row.response_data))
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl SurveyStore for PgSurveyStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn find_survey_id(&self, qualtrics_survey_id: &str) -> Result<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM surveys WHERE qualtrics_survey_id = $1")
            .bind(qualtrics_survey_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn update_field_mapping(&self, qualtrics_survey_id: &str, mapping: &Value) -> Result<u64> {
        let result = sqlx::query("UPDATE surveys SET field_mapping = $1 WHERE qualtrics_survey_id = $2")
            .bind(Json(mapping))
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
        let rows: Vec<(Option<String>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT file_hash, extracted_at
            FROM survey_responses_extraction_log
            WHERE survey_id = $1
            ORDER BY extracted_at DESC
            LIMIT $2
            "#,
        )
        .bind(qualtrics_survey_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(file_hash, extracted_at)| ExtractionLogEntry {
                file_hash,
                extracted_at,
            })
            .collect())
    }

    async fn record_extraction(&self, entry: &NewExtraction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO survey_responses_extraction_log (survey_id, file_hash, file_path, extracted_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&entry.survey_id)
        .bind(&entry.file_hash)
        .bind(&entry.file_path)
        .bind(entry.extracted_at)
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
        let mut tx = begin_monitored(&self.pool, "postgres::replace_responses").await?;
        let mut outcome = ReplaceOutcome::default();

        if replace_existing {
            outcome.deleted = sqlx::query("DELETE FROM survey_responses WHERE survey_id = $1")
                .bind(survey_uuid)
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
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM survey_responses WHERE survey_id = $1")
            .bind(survey_uuid)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn check_required_tables(&self) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for table in REQUIRED_TABLES {
            let exists: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM information_schema.tables
                    WHERE table_schema = current_schema() AND table_name = $1
                )
                "#,
            )
            .bind(*table)
            .fetch_one(&self.pool)
            .await?;
            if !exists {
                missing.push(table.to_string());
            }
        }
        Ok(missing)
    }
}
