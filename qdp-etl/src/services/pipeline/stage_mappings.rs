//! Stage 2: MAPPINGS
//!
//! Fetch the survey definition, extract code → label tables, and store them
//! on the survey row.

use serde_json::json;
use tracing::{info, warn};

use super::SurveyPipeline;
use crate::models::{Stage, StageReport};

impl SurveyPipeline {
    pub(super) async fn stage_mappings(&self, survey_id: &str) -> StageReport {
        let questions = match self.fetcher.fetch_question_definitions(survey_id).await {
            Ok(questions) => questions,
            Err(e) => {
                warn!(survey_id, error = %e, "Fetching survey definition failed");
                return StageReport::failed(Stage::Mappings, e);
            }
        };

        if questions.is_empty() {
            info!(survey_id, "Survey definition has no questions, mappings skipped");
            return StageReport::skipped(
                Stage::Mappings,
                "skipped",
                json!({"reason": "no_questions_provided"}),
            );
        }

        let data = self.transformer.extract_mappings(&questions);
        let report = self.loader.load_mappings(survey_id, &data).await;

        if report.success {
            StageReport::succeeded(
                Stage::Mappings,
                &report.action,
                json!({
                    "mappings_count": report.mappings_count,
                    "key_fields_count": report.key_fields_count,
                }),
            )
        } else {
            StageReport::failed(
                Stage::Mappings,
                report.error.as_deref().unwrap_or("mapping load failed"),
            )
        }
    }
}
