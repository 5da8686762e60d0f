//! Stage 3: RESPONSES
//!
//! Skip when the latest download repeats the previous one; otherwise read the
//! newest export on disk, select its key fields, and replace the survey's
//! stored responses.

use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

use super::SurveyPipeline;
use crate::error::Result;
use crate::models::{ResponseLoadReport, Stage, StageReport};
use crate::services::export_files::find_latest_export;

impl SurveyPipeline {
    pub(super) async fn stage_responses(&self, survey_id: &str) -> StageReport {
        let duplicate = self.detector.is_latest_download_duplicate(survey_id).await;
        if duplicate.is_duplicate {
            info!(survey_id, "Latest download equals the previous one, skipping transform and load");
            return StageReport::skipped(
                Stage::Responses,
                "skipped_duplicate",
                json!({
                    "reason": "latest_two_file_hash_equal",
                    "hash": duplicate.latest_hash,
                }),
            );
        }

        match self.transform_and_load(survey_id).await {
            Ok((path, report)) => StageReport::succeeded(
                Stage::Responses,
                "loaded",
                json!({
                    "file": path.display().to_string(),
                    "deleted_count": report.deleted_count,
                    "inserted_count": report.inserted_count,
                    "skipped_count": report.skipped_count,
                    "total_input_records": report.total_input_records,
                }),
            ),
            Err(e) => {
                warn!(survey_id, error = %e, "Responses stage failed");
                StageReport::failed(Stage::Responses, e)
            }
        }
    }

    async fn transform_and_load(&self, survey_id: &str) -> Result<(PathBuf, ResponseLoadReport)> {
        let path = find_latest_export(&self.options.destination_dir, survey_id)?;
        let records = self.transformer.transform_file(&path)?;
        info!(survey_id, file = %path.display(), records = records.len(), "Responses transformed");

        let report = self
            .loader
            .load_responses(survey_id, &records, &self.options.load)
            .await?;
        Ok((path, report))
    }
}
