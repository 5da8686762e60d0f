//! Stage 1: EXPORT
//!
//! Export, download and persist the survey's responses, then log the
//! extraction. A log write failure is a warning; the export itself stands.

use serde_json::json;
use tracing::warn;

use super::SurveyPipeline;
use crate::db::NewExtraction;
use crate::models::{Stage, StageReport};

impl SurveyPipeline {
    pub(super) async fn stage_export(&self, survey_id: &str) -> StageReport {
        let exported = match self
            .exporter
            .export_survey(survey_id, &self.options.destination_dir, &self.options.poll)
            .await
        {
            Ok(exported) => exported,
            Err(e) => {
                warn!(survey_id, error = %e, "Export stage failed");
                return StageReport::failed(Stage::Export, e);
            }
        };

        let entry = NewExtraction {
            survey_id: survey_id.to_string(),
            file_hash: Some(exported.sha256.clone()),
            file_path: Some(exported.path.display().to_string()),
            extracted_at: exported.exported_at,
        };
        let logged = match self.store.record_extraction(&entry).await {
            Ok(()) => true,
            Err(e) => {
                warn!(survey_id, error = %e, "Failed to record extraction log entry");
                false
            }
        };

        StageReport::succeeded(
            Stage::Export,
            "exported",
            json!({
                "path": exported.path.display().to_string(),
                "size_bytes": exported.size_bytes,
                "sha256": exported.sha256,
                "extraction_logged": logged,
            }),
        )
    }
}
