//! Results reported by the loader and the pipeline
//!
//! Everything here serializes to the JSON printed by the CLI.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of writing a survey's field mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingLoadReport {
    pub success: bool,
    pub survey_id: String,
    /// `updated` or `failed`
    pub action: String,
    pub mappings_count: usize,
    pub key_fields_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counts from one replace of a survey's responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseLoadReport {
    pub deleted_count: u64,
    pub inserted_count: u64,
    pub skipped_count: u64,
    pub total_input_records: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Export,
    Mappings,
    Responses,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Succeeded,
    Skipped,
    Failed,
}

/// Structured result of one pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Value::is_null", default)]
    pub details: Value,
}

impl StageReport {
    pub fn succeeded(stage: Stage, action: &str, details: Value) -> Self {
        Self {
            stage,
            status: StageStatus::Succeeded,
            action: Some(action.to_string()),
            error: None,
            details,
        }
    }

    pub fn skipped(stage: Stage, action: &str, details: Value) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
            action: Some(action.to_string()),
            error: None,
            details,
        }
    }

    pub fn failed(stage: Stage, error: impl ToString) -> Self {
        Self {
            stage,
            status: StageStatus::Failed,
            action: Some("failed".to_string()),
            error: Some(error.to_string()),
            details: Value::Null,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == StageStatus::Failed
    }
}

/// All stage results for one survey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyRunReport {
    pub survey_id: String,
    pub success: bool,
    pub stages: Vec<StageReport>,
    pub elapsed_ms: u64,
}

impl SurveyRunReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

/// Result of a multi-survey run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub surveys: Vec<SurveyRunReport>,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn push(&mut self, report: SurveyRunReport) {
        if report.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.surveys.push(report);
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_report_serialization() {
        let report = StageReport::skipped(
            Stage::Responses,
            "skipped_duplicate",
            json!({"hash": "abc"}),
        );
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            json!({
                "stage": "responses",
                "status": "skipped",
                "action": "skipped_duplicate",
                "details": {"hash": "abc"}
            })
        );
    }

    #[test]
    fn test_failed_report_has_no_details() {
        let value = serde_json::to_value(StageReport::failed(Stage::Export, "boom")).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "boom");
        assert!(value.get("details").is_none());
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::default();
        for (id, success) in [("SV_1", true), ("SV_2", false), ("SV_3", true)] {
            summary.push(SurveyRunReport {
                survey_id: id.to_string(),
                success,
                stages: Vec::new(),
                elapsed_ms: 0,
            });
        }
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_succeeded());
    }
}
