//! Per-survey ETL pipeline
//!
//! # Stage order
//! EXPORT → MAPPINGS → RESPONSES
//!
//! Each stage is handled by a `stage_*` method and ends in a [`StageReport`];
//! errors never cross a stage boundary. A failed export ends the survey's
//! run because the later stages would read a stale or missing file. A failed
//! mappings stage does not block the responses stage.
//!
//! Surveys run one after another; stages within a survey never overlap.

use qdp_common::config::EtlConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::duplicate_detector::DuplicateDetector;
use super::export_client::{ExportClient, PollSettings};
use super::loader::{DataLoader, LoadOptions};
use super::mapping_fetcher::MappingFetcher;
use super::qualtrics_api::QualtricsApi;
use super::transformer::Transformer;
use crate::db::SurveyStore;
use crate::error::Result;
use crate::models::{MappingsData, RunSummary, Stage, StageReport, SurveyRunReport};

mod stage_export;
mod stage_mappings;
mod stage_responses;

/// Run-level switches
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Skip the export stage and load whatever export is already on disk
    pub skip_export: bool,
    pub destination_dir: PathBuf,
    pub poll: PollSettings,
    pub load: LoadOptions,
}

impl PipelineOptions {
    pub fn from_config(config: &EtlConfig) -> Self {
        Self {
            skip_export: false,
            destination_dir: config.export.destination_dir.clone(),
            poll: PollSettings::from_config(&config.export),
            load: LoadOptions::from(&config.load),
        }
    }
}

pub struct SurveyPipeline {
    exporter: ExportClient,
    fetcher: MappingFetcher,
    transformer: Transformer,
    detector: DuplicateDetector,
    loader: DataLoader,
    store: Arc<dyn SurveyStore>,
    options: PipelineOptions,
}

impl SurveyPipeline {
    pub fn new(
        api: QualtricsApi,
        store: Arc<dyn SurveyStore>,
        transformer: Transformer,
        options: PipelineOptions,
    ) -> Self {
        Self {
            exporter: ExportClient::new(api.clone()),
            fetcher: MappingFetcher::new(api),
            transformer,
            detector: DuplicateDetector::new(Arc::clone(&store)),
            loader: DataLoader::new(Arc::clone(&store)),
            store,
            options,
        }
    }

    /// Build a pipeline from resolved configuration
    ///
    /// Fails when the API token or data center is missing.
    pub fn from_config(config: &EtlConfig, store: Arc<dyn SurveyStore>) -> Result<Self> {
        let api = QualtricsApi::from_config(&config.qualtrics)?;
        Ok(Self::new(
            api,
            store,
            Transformer::from_config(&config.fields),
            PipelineOptions::from_config(config),
        ))
    }

    /// Run every stage for one survey
    pub async fn run_survey(&self, survey_id: &str) -> SurveyRunReport {
        let started = Instant::now();
        info!(survey_id, backend = self.store.backend_name(), "Survey run started");

        let mut stages = Vec::with_capacity(3);

        let export = if self.options.skip_export {
            StageReport::skipped(
                Stage::Export,
                "skipped",
                serde_json::json!({"reason": "skip_export"}),
            )
        } else {
            self.stage_export(survey_id).await
        };
        let export_failed = export.is_failed();
        stages.push(export);

        if export_failed {
            warn!(survey_id, "Export failed, skipping remaining stages");
        } else {
            stages.push(self.stage_mappings(survey_id).await);
            stages.push(self.stage_responses(survey_id).await);
        }

        let report = SurveyRunReport {
            survey_id: survey_id.to_string(),
            success: !stages.iter().any(StageReport::is_failed),
            stages,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            survey_id,
            success = report.success,
            elapsed_ms = report.elapsed_ms,
            "Survey run finished"
        );
        report
    }

    /// Run surveys sequentially
    pub async fn run_all(&self, survey_ids: &[String]) -> RunSummary {
        let mut summary = RunSummary::default();
        for survey_id in survey_ids {
            summary.push(self.run_survey(survey_id).await);
        }
        info!(
            surveys = survey_ids.len(),
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Run complete"
        );
        summary
    }

    /// Export stage only, for each survey
    pub async fn export_all(&self, survey_ids: &[String]) -> RunSummary {
        let mut summary = RunSummary::default();
        for survey_id in survey_ids {
            let started = Instant::now();
            let stage = self.stage_export(survey_id).await;
            summary.push(SurveyRunReport {
                survey_id: survey_id.clone(),
                success: !stage.is_failed(),
                stages: vec![stage],
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }
        summary
    }

    /// Mappings stage only, for each survey
    pub async fn mappings_all(&self, survey_ids: &[String]) -> RunSummary {
        let mut summary = RunSummary::default();
        for survey_id in survey_ids {
            let started = Instant::now();
            let stage = self.stage_mappings(survey_id).await;
            summary.push(SurveyRunReport {
                survey_id: survey_id.clone(),
                success: !stage.is_failed(),
                stages: vec![stage],
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }
        summary
    }

    /// Fetch and extract mappings without loading them
    pub async fn preview_mappings(&self, survey_id: &str) -> Result<MappingsData> {
        let questions = self.fetcher.fetch_question_definitions(survey_id).await?;
        Ok(self.transformer.extract_mappings(&questions))
    }
}
