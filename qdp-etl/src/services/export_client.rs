//! Response export client
//!
//! An export is a three-step job on the platform: start it, poll its progress
//! until it completes, then download a zip holding one CSV.

use chrono::{DateTime, Utc};
use qdp_common::config::ExportConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::export_files::{hash_bytes, write_export};
use super::qualtrics_api::QualtricsApi;
use crate::error::{EtlError, Result};

/// How long and how often to poll an export job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub max_wait: Duration,
    pub interval: Duration,
}

impl PollSettings {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            max_wait: config.poll_max_wait(),
            interval: config.poll_interval(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

/// A downloaded export persisted to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedFile {
    pub survey_id: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Hex SHA-256 of the file content
    pub sha256: String,
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ExportStarted {
    #[serde(rename = "progressId")]
    progress_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExportProgress {
    status: Option<String>,
    #[serde(rename = "fileId")]
    file_id: Option<String>,
    #[serde(rename = "percentComplete")]
    percent_complete: Option<f64>,
}

pub struct ExportClient {
    api: QualtricsApi,
}

impl ExportClient {
    pub fn new(api: QualtricsApi) -> Self {
        Self { api }
    }

    fn exports_path(survey_id: &str) -> String {
        format!("surveys/{}/export-responses/", survey_id)
    }

    /// Start a CSV export job, returning its progress id
    pub async fn request_export(&self, survey_id: &str) -> Result<String> {
        let request = self
            .api
            .post(&Self::exports_path(survey_id))
            .json(&json!({"format": "csv"}));
        let started: ExportStarted = self.api.send_for_result(request).await?;

        let progress_id = started
            .progress_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| EtlError::api(None, "Export response has no progressId"))?;

        info!(survey_id, progress_id = %progress_id, "Export requested");
        Ok(progress_id)
    }

    /// Poll an export job until it completes, returning the file id
    ///
    /// Progress is checked at least once. A `failed` or `error` status ends
    /// the wait immediately; otherwise the job gets `max_wait` to complete.
    pub async fn poll_until_complete(
        &self,
        survey_id: &str,
        progress_id: &str,
        poll: &PollSettings,
    ) -> Result<String> {
        let path = format!("{}{}", Self::exports_path(survey_id), progress_id);
        let started = Instant::now();

        loop {
            let progress: ExportProgress = self.api.send_for_result(self.api.get(&path)).await?;
            let status = progress
                .status
                .ok_or_else(|| EtlError::api(None, "Export progress has no status"))?;

            match status.to_ascii_lowercase().as_str() {
                "complete" => {
                    let file_id = progress
                        .file_id
                        .filter(|id| !id.is_empty())
                        .ok_or_else(|| EtlError::api(None, "Completed export has no fileId"))?;
                    info!(
                        survey_id,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Export complete"
                    );
                    return Ok(file_id);
                }
                "failed" | "error" => {
                    warn!(survey_id, status = %status, "Export failed");
                    return Err(EtlError::ExportFailed { status });
                }
                _ => {
                    debug!(
                        survey_id,
                        status = %status,
                        percent = progress.percent_complete.unwrap_or(0.0),
                        "Export in progress"
                    );
                }
            }

            if started.elapsed() >= poll.max_wait {
                return Err(EtlError::ExportTimeout {
                    waited_secs: poll.max_wait.as_secs(),
                });
            }
            tokio::time::sleep(poll.interval).await;
        }
    }

    /// Download the export archive and return the bytes of its first file
    pub async fn download_and_extract(&self, survey_id: &str, file_id: &str) -> Result<Vec<u8>> {
        let path = format!("{}{}/file", Self::exports_path(survey_id), file_id);
        let response = self
            .api
            .get(&path)
            .send()
            .await
            .map_err(|e| EtlError::Download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EtlError::Download(format!("HTTP {}", status.as_u16())));
        }

        let archive = response
            .bytes()
            .await
            .map_err(|e| EtlError::Download(e.to_string()))?;
        debug!(survey_id, archive_bytes = archive.len(), "Export archive downloaded");

        extract_first_file(&archive)
    }

    /// Request, poll, download, and persist one survey's responses
    pub async fn export_survey(
        &self,
        survey_id: &str,
        dest_dir: &Path,
        poll: &PollSettings,
    ) -> Result<ExportedFile> {
        let progress_id = self.request_export(survey_id).await?;
        let file_id = self.poll_until_complete(survey_id, &progress_id, poll).await?;
        let content = self.download_and_extract(survey_id, &file_id).await?;

        let exported_at = Utc::now();
        let path = write_export(dest_dir, survey_id, &content, exported_at)?;
        let exported = ExportedFile {
            survey_id: survey_id.to_string(),
            size_bytes: content.len() as u64,
            sha256: hash_bytes(&content),
            path,
            exported_at,
        };

        info!(
            survey_id,
            path = %exported.path.display(),
            size_bytes = exported.size_bytes,
            "Export saved"
        );
        Ok(exported)
    }
}

/// First regular file of a zip archive
pub fn extract_first_file(archive: &[u8]) -> Result<Vec<u8>> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| EtlError::CorruptArchive(e.to_string()))?;

    for idx in 0..zip.len() {
        let mut entry = zip
            .by_index(idx)
            .map_err(|e| EtlError::CorruptArchive(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        // Declared sizes come from the archive and are not trusted
        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| EtlError::CorruptArchive(format!("{}: {}", entry.name(), e)))?;
        return Ok(content);
    }

    Err(EtlError::CorruptArchive("archive contains no files".to_string()))
}
