//! Error types for qdp-etl

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtlError>;

/// Pipeline error
///
/// Stage boundaries turn these into stage reports; nothing past a stage
/// sees them as errors.
#[derive(Debug, Error)]
pub enum EtlError {
    /// Survey platform rejected a request or answered with an unexpected body
    #[error("API error{}: {message}", .status.map(|s| format!(" {}", s)).unwrap_or_default())]
    Api { status: Option<u16>, message: String },

    /// Export job ended in a failed state
    #[error("Export failed with status '{status}'")]
    ExportFailed { status: String },

    /// Export job did not complete in time
    #[error("Export did not complete within {waited_secs}s")]
    ExportTimeout { waited_secs: u64 },

    /// Export file download failed
    #[error("Download failed: {0}")]
    Download(String),

    /// Downloaded archive could not be opened or was empty
    #[error("Corrupt export archive: {0}")]
    CorruptArchive(String),

    /// No export file found for a survey
    #[error("No export file found for survey {survey_id} in {}", .dir.display())]
    FileNotFound { survey_id: String, dir: PathBuf },

    /// External survey id has no row in the surveys table
    #[error("No surveys row matched qualtrics_survey_id={0}")]
    SurveyNotFound(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// qdp-common error
    #[error(transparent)]
    Common(#[from] qdp_common::Error),
}

impl EtlError {
    pub fn api(status: Option<u16>, message: impl Into<String>) -> Self {
        EtlError::Api {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for EtlError {
    fn from(err: reqwest::Error) -> Self {
        EtlError::Api {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
