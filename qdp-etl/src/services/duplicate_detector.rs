//! Duplicate download detection
//!
//! A survey's latest export is a duplicate when the two most recent
//! extraction log entries carry the same non-null content hash. Re-loading
//! identical content would only rewrite the same rows.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::{ExtractionLogEntry, SurveyStore};

/// Log entries compared per check
const COMPARED_ENTRIES: i64 = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_hash: Option<String>,
}

/// Decide from log entries ordered newest first
pub fn compare_latest_hashes(entries: &[ExtractionLogEntry]) -> DuplicateCheck {
    match entries {
        [latest, previous, ..] => match (&latest.file_hash, &previous.file_hash) {
            (Some(a), Some(b)) if a == b => DuplicateCheck {
                is_duplicate: true,
                latest_hash: Some(a.clone()),
            },
            _ => DuplicateCheck::default(),
        },
        _ => DuplicateCheck::default(),
    }
}

pub struct DuplicateDetector {
    store: Arc<dyn SurveyStore>,
}

impl DuplicateDetector {
    pub fn new(store: Arc<dyn SurveyStore>) -> Self {
        Self { store }
    }

    /// Whether the latest download repeats the one before it
    ///
    /// Fails open: a storage error is logged and reported as not duplicate.
    pub async fn is_latest_download_duplicate(&self, survey_id: &str) -> DuplicateCheck {
        match self.store.latest_extractions(survey_id, COMPARED_ENTRIES).await {
            Ok(entries) => {
                let check = compare_latest_hashes(&entries);
                debug!(
                    survey_id,
                    entries = entries.len(),
                    is_duplicate = check.is_duplicate,
                    "Duplicate download check"
                );
                check
            }
            Err(e) => {
                warn!(
                    survey_id,
                    error = %e,
                    "Duplicate download check failed, proceeding with transform"
                );
                DuplicateCheck::default()
            }
        }
    }
}
