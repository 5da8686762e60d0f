//! Loading transformed data into the survey store

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use qdp_common::config::{InsertMode, LoadConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::SurveyStore;
use crate::error::{EtlError, Result};
use crate::models::{
    MappingLoadReport, MappingsData, PreparedResponse, ResponseLoadReport, ResponseRecord,
};

/// Column carrying the platform's response id
pub const RESPONSE_ID_FIELD: &str = "ResponseId";
/// Column carrying the submission time
pub const END_DATE_FIELD: &str = "EndDate";

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Delete the survey's existing responses before inserting
    pub replace_existing: bool,
    pub insert_mode: InsertMode,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            replace_existing: true,
            insert_mode: InsertMode::Lenient,
        }
    }
}

impl From<&LoadConfig> for LoadOptions {
    fn from(config: &LoadConfig) -> Self {
        Self {
            replace_existing: config.replace_existing,
            insert_mode: config.insert_mode,
        }
    }
}

/// Parse a submission timestamp, keeping the offset it was written with
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`,
/// `MM/DD/YYYY HH:MM` and `YYYY-MM-DD`. Values without an offset are UTC.
pub fn parse_end_date(value: &Value) -> Option<DateTime<FixedOffset>> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed);
    }
    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    Some(naive.and_utc().fixed_offset())
}

/// Derive the stored columns of one record
///
/// A record without a response id gets `generated_{survey_uuid}_{index}`.
/// An unparsable end date leaves every temporal column null.
pub fn prepare_response(survey_uuid: Uuid, index: usize, record: &ResponseRecord) -> PreparedResponse {
    let qualtrics_response_id = match record.get(RESPONSE_ID_FIELD) {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        None | Some(Value::Null) | Some(Value::String(_)) => {
            format!("generated_{}_{}", survey_uuid, index)
        }
        Some(other) => other.to_string(),
    };

    // Period follows the calendar date as written, not the UTC instant
    let end_date = record.get(END_DATE_FIELD).and_then(parse_end_date);
    let submitted_at = end_date.map(|t| t.with_timezone(&Utc));
    let period_year = end_date.map(|t| t.year());
    let period_month = end_date.and_then(|t| NaiveDate::from_ymd_opt(t.year(), t.month(), 1));

    PreparedResponse {
        qualtrics_response_id,
        submitted_at,
        period_year,
        period_month,
        response_data: Value::Object(record.clone()),
    }
}

pub struct DataLoader {
    store: Arc<dyn SurveyStore>,
}

impl DataLoader {
    pub fn new(store: Arc<dyn SurveyStore>) -> Self {
        Self { store }
    }

    /// Write `{field_mappings, key_fields, updated_at}` to the survey's row
    ///
    /// Never raises: an unknown survey or a storage error is reported as a
    /// failed load and nothing is written.
    pub async fn load_mappings(&self, survey_id: &str, data: &MappingsData) -> MappingLoadReport {
        let document = json!({
            "field_mappings": data.mappings,
            "key_fields": data.key_fields,
            "updated_at": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        });

        let mut report = MappingLoadReport {
            success: false,
            survey_id: survey_id.to_string(),
            action: "failed".to_string(),
            mappings_count: data.mappings.len(),
            key_fields_count: data.key_fields.len(),
            error: None,
        };

        match self.store.update_field_mapping(survey_id, &document).await {
            Ok(0) => {
                warn!(survey_id, "field_mapping not updated, no surveys row matched");
                report.error = Some(EtlError::SurveyNotFound(survey_id.to_string()).to_string());
            }
            Ok(rows) => {
                info!(
                    survey_id,
                    rows,
                    mappings = report.mappings_count,
                    key_fields = report.key_fields_count,
                    "field_mapping updated"
                );
                report.success = true;
                report.action = "updated".to_string();
            }
            Err(e) => {
                error!(survey_id, error = %e, "Failed to load mappings");
                report.error = Some(e.to_string());
            }
        }

        report
    }

    /// Replace a survey's responses with `records` in one transaction
    pub async fn load_responses(
        &self,
        survey_id: &str,
        records: &[ResponseRecord],
        options: &LoadOptions,
    ) -> Result<ResponseLoadReport> {
        let survey_uuid = self
            .store
            .find_survey_id(survey_id)
            .await?
            .ok_or_else(|| EtlError::SurveyNotFound(survey_id.to_string()))?;

        let rows: Vec<PreparedResponse> = records
            .iter()
            .enumerate()
            .map(|(idx, record)| prepare_response(survey_uuid, idx, record))
            .collect();

        if rows.is_empty() {
            warn!(survey_id, "No response data to insert");
        }

        let outcome = self
            .store
            .replace_responses(survey_uuid, &rows, options.replace_existing, options.insert_mode)
            .await?;

        let report = ResponseLoadReport {
            deleted_count: outcome.deleted,
            inserted_count: outcome.inserted,
            skipped_count: outcome.skipped,
            total_input_records: records.len() as u64,
        };
        info!(
            survey_id,
            %survey_uuid,
            deleted = report.deleted_count,
            inserted = report.inserted_count,
            skipped = report.skipped_count,
            total = report.total_input_records,
            "Responses loaded"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(value: Value) -> ResponseRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("record must be an object"),
        }
    }

    #[test]
    fn test_end_date_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap();
        for text in [
            "2024-03-15 10:30:00",
            "2024-03-15T10:30:00",
            "2024-03-15T10:30:00Z",
            "2024-03-15T12:30:00+02:00",
            "03/15/2024 10:30",
        ] {
            assert_eq!(parse_end_date(&json!(text)), Some(expected.fixed_offset()), "{}", text);
        }
        assert_eq!(
            parse_end_date(&json!("2024-03-15")),
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap().fixed_offset())
        );
    }

    #[test]
    fn test_end_date_rejects_garbage() {
        assert_eq!(parse_end_date(&json!("not a date")), None);
        assert_eq!(parse_end_date(&json!("")), None);
        assert_eq!(parse_end_date(&Value::Null), None);
        assert_eq!(parse_end_date(&json!(20240315)), None);
    }

    #[test]
    fn test_prepare_derives_period() {
        let id = Uuid::new_v4();
        let rec = record(json!({"ResponseId": "R_abc", "EndDate": "2023-11-28 08:00:00"}));
        let prepared = prepare_response(id, 0, &rec);

        assert_eq!(prepared.qualtrics_response_id, "R_abc");
        assert_eq!(prepared.period_year, Some(2023));
        assert_eq!(prepared.period_month, NaiveDate::from_ymd_opt(2023, 11, 1));
        assert_eq!(prepared.response_data, Value::Object(rec));
    }

    #[test]
    fn test_prepare_generates_missing_response_id() {
        let id = Uuid::new_v4();
        let expected = format!("generated_{}_4", id);

        for rec in [json!({}), json!({"ResponseId": null}), json!({"ResponseId": ""})] {
            let prepared = prepare_response(id, 4, &record(rec));
            assert_eq!(prepared.qualtrics_response_id, expected);
        }
    }

    #[test]
    fn test_prepare_period_uses_written_offset() {
        let rec = record(json!({"EndDate": "2024-03-31T23:30:00-05:00"}));
        let prepared = prepare_response(Uuid::new_v4(), 0, &rec);

        assert_eq!(
            prepared.submitted_at,
            Some(Utc.with_ymd_and_hms(2024, 4, 1, 4, 30, 0).unwrap())
        );
        assert_eq!(prepared.period_year, Some(2024));
        assert_eq!(prepared.period_month, NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn test_prepare_unparsable_date_nulls_temporal_fields() {
        let prepared = prepare_response(Uuid::new_v4(), 0, &record(json!({"EndDate": "soon"})));
        assert_eq!(prepared.submitted_at, None);
        assert_eq!(prepared.period_year, None);
        assert_eq!(prepared.period_month, None);
    }
}
