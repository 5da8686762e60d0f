//! Mapping extraction and response column selection
//!
//! Both transforms are pure: every call builds its output from its inputs
//! alone.

use csv::ReaderBuilder;
use qdp_common::config::FieldsConfig;
use qdp_common::FieldPolicy;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::models::{MappingsData, QuestionMap, RawTable, ResponseRecord};

/// Export tag whose first choice label is promoted into `key_fields`
pub const SERVICE_TYPE_TAG: &str = "ServiceType";
/// Choice code holding the service type label
pub const SERVICE_TYPE_CHOICE: &str = "1";
/// Leading data rows in every export that hold question text and import ids
pub const EXPORT_HEADER_ROWS: usize = 2;

const UTF8_BOM: char = '\u{feff}';

/// Build code → label tables for the questions the policy admits
///
/// Questions without an export tag, with a rejected tag, or without choices
/// contribute nothing. The service type contributes only its choice `"1"`
/// label (empty when that choice is missing).
pub fn extract_mappings(questions: &QuestionMap, policy: &FieldPolicy) -> MappingsData {
    let mut data = MappingsData::default();

    for question in questions.values() {
        let Some(tag) = question.export_tag() else {
            continue;
        };
        if !policy.matches(tag) {
            continue;
        }

        let mut labels = question.choice_labels();
        if labels.is_empty() {
            continue;
        }

        if tag == SERVICE_TYPE_TAG {
            let label = labels.remove(SERVICE_TYPE_CHOICE).unwrap_or_default();
            data.key_fields.insert(tag.to_string(), label);
        } else {
            data.mappings.insert(tag.to_string(), labels);
        }
    }

    data
}

/// Restrict each data row to the policy's columns
///
/// The first [`EXPORT_HEADER_ROWS`] rows are dropped unconditionally. Empty
/// cells and cells missing from short rows become JSON null.
pub fn select_response_fields(table: &RawTable, policy: &FieldPolicy) -> Vec<ResponseRecord> {
    let columns = policy.select_columns(&table.headers);
    debug!(
        retained = columns.len(),
        available = table.headers.len(),
        "Selected response columns"
    );

    (EXPORT_HEADER_ROWS..table.row_count())
        .map(|row| {
            columns
                .iter()
                .map(|&col| {
                    let value = table
                        .cell(row, col)
                        .map_or(Value::Null, |v| Value::String(v.to_string()));
                    (table.headers[col].clone(), value)
                })
                .collect()
        })
        .collect()
}

/// Parse export CSV content: header row first, ragged rows allowed
///
/// Invalid UTF-8 is replaced rather than rejected.
pub fn parse_raw_table(bytes: &[u8]) -> Result<RawTable> {
    let content = String::from_utf8_lossy(bytes);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            if idx == 0 {
                h.trim_start_matches(UTF8_BOM).to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }

    Ok(RawTable { headers, rows })
}

pub fn read_raw_table(path: &Path) -> Result<RawTable> {
    let bytes = std::fs::read(path)?;
    parse_raw_table(&bytes)
}

/// Transformer bound to the configured field policies
#[derive(Debug, Clone)]
pub struct Transformer {
    mapping_policy: FieldPolicy,
    response_policy: FieldPolicy,
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new(FieldPolicy::mapping_fields(), FieldPolicy::response_key_fields())
    }
}

impl Transformer {
    pub fn new(mapping_policy: FieldPolicy, response_policy: FieldPolicy) -> Self {
        Self {
            mapping_policy,
            response_policy,
        }
    }

    pub fn from_config(fields: &FieldsConfig) -> Self {
        Self::new(fields.mapping.clone(), fields.response.clone())
    }

    pub fn extract_mappings(&self, questions: &QuestionMap) -> MappingsData {
        extract_mappings(questions, &self.mapping_policy)
    }

    pub fn select_response_fields(&self, table: &RawTable) -> Vec<ResponseRecord> {
        select_response_fields(table, &self.response_policy)
    }

    /// Read an export file and select its response fields
    pub fn transform_file(&self, path: &Path) -> Result<Vec<ResponseRecord>> {
        let table = read_raw_table(path)?;
        Ok(self.select_response_fields(&table))
    }
}
