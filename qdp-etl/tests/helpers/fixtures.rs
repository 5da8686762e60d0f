//! Export and definition fixtures

use std::io::{Cursor, Write};
use std::sync::Arc;

use qdp_etl::db::{SqliteSurveyStore, SurveyStore};
use serde_json::{json, Value};
use zip::write::SimpleFileOptions;

pub const EXPORT_HEADER: &str = "StartDate,EndDate,ResponseId,Facility,Satisfaction,NPS,Ab_Wait,Q99";

/// One exported response row
pub struct Row<'a> {
    pub response_id: &'a str,
    pub end_date: &'a str,
    pub facility: &'a str,
    pub satisfaction: &'a str,
}

impl<'a> Row<'a> {
    pub fn new(response_id: &'a str, end_date: &'a str) -> Self {
        Self {
            response_id,
            end_date,
            facility: "North",
            satisfaction: "5",
        }
    }
}

/// Export CSV with the platform's two extra header rows
pub fn export_csv(rows: &[Row<'_>]) -> String {
    let mut csv = String::new();
    csv.push_str(EXPORT_HEADER);
    csv.push('\n');
    csv.push_str("Start Date,End Date,Response ID,Which facility?,How satisfied?,NPS,Wait,Other\n");
    csv.push_str("ImportId:startDate,ImportId:endDate,ImportId:_recordId,ImportId:QID1,ImportId:QID2,ImportId:QID3,ImportId:QID4,ImportId:QID99\n");
    for row in rows {
        csv.push_str(&format!(
            "2024-01-01 00:00:00,{},{},{},{},9,Short,ignored\n",
            row.end_date, row.response_id, row.facility, row.satisfaction
        ));
    }
    csv
}

/// `count` rows with ids `{prefix}_{n}` submitted in March 2024
pub fn numbered_csv(prefix: &str, count: usize) -> String {
    let ids: Vec<String> = (0..count).map(|n| format!("{}_{}", prefix, n)).collect();
    let rows: Vec<Row<'_>> = ids
        .iter()
        .map(|id| Row::new(id, "2024-03-15 10:30:00"))
        .collect();
    export_csv(&rows)
}

pub fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Survey definition with one question of each interesting shape
pub fn sample_definition() -> Value {
    json!({
        "SurveyName": "Patient Experience",
        "Questions": {
            "QID1": {
                "DataExportTag": "Facility",
                "Choices": {"1": {"Display": "North"}, "2": {"Display": "South"}}
            },
            "QID2": {
                "DataExportTag": "ServiceType",
                "Choices": {"1": {"Display": "Outpatient"}, "2": {"Display": "Inpatient"}}
            },
            "QID3": {
                "DataExportTag": "Ab_Wait",
                "Choices": {"1": {"Display": "Short"}, "2": {"Display": "Long"}}
            },
            "QID4": {
                "DataExportTag": "Q99",
                "Choices": {"1": {"Display": "Ignored"}}
            },
            "QID5": {
                "DataExportTag": "Satisfaction",
                "QuestionText": "Free text, no choices"
            }
        }
    })
}

pub async fn memory_store() -> Arc<SqliteSurveyStore> {
    Arc::new(SqliteSurveyStore::in_memory().await.unwrap())
}

pub fn as_dyn(store: &Arc<SqliteSurveyStore>) -> Arc<dyn SurveyStore> {
    store.clone()
}
