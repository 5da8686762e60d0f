//! Response tables and records

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};

/// One transformed response: column name → raw cell value (string or null)
pub type ResponseRecord = Map<String, Value>;

/// Parsed export file: header row plus data rows as raw strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Cell value; empty cells and cells past the end of a short row are `None`
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A record ready for insertion, with its derived columns
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedResponse {
    pub qualtrics_response_id: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub period_year: Option<i32>,
    /// First day of the submission month
    pub period_month: Option<NaiveDate>,
    pub response_data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_treats_empty_and_short_rows_as_missing() {
        let table = RawTable {
            headers: vec!["A".into(), "B".into(), "C".into()],
            rows: vec![vec!["x".into(), "".into()]],
        };
        assert_eq!(table.cell(0, 0), Some("x"));
        assert_eq!(table.cell(0, 1), None);
        assert_eq!(table.cell(0, 2), None);
        assert_eq!(table.cell(1, 0), None);
    }
}
