//! Field allow-list policies
//!
//! Every "is this field one we keep?" decision goes through [`FieldPolicy`]:
//! a set of exact field names plus a set of name prefixes. The mapping
//! extraction and the response column selection use separate policies but
//! evaluate them identically.

use serde::{Deserialize, Serialize};

/// Question export tags whose choice tables are extracted as mappings
pub const MAPPING_FIELD_NAMES: &[&str] = &[
    "ServiceType",
    "Facility",
    "Satisfaction",
    "Gender",
    "ParticipantType",
];

/// Response columns retained in transformed records, in output order
pub const RESPONSE_KEY_FIELD_NAMES: &[&str] = &[
    "Facility",
    "Satisfaction",
    "EndDate",
    "NPS",
    "NPS_NPS_GROUP",
    "Gender",
    "ParticipantType",
];

/// Prefixes that admit a field regardless of the exact-name list
pub const KEY_FIELD_PREFIXES: &[&str] = &["Ab_"];

/// Exact names plus prefixes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPolicy {
    /// Field names admitted verbatim (order is preserved for column selection)
    #[serde(default)]
    pub exact: Vec<String>,
    /// Any field starting with one of these is admitted
    #[serde(default)]
    pub prefixes: Vec<String>,
}

impl FieldPolicy {
    pub fn new(exact: &[&str], prefixes: &[&str]) -> Self {
        Self {
            exact: exact.iter().map(|s| s.to_string()).collect(),
            prefixes: prefixes.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Policy applied to question export tags during mapping extraction
    pub fn mapping_fields() -> Self {
        Self::new(MAPPING_FIELD_NAMES, KEY_FIELD_PREFIXES)
    }

    /// Policy applied to CSV columns during response selection
    pub fn response_key_fields() -> Self {
        Self::new(RESPONSE_KEY_FIELD_NAMES, KEY_FIELD_PREFIXES)
    }

    /// True when `name` is listed exactly or starts with a listed prefix
    pub fn matches(&self, name: &str) -> bool {
        self.exact.iter().any(|e| e == name) || self.matches_prefix(name)
    }

    pub fn matches_prefix(&self, name: &str) -> bool {
        self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    /// Indices of the retained columns in output order
    ///
    /// Exact names come first in policy order (only those actually present),
    /// followed by prefix matches in column order. A column is never listed twice.
    pub fn select_columns(&self, columns: &[String]) -> Vec<usize> {
        let mut selected: Vec<usize> = self
            .exact
            .iter()
            .filter_map(|name| columns.iter().position(|c| c == name))
            .collect();

        for (idx, column) in columns.iter().enumerate() {
            if self.matches_prefix(column) && !selected.contains(&idx) {
                selected.push(idx);
            }
        }

        selected
    }
}
