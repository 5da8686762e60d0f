//! Code → label mappings extracted from survey definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Choice tables for retained questions
///
/// `key_fields` holds the privileged single labels (currently only the
/// service type); every other retained tag lands in `mappings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingsData {
    pub mappings: BTreeMap<String, BTreeMap<String, String>>,
    pub key_fields: BTreeMap<String, String>,
}

impl MappingsData {
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty() && self.key_fields.is_empty()
    }
}
