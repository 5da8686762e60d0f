//! Survey definition questions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Question id → question definition
pub type QuestionMap = BTreeMap<String, Question>;

/// The parts of a survey-definition question the pipeline reads
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Question {
    /// Column name the question exports under
    #[serde(rename = "DataExportTag", default)]
    pub data_export_tag: Option<String>,

    /// Choice code → choice definition; shape varies by question type
    #[serde(rename = "Choices", default)]
    pub choices: Option<Value>,
}

impl Question {
    /// Export tag, treating an empty tag as absent
    pub fn export_tag(&self) -> Option<&str> {
        self.data_export_tag.as_deref().filter(|t| !t.is_empty())
    }

    /// Choice code → display label
    ///
    /// Non-object choice sets (matrix and slider questions send arrays) are
    /// treated as empty. A choice without a `Display` string is labelled with
    /// its own text form.
    pub fn choice_labels(&self) -> BTreeMap<String, String> {
        let Some(Value::Object(choices)) = &self.choices else {
            return BTreeMap::new();
        };

        choices
            .iter()
            .map(|(code, choice)| {
                let label = match choice.get("Display") {
                    Some(Value::String(display)) => display.clone(),
                    _ => text_form(choice),
                };
                (code.clone(), label)
            })
            .collect()
    }
}

fn text_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
