//! Survey definition client

use serde::Deserialize;
use tracing::info;

use super::qualtrics_api::QualtricsApi;
use crate::error::{EtlError, Result};
use crate::models::QuestionMap;

#[derive(Debug, Deserialize)]
struct SurveyDefinition {
    #[serde(rename = "Questions")]
    questions: Option<QuestionMap>,
}

pub struct MappingFetcher {
    api: QualtricsApi,
}

impl MappingFetcher {
    pub fn new(api: QualtricsApi) -> Self {
        Self { api }
    }

    /// Question definitions of one survey, keyed by question id
    pub async fn fetch_question_definitions(&self, survey_id: &str) -> Result<QuestionMap> {
        let request = self.api.get(&format!("survey-definitions/{}", survey_id));
        let definition: SurveyDefinition = self.api.send_for_result(request).await?;

        let questions = definition
            .questions
            .ok_or_else(|| EtlError::api(None, "Survey definition has no Questions"))?;

        info!(survey_id, questions = questions.len(), "Fetched survey definition");
        Ok(questions)
    }
}
