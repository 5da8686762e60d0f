//! In-process survey platform API
//!
//! Serves the export and survey-definition endpoints under `/API/v3` with
//! scripted behavior, and records every request path it sees.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use qdp_etl::services::{PollSettings, QualtricsApi};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const TEST_TOKEN: &str = "test-token";
pub const PROGRESS_ID: &str = "ES_progress1";
pub const FILE_ID: &str = "F_file1";

struct Script {
    /// Progress statuses served in order; the last one repeats
    statuses: VecDeque<String>,
    start_error: Option<u16>,
    omit_progress_id: bool,
    archive: Vec<u8>,
    definitions: HashMap<String, Value>,
    requests: Vec<String>,
    progress_polls: usize,
}

#[derive(Clone)]
struct PlatformState {
    script: Arc<Mutex<Script>>,
}

impl PlatformState {
    fn with<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().unwrap();
        f(&mut script)
    }
}

pub struct MockPlatform {
    pub base_url: String,
    state: PlatformState,
    server: tokio::task::JoinHandle<()>,
}

impl MockPlatform {
    /// Start a platform whose exports complete on the first poll
    pub async fn start() -> Self {
        let state = PlatformState {
            script: Arc::new(Mutex::new(Script {
                statuses: VecDeque::from(vec!["complete".to_string()]),
                start_error: None,
                omit_progress_id: false,
                archive: Vec::new(),
                definitions: HashMap::new(),
                requests: Vec::new(),
                progress_polls: 0,
            })),
        };

        let router = Router::new()
            .route(
                "/API/v3/surveys/:survey_id/export-responses/",
                post(start_export),
            )
            .route(
                "/API/v3/surveys/:survey_id/export-responses/:job_id",
                get(export_progress),
            )
            .route(
                "/API/v3/surveys/:survey_id/export-responses/:job_id/file",
                get(export_file),
            )
            .route("/API/v3/survey-definitions/:survey_id", get(survey_definition))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/API/v3", addr),
            state,
            server,
        }
    }

    pub fn api(&self) -> QualtricsApi {
        QualtricsApi::new(&self.base_url, TEST_TOKEN, Duration::from_secs(5)).unwrap()
    }

    pub fn api_with_token(&self, token: &str) -> QualtricsApi {
        QualtricsApi::new(&self.base_url, token, Duration::from_secs(5)).unwrap()
    }

    /// Poll settings short enough for tests
    pub fn fast_poll(max_wait_ms: u64) -> PollSettings {
        PollSettings {
            max_wait: Duration::from_millis(max_wait_ms),
            interval: Duration::from_millis(10),
        }
    }

    pub fn set_statuses(&self, statuses: &[&str]) {
        self.state.with(|s| {
            s.statuses = statuses.iter().map(|v| v.to_string()).collect();
        });
    }

    pub fn fail_export_start(&self, status: u16) {
        self.state.with(|s| s.start_error = Some(status));
    }

    pub fn omit_progress_id(&self) {
        self.state.with(|s| s.omit_progress_id = true);
    }

    pub fn set_archive(&self, archive: Vec<u8>) {
        self.state.with(|s| s.archive = archive);
    }

    /// Serve `definition` as the `result` of `survey-definitions/{survey_id}`
    pub fn set_definition(&self, survey_id: &str, definition: Value) {
        self.state
            .with(|s| s.definitions.insert(survey_id.to_string(), definition));
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.with(|s| s.requests.clone())
    }

    pub fn progress_polls(&self) -> usize {
        self.state.with(|s| s.progress_polls)
    }
}

impl Drop for MockPlatform {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("x-api-token")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |token| token == TEST_TOKEN)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"meta": {"httpStatus": "401 - Unauthorized"}})),
    )
        .into_response()
}

async fn start_export(
    State(state): State<PlatformState>,
    Path(survey_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    state.with(|s| {
        s.requests.push(format!("POST export {}", survey_id));
        if let Some(code) = s.start_error {
            let status = StatusCode::from_u16(code).unwrap();
            return (status, "upstream exploded").into_response();
        }
        if s.omit_progress_id {
            return Json(json!({"result": {}})).into_response();
        }
        Json(json!({"result": {"progressId": PROGRESS_ID, "percentComplete": 0.0}})).into_response()
    })
}

async fn export_progress(
    State(state): State<PlatformState>,
    Path((survey_id, progress_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    state.with(|s| {
        s.requests
            .push(format!("GET progress {} {}", survey_id, progress_id));
        s.progress_polls += 1;

        let status = if s.statuses.len() > 1 {
            s.statuses.pop_front().unwrap_or_default()
        } else {
            s.statuses.front().cloned().unwrap_or_default()
        };
        let mut result = json!({"status": status, "percentComplete": 50.0});
        if status == "complete" {
            result["percentComplete"] = json!(100.0);
            result["fileId"] = json!(FILE_ID);
        }
        Json(json!({"result": result})).into_response()
    })
}

async fn export_file(
    State(state): State<PlatformState>,
    Path((survey_id, file_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    state.with(|s| {
        s.requests.push(format!("GET file {} {}", survey_id, file_id));
        (
            [(header::CONTENT_TYPE, "application/zip")],
            s.archive.clone(),
        )
            .into_response()
    })
}

async fn survey_definition(
    State(state): State<PlatformState>,
    Path(survey_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    state.with(|s| {
        s.requests.push(format!("GET definition {}", survey_id));
        match s.definitions.get(&survey_id) {
            Some(definition) => Json(json!({"result": definition})).into_response(),
            None => (
                StatusCode::NOT_FOUND,
                Json(json!({"meta": {"error": {"errorMessage": "Survey not found"}}})),
            )
                .into_response(),
        }
    })
}
