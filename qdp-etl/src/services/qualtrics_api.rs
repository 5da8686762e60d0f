//! Survey platform HTTP access shared by the export and definition clients

use qdp_common::config::QualtricsConfig;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{EtlError, Result};

const USER_AGENT: &str = concat!("qdp-etl/", env!("CARGO_PKG_VERSION"));
const API_TOKEN_HEADER: &str = "x-api-token";
/// Error bodies are truncated to this many characters in messages
const ERROR_BODY_LIMIT: usize = 300;

/// Every platform response wraps its payload in `result`
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub result: Option<T>,
}

/// Authenticated client for one platform account
#[derive(Clone)]
pub struct QualtricsApi {
    http: reqwest::Client,
    base_url: String,
}

impl QualtricsApi {
    pub fn new(base_url: &str, api_token: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(api_token)
            .map_err(|_| EtlError::api(None, "API token contains invalid header characters"))?;
        token.set_sensitive(true);
        headers.insert(API_TOKEN_HEADER, token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &QualtricsConfig) -> Result<Self> {
        Self::new(&config.api_base_url()?, config.api_token()?, config.timeout())
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.url(path))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.url(path))
    }

    /// Send, require a success status, return the raw response
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::api(Some(status.as_u16()), truncate(&body)));
        }
        Ok(response)
    }

    /// Send and decode the `result` payload of a JSON envelope
    pub(crate) async fn send_for_result<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| EtlError::api(Some(status), format!("Malformed response body: {}", e)))?;
        envelope
            .result
            .ok_or_else(|| EtlError::api(Some(status), "Response has no 'result'"))
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
