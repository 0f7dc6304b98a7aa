//! GeminiService - GenerativeService over the Gemini REST API.
//!
//! 再試行はしない。失敗を ServiceErrorKind に分類して返すだけ
//! （再試行の判断は RetryPolicy 側）。

use std::time::Duration;

use async_trait::async_trait;
use quill_core::domain::{ServiceError, ServiceErrorKind};
use quill_core::ports::{GenerationRequest, GenerativeService};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use crate::wire::{GenerateContentRequest, GenerateContentResponse};

#[derive(Debug, Clone)]
pub struct GeminiService {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GeminiService {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.endpoint)
    }
}

/// HTTP status -> failure class.
pub fn classify_status(status: StatusCode) -> ServiceErrorKind {
    match status.as_u16() {
        429 => ServiceErrorKind::RateLimited,
        500 | 502 | 503 | 504 => ServiceErrorKind::Unavailable,
        _ => ServiceErrorKind::Other,
    }
}

fn classify_transport(err: &reqwest::Error) -> ServiceErrorKind {
    if err.is_timeout() {
        ServiceErrorKind::Timeout
    } else if err.is_connect() {
        ServiceErrorKind::Unavailable
    } else {
        ServiceErrorKind::Other
    }
}

#[async_trait]
impl GenerativeService for GeminiService {
    #[instrument(skip(self, request), fields(model = %request.model, prompt_len = request.prompt.len()))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        let body = GenerateContentRequest::new(&request.prompt, request.structured);

        let response = self
            .client
            .post(self.url(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::new(classify_transport(&e), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ServiceError::new(
                classify_status(status),
                format!("HTTP {status}: {}", detail.trim()),
            ));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::new(classify_transport(&e), format!("bad response body: {e}")))?;
        debug!(candidates = parsed.candidates.len(), "generateContent answered");

        parsed.first_text().ok_or_else(|| {
            ServiceError::other(match &parsed.prompt_feedback {
                Some(feedback) => format!("no candidate text (prompt feedback: {feedback})"),
                None => "no candidate text".to_string(),
            })
        })
    }
}
