//! GenerativeService port - 外部の生成 API
//!
//! 失敗は ServiceErrorKind で分類する。再試行するかどうかの判断は
//! 呼び出し側（RetryPolicy）が持つ。実装側はリトライしない。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::ServiceError;

/// One prompt for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier, e.g. `gemini-1.5-flash`.
    pub model: String,
    pub prompt: String,
    /// Ask the service for JSON output.
    pub structured: bool,
}

#[async_trait]
pub trait GenerativeService: Send + Sync {
    /// Returns the raw response text (possibly wrapped in formatting).
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError>;
}
