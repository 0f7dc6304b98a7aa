//! Errors - エラー型と分類
//!
//! | 種別 | 方針 |
//! |------|------|
//! | ServiceError (retryable) | attempt 上限まで backoff 付きで再試行 |
//! | ServiceError (Other) | 即座に失敗、行は release |
//! | ValidationError | 再試行しない、行は release（次の claim サイクルで誰かが拾う） |
//! | StoreError | PollLoop まで伝播、ログを出して sleep |
//! | ConfigError | 起動時のみ。プロセスを止める |

use thiserror::Error;

use super::RowId;

/// Task Store failure (network, serialization, constraint...).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("{0} has an undecodable column: {1}")]
    Decode(RowId, String),
}

impl StoreError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Failure class of a generative service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceErrorKind {
    RateLimited,
    Timeout,
    Unavailable,
    Other,
}

impl ServiceErrorKind {
    pub fn is_retryable(self) -> bool {
        !matches!(self, ServiceErrorKind::Other)
    }
}

#[derive(Debug, Clone, Error)]
#[error("generative service {kind:?}: {message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::RateLimited, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Timeout, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Unavailable, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Other, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// The response (or one item of it) does not satisfy the task's schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(String),

    #[error("field `{field}` has value {value:?} outside the allowed set")]
    NotAllowed { field: String, value: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("expected {expected} items, got {got}")]
    CountMismatch { expected: usize, got: usize },
}

/// Unrecoverable startup configuration problem.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: String, reason: String },

    #[error("invalid task table: {0}")]
    InvalidTable(String),

    #[error("unknown task type `{0}`")]
    UnknownTask(String),

    #[error(transparent)]
    Source(#[from] config::ConfigError),
}

/// Errors surfaced to the poll loop.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ServiceErrorKind::RateLimited, true)]
    #[case(ServiceErrorKind::Timeout, true)]
    #[case(ServiceErrorKind::Unavailable, true)]
    #[case(ServiceErrorKind::Other, false)]
    fn retryable_classes(#[case] kind: ServiceErrorKind, #[case] retryable: bool) {
        assert_eq!(ServiceError::new(kind, "x").is_retryable(), retryable);
    }

    #[test]
    fn store_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = StoreError::backend(io);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("reset"));
    }
}
