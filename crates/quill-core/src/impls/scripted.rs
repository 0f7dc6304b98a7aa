//! ScriptedService - ネットワークを使わない GenerativeService
//!
//! テストと `quill demo` 用。
//! - `push_*` で積んだ応答を先頭から順に返す
//! - 積んだ分が尽きたら responder（あれば）に任せる
//! - どちらもなければ `Other` で失敗する

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::ServiceError;
use crate::ports::{GenerationRequest, GenerativeService};

type Responder = Box<dyn Fn(&GenerationRequest) -> Result<String, ServiceError> + Send + Sync>;

#[derive(Default)]
pub struct ScriptedService {
    script: Mutex<VecDeque<Result<String, ServiceError>>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every unscripted call with `f(request)`.
    pub fn with_responder(
        f: impl Fn(&GenerationRequest) -> Result<String, ServiceError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Some(Box::new(f)),
            ..Self::default()
        }
    }

    pub fn push_ok(&self, text: impl Into<String>) -> &Self {
        self.push(Ok(text.into()))
    }

    pub fn push_err(&self, err: ServiceError) -> &Self {
        self.push(Err(err))
    }

    fn push(&self, item: Result<String, ServiceError>) -> &Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(item);
        self
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl GenerativeService for ScriptedService {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match (scripted, &self.responder) {
            (Some(item), _) => item,
            (None, Some(responder)) => responder(request),
            (None, None) => Err(ServiceError::other("script exhausted")),
        }
    }
}
