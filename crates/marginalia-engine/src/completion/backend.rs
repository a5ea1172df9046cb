use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::completion::context::CompletionContext;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("Completion request was aborted")]
    Aborted,
    #[error("Completion request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Completion backend failed: {0}")]
    Backend(String),
}

/// A single request issued when the debounce window closes
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub request_id: u64,
    pub context: CompletionContext,
    pub timeout: Duration,
    /// Cancelled when the request is superseded, dismissed or torn down.
    /// Backends should stop work as soon as it fires.
    pub signal: CancellationToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub completion: String,
}

impl CompletionResponse {
    pub fn new(completion: impl Into<String>) -> Self {
        Self {
            completion: completion.into(),
        }
    }
}

#[async_trait(?Send)]
pub trait CompletionBackend {
    async fn complete(&self, request: CompletionRequest)
    -> Result<CompletionResponse, CompletionError>;
}

/// Run a request against a backend, honouring its signal and timeout.
///
/// A response that arrives after the signal fired is reported as aborted,
/// whatever the backend returned.
pub async fn fetch_completion(
    backend: &dyn CompletionBackend,
    request: CompletionRequest,
) -> Result<CompletionResponse, CompletionError> {
    let signal = request.signal.clone();
    let timeout = request.timeout;

    let result = tokio::select! {
        biased;
        _ = signal.cancelled() => Err(CompletionError::Aborted),
        result = tokio::time::timeout(timeout, backend.complete(request)) => {
            result.unwrap_or(Err(CompletionError::Timeout(timeout)))
        }
    };

    if signal.is_cancelled() {
        return Err(CompletionError::Aborted);
    }
    result
}
