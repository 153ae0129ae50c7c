//! Provider adapters: a uniform async interface over each backend, kept
//! deliberately thin (submit/poll/fetch/healthcheck) so the orchestrator
//! never needs to know which concrete provider it is driving.

pub mod http_async;
pub mod spec_only;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::model::JobRequest;

/// Result of a completed `fetch`: either inline bytes or a URL to the
/// output, plus whatever raw metadata the provider returned.
#[derive(Debug, Clone, Default)]
pub struct ProviderResult {
    pub provider_job_id: String,
    pub status: String,
    pub output_url: Option<String>,
    pub output_bytes: Option<Vec<u8>>,
    pub metadata: Option<Map<String, Value>>,
}

/// Uniform interface implemented by every provider backend. `submit`
/// starts an async job on the remote side; `poll` checks its progress;
/// `fetch` retrieves the finished output; `healthcheck` is a best-effort
/// liveness probe used by the health scheduler.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn submit(
        &self,
        job: &JobRequest,
        headers: &HashMap<String, String>,
    ) -> Result<String, ProviderError>;

    async fn poll(
        &self,
        provider_job_id: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Map<String, Value>, ProviderError>;

    async fn fetch(
        &self,
        provider_job_id: &str,
        headers: &HashMap<String, String>,
    ) -> Result<ProviderResult, ProviderError>;

    async fn healthcheck(&self, headers: &HashMap<String, String>) -> Result<bool, ProviderError> {
        let _ = headers;
        Ok(true)
    }
}
