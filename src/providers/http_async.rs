//! HTTP-backed provider adapter: submit/poll/fetch as three plain REST
//! calls against a configured base URL, sharing one process-wide
//! `reqwest::Client` (cheap to clone, connection-pooled, safe to call
//! concurrently from many in-flight jobs).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::{ProviderEndpoints, TimeoutPolicy};
use crate::error::{classify_reqwest_error, ProviderError};

use super::{ProviderAdapter, ProviderResult};

pub struct HttpAsyncProvider {
    name: String,
    base_url: String,
    endpoints: ProviderEndpoints,
    health_endpoint: Option<String>,
    timeouts: TimeoutPolicy,
    client: reqwest::Client,
}

impl HttpAsyncProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        endpoints: ProviderEndpoints,
        health_endpoint: Option<String>,
        timeouts: TimeoutPolicy,
        client: reqwest::Client,
    ) -> Self {
        Self { name: name.into(), base_url: base_url.into(), endpoints, health_endpoint, timeouts, client }
    }

    fn header_map(headers: &HashMap<String, String>) -> reqwest::header::HeaderMap {
        let mut map = reqwest::header::HeaderMap::new();
        for (name, value) in headers {
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(name.as_bytes()),
                reqwest::header::HeaderValue::from_str(value),
            ) {
                map.insert(name, value);
            }
        }
        map
    }
}

#[async_trait]
impl ProviderAdapter for HttpAsyncProvider {
    async fn submit(
        &self,
        job: &crate::model::JobRequest,
        headers: &HashMap<String, String>,
    ) -> Result<String, ProviderError> {
        let url = format!("{}{}", self.base_url, self.endpoints.submit);
        let response = self
            .client
            .post(&url)
            .headers(Self::header_map(headers))
            .json(job)
            .timeout(Duration::from_secs(self.timeouts.submit_s))
            .send()
            .await
            .map_err(classify_reqwest_error)?
            .error_for_status()
            .map_err(classify_reqwest_error)?;
        let data: Map<String, Value> = response.json().await.map_err(classify_reqwest_error)?;
        let provider_job_id = data
            .get("job_id")
            .or_else(|| data.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);
        provider_job_id.ok_or_else(|| {
            ProviderError::new(
                format!("provider {}: missing provider job id", self.name),
                crate::error::ErrorType::Unknown,
            )
        })
    }

    async fn poll(
        &self,
        provider_job_id: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Map<String, Value>, ProviderError> {
        let url = format!("{}{}", self.base_url, self.endpoints.poll.replace("{job_id}", provider_job_id));
        let response = self
            .client
            .get(&url)
            .headers(Self::header_map(headers))
            .timeout(Duration::from_secs(self.timeouts.poll_s))
            .send()
            .await
            .map_err(classify_reqwest_error)?
            .error_for_status()
            .map_err(classify_reqwest_error)?;
        response.json().await.map_err(classify_reqwest_error)
    }

    async fn fetch(
        &self,
        provider_job_id: &str,
        headers: &HashMap<String, String>,
    ) -> Result<ProviderResult, ProviderError> {
        let url = format!("{}{}", self.base_url, self.endpoints.fetch.replace("{job_id}", provider_job_id));
        let response = self
            .client
            .get(&url)
            .headers(Self::header_map(headers))
            .timeout(Duration::from_secs(self.timeouts.fetch_s))
            .send()
            .await
            .map_err(classify_reqwest_error)?
            .error_for_status()
            .map_err(classify_reqwest_error)?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if content_type.contains("application/json") {
            let data: Map<String, Value> = response.json().await.map_err(classify_reqwest_error)?;
            let output_url = data
                .get("output_url")
                .or_else(|| data.get("url"))
                .and_then(Value::as_str)
                .map(str::to_string);
            return Ok(ProviderResult {
                provider_job_id: provider_job_id.to_string(),
                status: "succeeded".to_string(),
                output_url,
                output_bytes: None,
                metadata: Some(data),
            });
        }
        let bytes = response.bytes().await.map_err(classify_reqwest_error)?;
        Ok(ProviderResult {
            provider_job_id: provider_job_id.to_string(),
            status: "succeeded".to_string(),
            output_url: None,
            output_bytes: Some(bytes.to_vec()),
            metadata: None,
        })
    }

    async fn healthcheck(&self, headers: &HashMap<String, String>) -> Result<bool, ProviderError> {
        let Some(health_endpoint) = &self.health_endpoint else {
            return Ok(true);
        };
        let url = format!("{}{}", self.base_url, health_endpoint);
        let response = self
            .client
            .get(&url)
            .headers(Self::header_map(headers))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        let status = response.status();
        response.error_for_status().map_err(classify_reqwest_error)?;
        Ok(status.as_u16() == 200)
    }
}
