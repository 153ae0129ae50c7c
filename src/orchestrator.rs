//! The central attempt pipeline: for each job, walk the provider chain,
//! and for each provider walk the degrade plan, and for each degrade
//! step walk the account-key pool with bounded per-key retries — the
//! first success wins, a structural failure trips the provider's
//! breaker and moves to the next provider, and falling off the end of
//! the chain leaves the job `spec_only`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::accounts::{AccountKeyState, AccountManager};
use crate::artifacts::ArtifactStore;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::ConfigSnapshot;
use crate::degrade::{apply_template, DegradePlan};
use crate::error::{classify_message, retry_backoff, ErrorType, ProviderError};
use crate::job_store::JobStore;
use crate::logging::EventLogger;
use crate::model::{AttemptRecord, AttemptStatus, JobRequest, JobStatus};
use crate::providers::spec_only::SpecOnlyProvider;
use crate::providers::ProviderAdapter;
use crate::registry::ProviderRegistry;
use crate::sleeper::{Sleeper, TokioSleeper};

/// Outcome of walking one provider's degrade-step/key/retry loop for a
/// single job.
struct AttemptOutcome {
    attempts: Vec<AttemptRecord>,
    success: bool,
    spec_only: bool,
    structural_failure: bool,
    error: Option<String>,
    output_path: Option<String>,
}

pub struct Orchestrator {
    snapshot: Arc<ConfigSnapshot>,
    registry: Arc<ProviderRegistry>,
    accounts: Arc<AccountManager>,
    artifacts: Arc<ArtifactStore>,
    jobs: Arc<JobStore>,
    event_logger: Arc<EventLogger>,
    circuit_breaker: CircuitBreaker,
    sleeper: Arc<dyn Sleeper>,
    http_client: reqwest::Client,
}

impl Orchestrator {
    pub fn new(
        snapshot: Arc<ConfigSnapshot>,
        registry: Arc<ProviderRegistry>,
        accounts: Arc<AccountManager>,
        artifacts: Arc<ArtifactStore>,
        jobs: Arc<JobStore>,
        event_logger: Arc<EventLogger>,
    ) -> Self {
        Self::with_sleeper(
            snapshot,
            registry,
            accounts,
            artifacts,
            jobs,
            event_logger,
            Arc::new(TokioSleeper),
        )
    }

    pub fn with_sleeper(
        snapshot: Arc<ConfigSnapshot>,
        registry: Arc<ProviderRegistry>,
        accounts: Arc<AccountManager>,
        artifacts: Arc<ArtifactStore>,
        jobs: Arc<JobStore>,
        event_logger: Arc<EventLogger>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let circuit_breaker = CircuitBreaker::new(
            snapshot.policies.circuit_breaker.failure_threshold,
            snapshot.policies.circuit_breaker.recovery_time_s,
        );
        Self {
            snapshot,
            registry,
            accounts,
            artifacts,
            jobs,
            event_logger,
            circuit_breaker,
            sleeper,
            http_client: reqwest::Client::new(),
        }
    }

    /// Run one job to completion, updating the job store and writing
    /// every artifact along the way. Never returns an error: every
    /// failure mode ends in a terminal `JobStatus` on the job record.
    pub async fn run_job(&self, job_id: &str, job: JobRequest) {
        self.jobs.update_status(job_id, JobStatus::Running, None);
        if let Err(err) = self.artifacts.init_job(job_id, &job) {
            tracing::error!(job_id, %err, "failed to initialize artifact directory");
        }

        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let degrade_plan = DegradePlan::new(self.snapshot.policies.degrade_plan.clone());
        let provider_chain = self.resolve_provider_chain();

        let mut job = job;
        if let Some(template_name) = job.template_name().map(str::to_string) {
            if let Some(template) = self.snapshot.templates.templates.get(&template_name) {
                job = apply_template(&job, template);
            }
        }

        let mut success = false;
        let mut spec_only_hit = false;
        let mut last_job = job.clone();

        'chain: for provider_name in &provider_chain {
            if !self.registry.exists(provider_name) {
                continue;
            }
            if self.circuit_breaker.is_open(provider_name) {
                self.registry.set_circuit(provider_name, true);
                attempts.push(skipped_attempt_record(provider_name, "circuit_open"));
                continue;
            }
            let Some(provider) = self.registry.get(provider_name) else { continue };

            for step_index in degrade_plan.indices() {
                let degraded_job = degrade_plan.apply(&job, step_index);
                last_job = degraded_job.clone();

                let outcome = self
                    .attempt_provider(job_id, provider_name, provider, &degraded_job, step_index)
                    .await;
                attempts.extend(outcome.attempts);

                if outcome.spec_only {
                    spec_only_hit = true;
                    break;
                }
                if outcome.success {
                    success = true;
                    self.circuit_breaker.record_success(provider_name);
                    self.registry.set_circuit(provider_name, false);
                    if let Some(output_path) = outcome.output_path {
                        self.jobs.add_artifact(job_id, "output", output_path);
                    }
                    break;
                }
                if outcome.structural_failure {
                    self.circuit_breaker.record_failure(
                        provider_name,
                        outcome.error.unwrap_or_else(|| "failure".to_string()),
                    );
                    self.registry.set_circuit(provider_name, self.circuit_breaker.is_open(provider_name));
                    break;
                }
            }

            if success || spec_only_hit {
                break 'chain;
            }
        }

        let spec_provider = SpecOnlyProvider::new();
        let scene_spec = spec_provider.build_scene_spec(&last_job);
        let final_prompt = spec_provider.build_final_prompt(&last_job);
        if let Ok(path) = self.artifacts.write_scene_spec(job_id, &scene_spec) {
            self.jobs.add_artifact(job_id, "scene_spec", path);
        }
        if let Ok(path) = self.artifacts.write_final_prompt(job_id, &final_prompt) {
            self.jobs.add_artifact(job_id, "final_prompt", path);
        }
        if let Err(err) = self.artifacts.write_attempts(job_id, &attempts) {
            tracing::error!(job_id, %err, "failed to write attempt history");
        }

        if success {
            self.jobs.update_status(job_id, JobStatus::Succeeded, None);
        } else {
            self.jobs.update_status(job_id, JobStatus::SpecOnly, None);
        }
    }

    /// Walk the account-key pool for one provider at one degrade step:
    /// each key gets up to `max_attempts` retries before moving to the
    /// next key, bounded by the pool size (or one bare attempt when the
    /// provider has no configured pool).
    async fn attempt_provider(
        &self,
        job_id: &str,
        provider_name: &str,
        provider: &dyn ProviderAdapter,
        job: &JobRequest,
        step_index: usize,
    ) -> AttemptOutcome {
        let mut attempts = Vec::new();
        let max_retries = self.snapshot.policies.retry.max_attempts;
        let backoff_s = self.snapshot.policies.retry.backoff_s;
        let pool_size = self.accounts.pool_size(provider_name);
        let key_attempts = pool_size.max(1);

        for _ in 0..key_attempts {
            let key = self.accounts.select_key(provider_name);
            let mut headers = self.registry.headers(provider_name);
            if let Some(key) = &key {
                headers.extend(key.headers.clone());
            }

            for attempt_index in 0..max_retries {
                let started_at = Utc::now();
                match self.try_once(job_id, provider_name, provider, job, &headers, &key, step_index, started_at).await
                {
                    Ok(success_outcome) => {
                        attempts.push(success_outcome.0);
                        return AttemptOutcome {
                            attempts,
                            success: true,
                            spec_only: success_outcome.1,
                            structural_failure: false,
                            error: None,
                            output_path: success_outcome.2,
                        };
                    }
                    Err(TryOnceError::SpecOnly(record)) => {
                        attempts.push(record);
                        return AttemptOutcome {
                            attempts,
                            success: false,
                            spec_only: true,
                            structural_failure: false,
                            error: None,
                            output_path: None,
                        };
                    }
                    Err(TryOnceError::Failed { record, error_type, message }) => {
                        attempts.push(record);
                        self.event_logger.log("attempt_failed", attempt_failed_payload(job_id, provider_name, error_type, &message));

                        if error_type.exhausts_key() {
                            if let Some(key) = &key {
                                self.accounts.mark_failure(provider_name, &key.key_id);
                            }
                            break;
                        }
                        if error_type == ErrorType::Transient && attempt_index + 1 < max_retries {
                            self.sleeper.sleep(retry_backoff(backoff_s, attempt_index)).await;
                            continue;
                        }
                        return AttemptOutcome {
                            attempts,
                            success: false,
                            spec_only: false,
                            structural_failure: error_type.is_structural_failure(),
                            error: Some(message),
                            output_path: None,
                        };
                    }
                }
            }
        }

        AttemptOutcome {
            attempts,
            success: false,
            spec_only: false,
            structural_failure: true,
            error: Some("exhausted keys".to_string()),
            output_path: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_once(
        &self,
        job_id: &str,
        provider_name: &str,
        provider: &dyn ProviderAdapter,
        job: &JobRequest,
        headers: &HashMap<String, String>,
        key: &Option<AccountKeyState>,
        step_index: usize,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<(AttemptRecord, bool, Option<String>), TryOnceError> {
        let key_id = key.as_ref().map(|k| k.key_id.clone());

        if provider_name == "spec_only" {
            let ended_at = Utc::now();
            let record = attempt_record(
                provider_name, key_id, AttemptStatus::Succeeded, None, None, None, started_at, ended_at, step_index,
            );
            return Err(TryOnceError::SpecOnly(record));
        }

        let result: Result<(String, Option<String>), ProviderError> = async {
            let provider_job_id = provider.submit(job, headers).await?;
            self.event_logger.log(
                "submit",
                Map::from_iter([
                    ("job_id".to_string(), json!(job_id)),
                    ("provider".to_string(), json!(provider_name)),
                    ("provider_job_id".to_string(), json!(provider_job_id)),
                ]),
            );

            let mut status_payload = provider.poll(&provider_job_id, headers).await?;
            let _ = self.artifacts.write_provider_response(job_id, provider_name, &status_payload);
            let status = status_payload.get("status").and_then(Value::as_str).unwrap_or("");
            if status == "running" || status == "queued" {
                self.sleeper.sleep(Duration::from_secs(1)).await;
                status_payload = provider.poll(&provider_job_id, headers).await?;
            }

            let fetch_result = provider.fetch(&provider_job_id, headers).await?;
            let mut output_path = None;
            if let Some(bytes) = &fetch_result.output_bytes {
                if let Ok(path) = self.artifacts.write_output(job_id, bytes, job_output_format(job)) {
                    let thumb = self.artifacts.try_generate_thumbnail(job_id, &path).await;
                    if let Some(thumb) = thumb {
                        self.jobs.add_artifact(job_id, "thumbnail", thumb);
                    }
                    output_path = Some(path);
                }
            }
            if let Some(output_url) = &fetch_result.output_url {
                match self.fetch_output_url(job_id, output_url, job_output_format(job)).await {
                    Some(path) => {
                        self.jobs.add_artifact(job_id, "output", path.clone());
                        output_path = Some(path);
                    }
                    None => {
                        if let Ok(url_path) = self.artifacts.write_output_url(job_id, output_url) {
                            self.jobs.add_artifact(job_id, "output_url", url_path);
                        }
                    }
                }
            }
            Ok((provider_job_id, output_path))
        }
        .await;

        match result {
            Ok((provider_job_id, output_path)) => {
                let ended_at = Utc::now();
                let record = attempt_record(
                    provider_name,
                    key_id,
                    AttemptStatus::Succeeded,
                    None,
                    None,
                    Some(provider_job_id),
                    started_at,
                    ended_at,
                    step_index,
                );
                Ok((record, false, output_path))
            }
            Err(err) => {
                let mut error_type = err.error_type;
                if error_type == ErrorType::Unknown {
                    error_type = classify_message(&err.message);
                }
                let ended_at = Utc::now();
                let record = attempt_record(
                    provider_name,
                    key_id,
                    AttemptStatus::Failed,
                    Some(error_type),
                    Some(err.message.clone()),
                    None,
                    started_at,
                    ended_at,
                    step_index,
                );
                Err(TryOnceError::Failed { record, error_type, message: err.message })
            }
        }
    }

    /// Resolve the ordered provider chain: configured chain filtered to
    /// providers that actually exist (falling back to every registered
    /// provider when the configured chain is empty or fully unknown),
    /// optionally cost-sorted, with `spec_only` always pushed to the tail.
    fn resolve_provider_chain(&self) -> Vec<String> {
        let mut chain: Vec<String> = self
            .snapshot
            .providers
            .chain
            .iter()
            .map(|item| item.provider.clone())
            .filter(|name| self.registry.exists(name))
            .collect();
        if chain.is_empty() {
            chain = self.registry.list();
        }
        if matches!(self.snapshot.policies.routing.strategy, crate::config::RoutingStrategy::CostAware) {
            chain.sort_by_key(|name| self.registry.cost_score(name));
        }
        if let Some(pos) = chain.iter().position(|name| name == "spec_only") {
            let spec_only = chain.remove(pos);
            chain.push(spec_only);
        }
        chain
    }

    async fn fetch_output_url(&self, job_id: &str, url: &str, output_format: &str) -> Option<String> {
        let response = self
            .http_client
            .get(url)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .ok()?
            .error_for_status()
            .ok()?;
        let bytes = response.bytes().await.ok()?;
        self.artifacts.write_output(job_id, &bytes, output_format).ok()
    }
}

enum TryOnceError {
    SpecOnly(AttemptRecord),
    Failed { record: AttemptRecord, error_type: ErrorType, message: String },
}

fn job_output_format(job: &JobRequest) -> &'static str {
    match job.output_format {
        crate::model::OutputFormat::Mp4 => "mp4",
        crate::model::OutputFormat::Webm => "webm",
    }
}

fn skipped_attempt_record(provider: &str, reason: &str) -> AttemptRecord {
    let now = Utc::now();
    attempt_record(provider, None, AttemptStatus::Skipped, None, Some(reason.to_string()), None, now, now, 0)
}

fn attempt_failed_payload(job_id: &str, provider: &str, error_type: ErrorType, message: &str) -> Map<String, Value> {
    Map::from_iter([
        ("job_id".to_string(), json!(job_id)),
        ("provider".to_string(), json!(provider)),
        ("error_type".to_string(), json!(error_type)),
        ("error".to_string(), json!(message)),
    ])
}

#[allow(clippy::too_many_arguments)]
fn attempt_record(
    provider: &str,
    key_id: Option<String>,
    status: AttemptStatus,
    error_type: Option<ErrorType>,
    reason: Option<String>,
    provider_job_id: Option<String>,
    started_at: chrono::DateTime<Utc>,
    ended_at: chrono::DateTime<Utc>,
    degrade_step: usize,
) -> AttemptRecord {
    AttemptRecord {
        provider: provider.to_string(),
        account_key_id: key_id,
        degrade_step,
        status,
        error_type,
        reason,
        provider_job_id,
        started_at,
        ended_at,
    }
}
