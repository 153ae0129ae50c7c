//! Shared harness for the wiremock-backed pipeline tests: writes a
//! throwaway configs directory, loads it through the real `ConfigLoader`,
//! and wires an `Orchestrator` against an `InstantSleeper`/`TrackingSleeper`
//! so retry/degrade backoffs don't actually wait.

use std::sync::Arc;

use videoforge::{
    AccountManager, ArtifactStore, ConfigLoader, EventLogger, JobStore, Orchestrator,
    ProviderRegistry, TrackingSleeper,
};

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub registry: Arc<ProviderRegistry>,
    pub jobs: Arc<JobStore>,
    pub sleeper: Arc<TrackingSleeper>,
    artifacts_dir: tempfile::TempDir,
    _configs_dir: tempfile::TempDir,
    _events_dir: tempfile::TempDir,
}

impl Harness {
    /// Parsed `attempts.json` written for `job_id`, in attempt order.
    pub fn attempts(&self, job_id: &str) -> Vec<videoforge::AttemptRecord> {
        let path = self.artifacts_dir.path().join(job_id).join("attempts.json");
        let text = std::fs::read_to_string(path).expect("attempts.json written for job");
        serde_json::from_str(&text).expect("attempts.json is a valid AttemptRecord list")
    }

    /// Raw request body sent to the provider for one of its recorded
    /// attempts, parsed back as the `JobRequest` json the orchestrator
    /// submitted for that degrade step.
    pub fn submitted_job(&self, request: &wiremock::Request) -> serde_json::Value {
        serde_json::from_slice(&request.body).expect("request body is job JSON")
    }
}

pub fn harness(providers_yaml: &str, policies_yaml: &str, accounts_yaml: &str) -> Harness {
    let configs_dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(configs_dir.path().join("providers.yml"), providers_yaml).expect("write providers.yml");
    std::fs::write(configs_dir.path().join("policies.yml"), policies_yaml).expect("write policies.yml");
    std::fs::write(configs_dir.path().join("accounts.yml"), accounts_yaml).expect("write accounts.yml");
    std::fs::write(configs_dir.path().join("job_templates.yml"), "templates: {}\n").expect("write job_templates.yml");

    let snapshot = Arc::new(ConfigLoader::new(configs_dir.path()).load().expect("test config loads"));
    let registry = Arc::new(ProviderRegistry::new(&snapshot.providers, &snapshot.policies.timeouts, reqwest::Client::new()));
    let accounts = Arc::new(AccountManager::new(&snapshot.accounts));
    let artifacts_dir = tempfile::tempdir().expect("tempdir");
    let events_dir = tempfile::tempdir().expect("tempdir");
    let artifacts = Arc::new(ArtifactStore::new(artifacts_dir.path()).expect("artifact store"));
    let jobs = Arc::new(JobStore::new());
    let event_logger = Arc::new(EventLogger::new(events_dir.path()).expect("event logger"));
    let sleeper = Arc::new(TrackingSleeper::new());

    let orchestrator = Orchestrator::with_sleeper(
        snapshot,
        registry.clone(),
        accounts,
        artifacts,
        jobs.clone(),
        event_logger,
        sleeper.clone(),
    );

    Harness { orchestrator, registry, jobs, sleeper, artifacts_dir, _configs_dir: configs_dir, _events_dir: events_dir }
}

pub fn sample_job() -> videoforge::JobRequest {
    use videoforge::{AspectRatio, OutputFormat, Resolution};
    videoforge::JobRequest {
        prompt: "a cat on a skateboard".to_string(),
        negative_prompt: None,
        duration_s: 4,
        aspect_ratio: AspectRatio::Widescreen,
        resolution: Resolution::R1080p,
        fps: 24,
        seed: None,
        style: None,
        input_image_url: None,
        output_format: OutputFormat::Mp4,
        priority: 0,
        metadata: Default::default(),
    }
}

pub fn providers_yaml(base_url: &str, chain: &[&str]) -> String {
    let chain_lines: String = chain.iter().map(|p| format!("  - provider: {p}\n")).collect();
    format!(
        r#"
providers:
  runway:
    type: http_async
    base_url: "{base_url}"
    endpoints:
      submit: /jobs
      poll: /jobs/{{job_id}}
      fetch: /jobs/{{job_id}}/result
  spec_only:
    type: spec_only
    base_url: ""
chain:
{chain_lines}
"#
    )
}

#[allow(clippy::too_many_arguments)]
pub fn policies_yaml(
    max_attempts: u32,
    backoff_s: u64,
    failure_threshold: u32,
    recovery_time_s: u64,
    degrade_plan_yaml: &str,
) -> String {
    format!(
        r#"
timeouts:
  submit_s: 5
  poll_s: 5
  fetch_s: 5
retry:
  max_attempts: {max_attempts}
  backoff_s: {backoff_s}
circuit_breaker:
  failure_threshold: {failure_threshold}
  recovery_time_s: {recovery_time_s}
routing:
  strategy: chain
{degrade_plan_yaml}
"#
    )
}

pub fn accounts_yaml_empty() -> &'static str {
    "pools: []\n"
}

pub fn accounts_yaml_two_keys() -> &'static str {
    r#"
pools:
  - provider: runway
    pool_name: default
    strategy: round_robin
    cooldown_after_fail_s: 0
    keys:
      - key_id: key-a
        env_var_name: KEY_A
        headers:
          Authorization: key-a
      - key_id: key-b
        env_var_name: KEY_B
        headers:
          Authorization: key-b
"#
}
