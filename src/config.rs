//! Typed configuration loaded from the four YAML documents under a
//! configs directory, merged into one immutable [`ConfigSnapshot`].
//! Reload either fully validates a fresh snapshot or fails outright —
//! never a partial swap into the live snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use crate::error::ConfigError;
use crate::model::{AspectRatio, OutputFormat, Resolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    HttpAsync,
    SpecOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    #[serde(default = "default_true")]
    pub txt2vid: bool,
    #[serde(default)]
    pub img2vid: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEndpoints {
    pub submit: String,
    pub poll: String,
    pub fetch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub kind: ProviderType,
    pub base_url: String,
    #[serde(default)]
    pub capabilities: ProviderCapabilities,
    #[serde(default)]
    pub endpoints: Option<ProviderEndpoints>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub cost_score: i64,
    #[serde(default)]
    pub health_endpoint: Option<String>,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self { txt2vid: true, img2vid: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderChainItem {
    pub provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub providers: HashMap<String, ProviderConfig>,
    pub chain: Vec<ProviderChainItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_s")]
    pub backoff_s: u64,
}

fn default_max_attempts() -> u32 {
    1
}
fn default_backoff_s() -> u64 {
    1
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: default_max_attempts(), backoff_s: default_backoff_s() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutPolicy {
    #[serde(default = "default_submit_s")]
    pub submit_s: u64,
    #[serde(default = "default_poll_s")]
    pub poll_s: u64,
    #[serde(default = "default_fetch_s")]
    pub fetch_s: u64,
}

fn default_submit_s() -> u64 {
    30
}
fn default_poll_s() -> u64 {
    15
}
fn default_fetch_s() -> u64 {
    60
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self { submit_s: default_submit_s(), poll_s: default_poll_s(), fetch_s: default_fetch_s() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerPolicy {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_recovery_time_s")]
    pub recovery_time_s: u64,
}

fn default_failure_threshold() -> u32 {
    3
}
fn default_recovery_time_s() -> u64 {
    60
}

impl Default for CircuitBreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_time_s: default_recovery_time_s(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DegradeStep {
    #[serde(default)]
    pub resolution: Option<Resolution>,
    #[serde(default)]
    pub fps: Option<u32>,
    #[serde(default)]
    pub duration_s: Option<u32>,
    #[serde(default)]
    pub steps: Option<u32>,
    #[serde(default)]
    pub guidance: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    Chain,
    CostAware,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingPolicy {
    #[serde(default = "default_routing_strategy")]
    pub strategy: RoutingStrategy,
}

fn default_routing_strategy() -> RoutingStrategy {
    RoutingStrategy::CostAware
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self { strategy: default_routing_strategy() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthPolicy {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_check_interval_s")]
    pub check_interval_s: u64,
    #[serde(default = "default_health_timeout_s")]
    pub timeout_s: u64,
}

fn default_check_interval_s() -> u64 {
    30
}
fn default_health_timeout_s() -> u64 {
    5
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_s: default_check_interval_s(),
            timeout_s: default_health_timeout_s(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoliciesConfig {
    pub timeouts: TimeoutPolicy,
    pub retry: RetryPolicy,
    pub circuit_breaker: CircuitBreakerPolicy,
    #[serde(default)]
    pub routing: RoutingPolicy,
    #[serde(default)]
    pub health: HealthPolicy,
    #[serde(default)]
    pub degrade_plan: Vec<DegradeStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountKeyConfig {
    pub key_id: String,
    pub env_var_name: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategyConfig {
    RoundRobin,
    LeastRecent,
    Random,
}

impl Default for KeyStrategyConfig {
    fn default() -> Self {
        KeyStrategyConfig::RoundRobin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountPoolConfig {
    pub provider: String,
    pub pool_name: String,
    #[serde(default)]
    pub strategy: KeyStrategyConfig,
    #[serde(default)]
    pub cooldown_after_fail_s: u64,
    pub keys: Vec<AccountKeyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsConfig {
    pub pools: Vec<AccountPoolConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobTemplate {
    #[serde(default)]
    pub resolution: Option<Resolution>,
    #[serde(default)]
    pub fps: Option<u32>,
    #[serde(default)]
    pub duration_s: Option<u32>,
    #[serde(default)]
    pub output_format: Option<OutputFormat>,
    #[serde(default)]
    pub aspect_ratio: Option<AspectRatio>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTemplatesConfig {
    #[serde(default)]
    pub templates: HashMap<String, JobTemplate>,
}

/// An immutable, fully-validated view of the four config documents,
/// published atomically via `ArcSwap<ConfigSnapshot>` so in-flight jobs
/// keep a consistent reference across a concurrent reload.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub providers: ProvidersConfig,
    pub policies: PoliciesConfig,
    pub accounts: AccountsConfig,
    pub templates: JobTemplatesConfig,
}

/// Loads and validates the four YAML documents from a base directory.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    /// Read and validate all four documents, returning a fresh snapshot.
    /// Fails on the first error; never mutates any caller-held state.
    pub fn load(&self) -> Result<ConfigSnapshot, ConfigError> {
        let providers = self.load_yaml::<ProvidersConfig>("providers.yml")?;
        let policies = self.load_yaml::<PoliciesConfig>("policies.yml")?;
        let accounts = self.load_yaml::<AccountsConfig>("accounts.yml")?;
        let templates = self.load_yaml::<JobTemplatesConfig>("job_templates.yml")?;
        Ok(ConfigSnapshot { providers, policies, accounts, templates })
    }

    fn load_yaml<T: for<'de> Deserialize<'de>>(&self, filename: &str) -> Result<T, ConfigError> {
        let path: &Path = &self.base_dir.join(filename);
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::new(format!("missing config file: {}: {}", path.display(), e)))?;
        serde_yaml::from_str(&text)
            .map_err(|e| ConfigError::new(format!("schema validation failed for {}: {}", path.display(), e)))
    }
}

/// Expand `${VAR}` references in a header value against the process
/// environment. Values with no `${` are returned unchanged without a scan.
pub fn expand_env_vars(value: &str) -> String {
    if !value.contains("${") {
        return value.to_string();
    }
    let mut result = value.to_string();
    for (key, env_value) in std::env::vars() {
        let needle = format!("${{{}}}", key);
        if result.contains(&needle) {
            result = result.replace(&needle, &env_value);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_env_vars_leaves_plain_values_untouched() {
        assert_eq!(expand_env_vars("Bearer abc123"), "Bearer abc123");
    }

    #[test]
    fn expand_env_vars_substitutes_present_variable() {
        std::env::set_var("VIDEOFORGE_TEST_TOKEN", "secret-value");
        assert_eq!(
            expand_env_vars("Bearer ${VIDEOFORGE_TEST_TOKEN}"),
            "Bearer secret-value"
        );
        std::env::remove_var("VIDEOFORGE_TEST_TOKEN");
    }

    #[test]
    fn load_missing_directory_returns_config_error() {
        let loader = ConfigLoader::new("/nonexistent/videoforge-configs-test");
        let err = loader.load().unwrap_err();
        assert!(err.0.contains("missing config file"));
    }

    #[test]
    fn load_well_formed_configs_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("providers.yml"),
            r#"
providers:
  spec_only:
    type: spec_only
    base_url: ""
    capabilities: {}
chain:
  - provider: spec_only
"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("policies.yml"),
            r#"
timeouts: {}
retry: {}
circuit_breaker: {}
"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("accounts.yml"), "pools: []\n").unwrap();
        std::fs::write(dir.path().join("job_templates.yml"), "templates: {}\n").unwrap();

        let loader = ConfigLoader::new(dir.path());
        let snapshot = loader.load().expect("valid config directory loads");
        assert_eq!(snapshot.providers.chain.len(), 1);
        assert_eq!(snapshot.policies.retry.max_attempts, 1);
    }
}
