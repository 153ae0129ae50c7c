//! Provider registry: builds one adapter per configured provider and
//! tracks health/circuit status per name for the `/health/providers`
//! surface and the orchestrator's routing decisions.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::config::{ProviderType, ProvidersConfig, TimeoutPolicy};
use crate::model::{ProviderHealth, ProviderStatus};
use crate::providers::{http_async::HttpAsyncProvider, spec_only::SpecOnlyProvider, ProviderAdapter};

struct ProviderEntry {
    provider: Box<dyn ProviderAdapter>,
    cost_score: i64,
    headers: HashMap<String, String>,
}

pub struct ProviderRegistry {
    providers: HashMap<String, ProviderEntry>,
    health: Mutex<HashMap<String, ProviderStatus>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry").field("providers", &self.providers.keys().collect::<Vec<_>>()).finish()
    }
}

impl ProviderRegistry {
    pub fn new(config: &ProvidersConfig, timeouts: &TimeoutPolicy, client: reqwest::Client) -> Self {
        let mut providers = HashMap::new();
        let mut health = HashMap::new();
        for (name, cfg) in &config.providers {
            let adapter: Box<dyn ProviderAdapter> = match cfg.kind {
                ProviderType::HttpAsync => {
                    let Some(endpoints) = cfg.endpoints.clone() else {
                        tracing::warn!(provider = %name, "http_async provider missing endpoints, skipping");
                        continue;
                    };
                    Box::new(HttpAsyncProvider::new(
                        name.clone(),
                        cfg.base_url.clone(),
                        endpoints,
                        cfg.health_endpoint.clone(),
                        timeouts.clone(),
                        client.clone(),
                    ))
                }
                ProviderType::SpecOnly => Box::new(SpecOnlyProvider::new()),
            };
            providers.insert(
                name.clone(),
                ProviderEntry { provider: adapter, cost_score: cfg.cost_score, headers: cfg.headers.clone() },
            );
            health.insert(
                name.clone(),
                ProviderStatus {
                    provider: name.clone(),
                    health: ProviderHealth::Unknown,
                    circuit_open: false,
                    last_error: None,
                    last_checked_at: None,
                },
            );
        }
        Self { providers, health: Mutex::new(health) }
    }

    pub fn get(&self, name: &str) -> Option<&dyn ProviderAdapter> {
        self.providers.get(name).map(|entry| entry.provider.as_ref())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn cost_score(&self, name: &str) -> i64 {
        self.providers.get(name).map(|entry| entry.cost_score).unwrap_or(0)
    }

    pub fn headers(&self, name: &str) -> HashMap<String, String> {
        self.providers.get(name).map(|entry| entry.headers.clone()).unwrap_or_default()
    }

    pub fn list(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    fn lock_health(&self) -> std::sync::MutexGuard<'_, HashMap<String, ProviderStatus>> {
        self.health.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn update_health(&self, name: &str, health: ProviderHealth, error: Option<String>) {
        let mut guard = self.lock_health();
        if let Some(status) = guard.get_mut(name) {
            status.health = health;
            status.last_error = error;
            status.last_checked_at = Some(Utc::now());
        }
    }

    pub fn set_circuit(&self, name: &str, open: bool) {
        let mut guard = self.lock_health();
        if let Some(status) = guard.get_mut(name) {
            status.circuit_open = open;
        }
    }

    pub fn health_snapshot(&self) -> Vec<ProviderStatus> {
        self.lock_health().values().cloned().collect()
    }
}
