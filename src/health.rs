//! Background health scheduler: polls every registered provider's
//! `healthcheck` on a fixed interval and records the result on the
//! registry for the `/health/providers` surface.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use crate::accounts::AccountManager;
use crate::model::ProviderHealth;
use crate::registry::ProviderRegistry;

pub struct HealthScheduler {
    handle: Option<JoinHandle<()>>,
}

impl HealthScheduler {
    /// Spawn the polling loop, or return an inert scheduler when
    /// `enabled` is false. `interval_s` is floored at 5 seconds, matching
    /// the original's guard against a misconfigured tight loop.
    pub fn start(
        registry: Arc<ProviderRegistry>,
        accounts: Arc<AccountManager>,
        interval_s: u64,
        enabled: bool,
    ) -> Self {
        if !enabled {
            return Self { handle: None };
        }
        let interval_s = interval_s.max(5);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(interval_s));
            loop {
                ticker.tick().await;
                for name in registry.list() {
                    let Some(provider) = registry.get(&name) else { continue };
                    let mut headers = registry.headers(&name);
                    if let Some(key) = accounts.select_key(&name) {
                        headers.extend(key.headers);
                    }
                    match provider.healthcheck(&headers).await {
                        Ok(true) => registry.update_health(&name, ProviderHealth::Healthy, None),
                        Ok(false) => registry.update_health(&name, ProviderHealth::Degraded, None),
                        Err(e) => registry.update_health(&name, ProviderHealth::Down, Some(e.message)),
                    }
                }
            }
        });
        Self { handle: Some(handle) }
    }

    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}
