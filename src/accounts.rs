//! Account-key pools: one per provider, selecting among multiple
//! credentials under a round-robin / least-recently-used / random
//! strategy, with cooldown-based skipping of recently-failed keys.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::seq::SliceRandom;

use crate::config::{AccountsConfig, KeyStrategyConfig, expand_env_vars};

#[derive(Debug, Clone)]
pub struct AccountKeyState {
    pub key_id: String,
    pub headers: HashMap<String, String>,
    pub last_used: f64,
    pub last_failed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySelectionStrategy {
    RoundRobin,
    LeastRecent,
    Random,
}

impl From<KeyStrategyConfig> for KeySelectionStrategy {
    fn from(value: KeyStrategyConfig) -> Self {
        match value {
            KeyStrategyConfig::RoundRobin => KeySelectionStrategy::RoundRobin,
            KeyStrategyConfig::LeastRecent => KeySelectionStrategy::LeastRecent,
            KeyStrategyConfig::Random => KeySelectionStrategy::Random,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccountPoolState {
    pub provider: String,
    pub strategy: KeySelectionStrategy,
    pub cooldown_after_fail_s: u64,
    pub keys: Vec<AccountKeyState>,
    pub round_robin_index: usize,
}

fn now_unix_s() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

/// Owns every provider's account-key pool behind one mutex, following
/// the same keyed-registry shape as [`crate::CircuitBreaker`].
pub struct AccountManager {
    pools: Mutex<HashMap<String, AccountPoolState>>,
}

impl std::fmt::Debug for AccountManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountManager").finish()
    }
}

impl AccountManager {
    pub fn new(accounts: &AccountsConfig) -> Self {
        let mut pools = HashMap::new();
        for pool in &accounts.pools {
            let keys = pool
                .keys
                .iter()
                .map(|key| AccountKeyState {
                    key_id: key.key_id.clone(),
                    headers: key
                        .headers
                        .iter()
                        .map(|(name, value)| (name.clone(), expand_env_vars(value)))
                        .collect(),
                    last_used: 0.0,
                    last_failed: 0.0,
                })
                .collect();
            pools.insert(
                pool.provider.clone(),
                AccountPoolState {
                    provider: pool.provider.clone(),
                    strategy: pool.strategy.into(),
                    cooldown_after_fail_s: pool.cooldown_after_fail_s,
                    keys,
                    round_robin_index: 0,
                },
            );
        }
        Self { pools: Mutex::new(pools) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, AccountPoolState>> {
        self.pools.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Select the next key for `provider`, preferring keys outside their
    /// failure cooldown and falling back to the full pool when every key
    /// is currently cooling down. Returns `None` when the provider has no
    /// configured pool or an empty one.
    pub fn select_key(&self, provider: &str) -> Option<AccountKeyState> {
        let mut pools = self.lock();
        let pool = pools.get_mut(provider)?;
        if pool.keys.is_empty() {
            return None;
        }
        let now = now_unix_s();
        let cooldown = pool.cooldown_after_fail_s as f64;
        let available: Vec<usize> = pool
            .keys
            .iter()
            .enumerate()
            .filter(|(_, key)| now - key.last_failed >= cooldown)
            .map(|(i, _)| i)
            .collect();
        let available = if available.is_empty() {
            (0..pool.keys.len()).collect::<Vec<_>>()
        } else {
            available
        };

        let chosen_index = match pool.strategy {
            KeySelectionStrategy::Random => {
                *available.choose(&mut rand::thread_rng()).expect("available is non-empty")
            }
            KeySelectionStrategy::LeastRecent => *available
                .iter()
                .min_by(|&&a, &&b| {
                    pool.keys[a].last_used.partial_cmp(&pool.keys[b].last_used).unwrap()
                })
                .expect("available is non-empty"),
            KeySelectionStrategy::RoundRobin => {
                let idx = available[pool.round_robin_index % available.len()];
                pool.round_robin_index = (pool.round_robin_index + 1) % available.len();
                idx
            }
        };

        pool.keys[chosen_index].last_used = now;
        Some(pool.keys[chosen_index].clone())
    }

    pub fn mark_failure(&self, provider: &str, key_id: &str) {
        let mut pools = self.lock();
        if let Some(pool) = pools.get_mut(provider) {
            if let Some(key) = pool.keys.iter_mut().find(|k| k.key_id == key_id) {
                key.last_failed = now_unix_s();
            }
        }
    }

    pub fn pool_size(&self, provider: &str) -> usize {
        self.lock().get(provider).map(|p| p.keys.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccountKeyConfig, AccountPoolConfig};

    fn config(strategy: KeyStrategyConfig, cooldown: u64, key_ids: &[&str]) -> AccountsConfig {
        AccountsConfig {
            pools: vec![AccountPoolConfig {
                provider: "runway".to_string(),
                pool_name: "default".to_string(),
                strategy,
                cooldown_after_fail_s: cooldown,
                keys: key_ids
                    .iter()
                    .map(|id| AccountKeyConfig {
                        key_id: id.to_string(),
                        env_var_name: format!("{}_TOKEN", id.to_uppercase()),
                        headers: HashMap::new(),
                    })
                    .collect(),
            }],
        }
    }

    #[test]
    fn round_robin_cycles_through_keys() {
        let manager = AccountManager::new(&config(KeyStrategyConfig::RoundRobin, 0, &["k1", "k2"]));
        let first = manager.select_key("runway").unwrap().key_id;
        let second = manager.select_key("runway").unwrap().key_id;
        let third = manager.select_key("runway").unwrap().key_id;
        assert_eq!(first, "k1");
        assert_eq!(second, "k2");
        assert_eq!(third, "k1");
    }

    #[test]
    fn cooldown_skips_failed_key_when_alternative_exists() {
        let manager = AccountManager::new(&config(KeyStrategyConfig::RoundRobin, 300, &["k1", "k2"]));
        manager.select_key("runway"); // k1
        manager.mark_failure("runway", "k1");
        let next = manager.select_key("runway").unwrap().key_id;
        assert_eq!(next, "k2");
    }

    #[test]
    fn falls_back_to_full_pool_when_all_keys_cooling_down() {
        let manager = AccountManager::new(&config(KeyStrategyConfig::RoundRobin, 300, &["k1"]));
        manager.select_key("runway");
        manager.mark_failure("runway", "k1");
        assert_eq!(manager.select_key("runway").unwrap().key_id, "k1");
    }

    #[test]
    fn unknown_provider_returns_none() {
        let manager = AccountManager::new(&config(KeyStrategyConfig::RoundRobin, 0, &["k1"]));
        assert!(manager.select_key("unknown").is_none());
    }

    #[test]
    fn pool_size_reports_configured_key_count() {
        let manager = AccountManager::new(&config(KeyStrategyConfig::RoundRobin, 0, &["k1", "k2", "k3"]));
        assert_eq!(manager.pool_size("runway"), 3);
        assert_eq!(manager.pool_size("unknown"), 0);
    }

    #[test]
    fn least_recent_prefers_least_recently_used_key() {
        let manager = AccountManager::new(&config(KeyStrategyConfig::LeastRecent, 0, &["k1", "k2"]));
        let first = manager.select_key("runway").unwrap().key_id;
        let second = manager.select_key("runway").unwrap().key_id;
        assert_ne!(first, second, "least-recent alternates between two fresh keys");
    }
}
