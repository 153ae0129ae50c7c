//! Per-provider circuit breaker: closed/open only, no half-open recovery
//! probe. A provider opens after `failure_threshold` consecutive failures
//! and stays open until `recovery_time_s` has elapsed, at which point it
//! is simply treated as closed again — the next attempt either confirms
//! recovery (success resets the counter) or reopens it (another failure
//! extends `open_until`).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::clock::{Clock, MonotonicClock};

#[derive(Debug, Clone, Default)]
pub struct CircuitState {
    pub failure_count: u32,
    pub open_until_millis: u64,
    pub last_error: Option<String>,
}

/// A breaker-name-keyed table of [`CircuitState`], behind one mutex —
/// the same shape as a registry of independent named resources, just
/// storing state inline instead of a handle per entry.
#[derive(Clone)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_time_s: u64,
    states: Arc<Mutex<HashMap<String, CircuitState>>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("failure_threshold", &self.failure_threshold)
            .field("recovery_time_s", &self.recovery_time_s)
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_time_s: u64) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            recovery_time_s: recovery_time_s.max(1),
            states: Arc::new(Mutex::new(HashMap::new())),
            clock: Arc::new(MonotonicClock::default()),
        }
    }

    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CircuitState>> {
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_open(&self, key: &str) -> bool {
        let states = self.lock();
        match states.get(key) {
            Some(state) => state.open_until_millis > self.clock.now_millis(),
            None => false,
        }
    }

    pub fn record_failure(&self, key: &str, error: impl Into<String>) {
        let mut states = self.lock();
        let state = states.entry(key.to_string()).or_default();
        state.failure_count += 1;
        state.last_error = Some(error.into());
        if state.failure_count >= self.failure_threshold {
            state.open_until_millis = self.clock.now_millis() + self.recovery_time_s * 1000;
        }
    }

    pub fn record_success(&self, key: &str) {
        let mut states = self.lock();
        let state = states.entry(key.to_string()).or_default();
        state.failure_count = 0;
        state.open_until_millis = 0;
        state.last_error = None;
    }

    pub fn status(&self, key: &str) -> CircuitState {
        self.lock().get(key).cloned().unwrap_or_default()
    }
}
