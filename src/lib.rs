#![forbid(unsafe_code)]

//! # videoforge
//!
//! Multi-provider video generation job orchestrator. Given a job request,
//! walks a configured provider chain (http-backed adapters and a
//! spec-only fallback), retrying and degrading according to policy,
//! behind per-provider circuit breakers and account-key pools.
//!
//! The central algorithm lives in [`orchestrator::Orchestrator::run_job`];
//! everything else in this crate exists to support it: configuration
//! snapshots, error classification, circuit breaking, account-key
//! selection, provider adapters/registry, degrade plans, job/artifact
//! storage, the in-memory queue, and the health scheduler.

mod accounts;
mod artifacts;
mod circuit_breaker;
mod clock;
mod config;
mod degrade;
mod error;
mod health;
mod job_store;
mod logging;
mod model;
mod orchestrator;
mod providers;
mod queue;
mod registry;
mod service;
mod sleeper;

pub use accounts::{AccountKeyState, AccountManager, AccountPoolState, KeySelectionStrategy};
pub use artifacts::ArtifactStore;
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use clock::{Clock, MonotonicClock};
pub use config::{
    AccountKeyConfig, AccountPoolConfig, AccountsConfig, CircuitBreakerPolicy, ConfigError,
    ConfigLoader, ConfigSnapshot, DegradeStep, HealthPolicy, JobTemplate, JobTemplatesConfig,
    PoliciesConfig, ProviderCapabilities, ProviderChainItem, ProviderConfig, ProviderEndpoints,
    ProviderType, ProvidersConfig, RetryPolicy, RoutingPolicy, RoutingStrategy, TimeoutPolicy,
    expand_env_vars,
};
pub use degrade::{apply_template, DegradePlan};
pub use error::{ErrorType, OrchestratorError, ProviderError};
pub use health::HealthScheduler;
pub use job_store::JobStore;
pub use logging::EventLogger;
pub use model::{
    AspectRatio, AttemptRecord, AttemptStatus, JobRecord, JobRequest, JobStatus, OutputFormat,
    ProviderHealth, ProviderStatus, Resolution,
};
pub use orchestrator::Orchestrator;
pub use providers::{
    http_async::HttpAsyncProvider, spec_only::SpecOnlyProvider, ProviderAdapter, ProviderResult,
};
pub use queue::{InMemoryQueue, JobTask};
pub use registry::ProviderRegistry;
pub use service::ServiceContext;
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};

pub mod prelude;
