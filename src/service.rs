//! Application wiring: loads configuration, builds the registry/account
//! pool/orchestrator trio, starts the job queue and health scheduler, and
//! exposes the surface both the HTTP server and the CLI drive. A config
//! reload swaps the whole trio atomically via `arc_swap::ArcSwap`, so an
//! in-flight job keeps a consistent view even if a reload lands mid-run.

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::accounts::AccountManager;
use crate::artifacts::ArtifactStore;
use crate::config::{ConfigLoader, ConfigSnapshot};
use crate::error::{ConfigError, OrchestratorError};
use crate::health::HealthScheduler;
use crate::job_store::JobStore;
use crate::logging::EventLogger;
use crate::model::{JobRecord, JobRequest, ProviderStatus};
use crate::orchestrator::Orchestrator;
use crate::queue::InMemoryQueue;
use crate::registry::ProviderRegistry;

/// The set of components derived from one loaded [`ConfigSnapshot`],
/// swapped in as a unit on reload so no job ever sees a registry built
/// from one snapshot paired with an orchestrator built from another.
struct Components {
    snapshot: Arc<ConfigSnapshot>,
    registry: Arc<ProviderRegistry>,
    accounts: Arc<AccountManager>,
    orchestrator: Arc<Orchestrator>,
}

pub struct ServiceContext {
    config_loader: ConfigLoader,
    components: ArcSwap<Components>,
    artifacts: Arc<ArtifactStore>,
    jobs: Arc<JobStore>,
    event_logger: Arc<EventLogger>,
    http_client: reqwest::Client,
    queue: AsyncMutex<Option<InMemoryQueue>>,
    health_scheduler: AsyncMutex<Option<HealthScheduler>>,
}

impl ServiceContext {
    /// Load configuration from `configs_dir`, build every component, start
    /// the job queue worker and (if enabled) the health scheduler.
    pub async fn start(
        configs_dir: impl Into<PathBuf>,
        artifacts_dir: impl Into<PathBuf>,
        events_dir: impl Into<PathBuf>,
    ) -> Result<Arc<Self>, OrchestratorError> {
        let config_loader = ConfigLoader::new(configs_dir.into());
        let artifacts = Arc::new(
            ArtifactStore::new(artifacts_dir.into())
                .map_err(|e| ConfigError::new(format!("failed to initialize artifact store: {e}")))?,
        );
        let jobs = Arc::new(JobStore::new());
        let event_logger = Arc::new(
            EventLogger::new(events_dir.into())
                .map_err(|e| ConfigError::new(format!("failed to initialize event log: {e}")))?,
        );
        let http_client = reqwest::Client::new();

        let components = Self::build_components(&config_loader, &http_client, &artifacts, &jobs, &event_logger)?;
        let health = HealthScheduler::start(
            components.registry.clone(),
            components.accounts.clone(),
            components.snapshot.policies.health.check_interval_s,
            components.snapshot.policies.health.enabled,
        );

        let context = Arc::new(Self {
            config_loader,
            components: ArcSwap::from_pointee(components),
            artifacts,
            jobs,
            event_logger,
            http_client,
            queue: AsyncMutex::new(None),
            health_scheduler: AsyncMutex::new(Some(health)),
        });

        let worker_context = context.clone();
        let queue = InMemoryQueue::start(move |task| {
            let context = worker_context.clone();
            async move {
                let orchestrator = context.components.load().orchestrator.clone();
                orchestrator.run_job(&task.job_id, task.job).await;
            }
        });
        *context.queue.lock().await = Some(queue);

        Ok(context)
    }

    fn build_components(
        config_loader: &ConfigLoader,
        http_client: &reqwest::Client,
        artifacts: &Arc<ArtifactStore>,
        jobs: &Arc<JobStore>,
        event_logger: &Arc<EventLogger>,
    ) -> Result<Components, OrchestratorError> {
        let snapshot = Arc::new(config_loader.load()?);
        let registry =
            Arc::new(ProviderRegistry::new(&snapshot.providers, &snapshot.policies.timeouts, http_client.clone()));
        let accounts = Arc::new(AccountManager::new(&snapshot.accounts));
        let orchestrator = Arc::new(Orchestrator::new(
            snapshot.clone(),
            registry.clone(),
            accounts.clone(),
            artifacts.clone(),
            jobs.clone(),
            event_logger.clone(),
        ));
        Ok(Components { snapshot, registry, accounts, orchestrator })
    }

    /// Reload configuration from disk and swap it in atomically. Either
    /// the whole reload succeeds or the live snapshot is left untouched;
    /// the health scheduler is restarted against the new registry/pool.
    pub async fn reload_config(&self) -> Result<(), OrchestratorError> {
        let components =
            Self::build_components(&self.config_loader, &self.http_client, &self.artifacts, &self.jobs, &self.event_logger)?;
        let registry = components.registry.clone();
        let accounts = components.accounts.clone();
        let interval_s = components.snapshot.policies.health.check_interval_s;
        let enabled = components.snapshot.policies.health.enabled;
        self.components.store(Arc::new(components));

        let mut guard = self.health_scheduler.lock().await;
        if let Some(old) = guard.take() {
            old.stop().await;
        }
        *guard = Some(HealthScheduler::start(registry, accounts, interval_s, enabled));
        Ok(())
    }

    /// Queue a new job for processing and return the job id assigned to it.
    pub async fn submit_job(&self, job: JobRequest) -> String {
        let job_id = Uuid::new_v4().to_string();
        self.jobs.create(&job_id);
        if let Some(queue) = self.queue.lock().await.as_ref() {
            queue.submit(job_id.clone(), job);
        }
        job_id
    }

    /// Run a job to completion on the caller's own task, bypassing the
    /// queue entirely. Used by the CLI's `--local` mode, which waits for
    /// the result synchronously rather than polling job status.
    pub async fn run_job_now(&self, job: JobRequest) -> String {
        let job_id = Uuid::new_v4().to_string();
        self.jobs.create(&job_id);
        let orchestrator = self.components.load().orchestrator.clone();
        orchestrator.run_job(&job_id, job).await;
        job_id
    }

    pub fn get_job(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs.get(job_id)
    }

    pub fn provider_statuses(&self) -> Vec<ProviderStatus> {
        self.components.load().registry.health_snapshot()
    }

    pub fn config_snapshot(&self) -> Arc<ConfigSnapshot> {
        self.components.load().snapshot.clone()
    }

    /// Stop the job queue and health scheduler, draining in-flight work.
    pub async fn shutdown(&self) {
        if let Some(queue) = self.queue.lock().await.take() {
            queue.stop().await;
        }
        if let Some(health) = self.health_scheduler.lock().await.take() {
            health.stop().await;
        }
    }
}
