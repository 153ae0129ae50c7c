//! Convenience re-export for downstream crates (`videoforge-server`,
//! `videoforge-cli`) that just want the common types in scope.

pub use crate::config::{ConfigLoader, ConfigSnapshot};
pub use crate::error::{ErrorType, OrchestratorError, ProviderError};
pub use crate::model::{JobRecord, JobRequest, JobStatus, ProviderStatus};
pub use crate::service::ServiceContext;
