//! Operator error types

use crate::config::OperatorConfig;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to look up MariaDB {name}: {source}")]
    ParentLookup {
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{kind} {name} was modified concurrently")]
    VersionConflict { kind: &'static str, name: String },

    #[error("Job {job} failed: {reason}")]
    TaskFailed { job: String, reason: String },

    #[error("{object} is missing {field}")]
    MissingField { object: String, field: &'static str },

    #[error("Invalid operator configuration: {message}")]
    InvalidConfig { message: String },

    #[error(transparent)]
    Kube(#[from] kube::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Delay before the controller retries a pass that failed with this error
    pub fn requeue_after(&self, config: &OperatorConfig) -> Duration {
        match self {
            Self::ParentLookup { .. } => config.parent_wait,
            _ => config.error_backoff,
        }
    }

    /// Stable label for the error counter
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::ParentLookup { .. } => "parent_lookup",
            Self::VersionConflict { .. } => "version_conflict",
            Self::TaskFailed { .. } => "task_failed",
            Self::MissingField { .. } => "missing_field",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::Kube(_) => "kube",
        }
    }
}

/// True when the API server answered with `code`
pub(crate) fn is_api_status(error: &kube::Error, code: u16) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == code)
}
