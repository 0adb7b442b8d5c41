//! Database Jobs
//!
//! Creating or dropping a database is delegated to a short-lived Kubernetes
//! Job. The factory builds the Job for a (MariaDBDatabase, MariaDB) pair, the
//! orchestrator creates, observes and deletes it.

mod factory;
mod orchestrator;

pub use factory::{DatabaseJobFactory, DatabaseJobFactoryConfig, job_name};
pub use orchestrator::{JobOrchestrator, KubeJobOrchestrator, job_progress};

use std::fmt;

/// Operation a database Job performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Provision,
    Deprovision,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provision => "provision",
            Self::Deprovision => "deprovision",
        }
    }

    /// Job name suffix, disjoint per kind
    pub(crate) fn name_suffix(&self) -> &'static str {
        match self {
            Self::Provision => "db-create",
            Self::Deprovision => "db-delete",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the orchestrator observed about a Job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobProgress {
    /// The Job did not exist and was just submitted
    Created,
    /// The Job exists and has not reached a terminal state
    Running,
    /// The Job succeeded
    Finished,
}

impl JobProgress {
    pub fn is_running(&self) -> bool {
        !matches!(self, Self::Finished)
    }
}

/// What a Job deletion request found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRemoval {
    /// No such Job
    Absent,
    /// Deletion accepted, the Job is still waiting on its pods
    Deleting,
    /// Deletion accepted and the Job is gone
    Deleted,
}

impl JobRemoval {
    /// False while the Job or any of its pods may still run
    pub fn is_complete(&self) -> bool {
        !matches!(self, Self::Deleting)
    }
}
