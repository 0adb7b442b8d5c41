//! Job orchestration against the Kubernetes API
//!
//! `ensure_job` is a check-or-create keyed on the Job name: an existing Job is
//! never recreated, its terminal state is reported instead. A failed Job is
//! surfaced as `Error::TaskFailed` and left in place so the failure stays
//! inspectable and a partially applied operation is not blindly replayed.
//!
//! `delete_job` uses foreground propagation. Until every pod of the Job has
//! terminated the Job stays visible and deletion reports `Deleting`.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use kube::{
    Client, ResourceExt,
    api::{Api, DeleteParams, PostParams},
};
use tracing::{debug, info};

use super::{JobProgress, JobRemoval};
use crate::error::{Error, Result, is_api_status};

/// Kubernetes default for `spec.backoffLimit`
const DEFAULT_BACKOFF_LIMIT: i32 = 6;

/// Creates, observes and deletes database Jobs
#[async_trait]
pub trait JobOrchestrator: Send + Sync {
    /// Create `job` if absent, otherwise report its progress
    async fn ensure_job(&self, job: &Job) -> Result<JobProgress>;

    /// Delete `job` together with its pods
    async fn delete_job(&self, job: &Job) -> Result<JobRemoval>;
}

/// Derive progress from an observed Job
pub fn job_progress(job: &Job) -> Result<JobProgress> {
    let Some(status) = job.status.as_ref() else {
        return Ok(JobProgress::Running);
    };

    if status.succeeded.unwrap_or(0) > 0 {
        return Ok(JobProgress::Finished);
    }

    if let Some(failed) = status
        .conditions
        .iter()
        .flatten()
        .find(|c| c.type_ == "Failed" && c.status == "True")
    {
        return Err(Error::TaskFailed {
            job: job.name_any(),
            reason: failed
                .message
                .clone()
                .or_else(|| failed.reason.clone())
                .unwrap_or_else(|| "Job failed".to_string()),
        });
    }

    let backoff_limit = job
        .spec
        .as_ref()
        .and_then(|spec| spec.backoff_limit)
        .unwrap_or(DEFAULT_BACKOFF_LIMIT);
    let failed = status.failed.unwrap_or(0);
    if failed > backoff_limit {
        return Err(Error::TaskFailed {
            job: job.name_any(),
            reason: format!("{failed} failed attempts exceed backoff limit {backoff_limit}"),
        });
    }

    Ok(JobProgress::Running)
}

/// JobOrchestrator backed by the `batch/v1` Jobs API
#[derive(Clone)]
pub struct KubeJobOrchestrator {
    client: Client,
}

impl KubeJobOrchestrator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api_for(&self, job: &Job) -> Result<Api<Job>> {
        let namespace = job.namespace().ok_or_else(|| Error::MissingField {
            object: format!("Job {}", job.name_any()),
            field: "metadata.namespace",
        })?;
        Ok(Api::namespaced(self.client.clone(), &namespace))
    }
}

#[async_trait]
impl JobOrchestrator for KubeJobOrchestrator {
    async fn ensure_job(&self, job: &Job) -> Result<JobProgress> {
        let jobs = self.api_for(job)?;
        let name = job.name_any();

        if let Some(existing) = jobs.get_opt(&name).await? {
            return job_progress(&existing);
        }

        match jobs.create(&PostParams::default(), job).await {
            Ok(_) => {
                info!(job = %name, "Job created");
                Ok(JobProgress::Created)
            }
            Err(e) if is_api_status(&e, 409) => {
                // Lost a create race; the winner's Job is the one we observe next pass
                debug!(job = %name, "Job already exists");
                Ok(JobProgress::Running)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_job(&self, job: &Job) -> Result<JobRemoval> {
        let jobs = self.api_for(job)?;
        let name = job.name_any();

        // Foreground: the Job stays visible until its pods are gone
        match jobs.delete(&name, &DeleteParams::foreground()).await {
            Ok(response) if response.is_left() => {
                debug!(job = %name, "Job deletion in progress");
                Ok(JobRemoval::Deleting)
            }
            Ok(_) => {
                info!(job = %name, "Job deleted");
                Ok(JobRemoval::Deleted)
            }
            Err(e) if is_api_status(&e, 404) => {
                debug!(job = %name, "Job already deleted");
                Ok(JobRemoval::Absent)
            }
            Err(e) => Err(e.into()),
        }
    }
}
