//! DatabaseReconciler - drives a MariaDBDatabase toward its declared state
//!
//! One pass reads the MariaDBDatabase and its MariaDB, then walks
//! `state::decide` until a step ends the pass:
//!
//! 1. Without a deletion marker the finalizer is added first, then the create
//!    Job runs once the MariaDB is initialized. Its success sets
//!    `status.completed`, after which the Job is removed.
//! 2. With a deletion marker the create Job is deleted first and its pods are
//!    waited out. Then the drop Job runs and is removed, and only then the
//!    finalizer is released so the API server can erase the resource.
//!
//! Every write is derived from the object read in the same pass, so a
//! concurrent writer makes the pass fail with a version conflict and the
//! controller re-delivers it.

pub mod state;

use k8s_openapi::api::batch::v1::Job;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::OperatorConfig;
use crate::crd::{MariaDB, MariaDBDatabase, MariaDBDatabaseStatus};
use crate::error::{Error, Result};
use crate::job::{DatabaseJobFactory, JobKind, JobOrchestrator, JobProgress, JobRemoval};
use crate::metrics::OperatorMetrics;
use crate::store::{DeclarationKey, ResourceStore};
use state::{Decision, DeclarationView, ParentView, Retirement, TaskObservation, decide};

/// Result of a successful pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// `None` when nothing is left to wait for
    pub requeue_after: Option<Duration>,
}

impl ReconcileOutcome {
    pub fn done() -> Self {
        Self {
            requeue_after: None,
        }
    }

    pub fn requeue(after: Duration) -> Self {
        Self {
            requeue_after: Some(after),
        }
    }
}

pub struct DatabaseReconciler {
    store: Arc<dyn ResourceStore>,
    jobs: Arc<dyn JobOrchestrator>,
    factory: DatabaseJobFactory,
    config: OperatorConfig,
    metrics: OperatorMetrics,
}

impl std::fmt::Debug for DatabaseReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseReconciler")
            .field("factory", &self.factory)
            .field("config", &self.config)
            .finish()
    }
}

impl DatabaseReconciler {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        jobs: Arc<dyn JobOrchestrator>,
        config: OperatorConfig,
        metrics: OperatorMetrics,
    ) -> Self {
        let factory = DatabaseJobFactory::new((&config).into());
        Self {
            store,
            jobs,
            factory,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &OperatorMetrics {
        &self.metrics
    }

    /// Run one reconciliation pass for `key`
    #[instrument(skip_all, fields(declaration = %key))]
    pub async fn reconcile(&self, key: &DeclarationKey) -> Result<ReconcileOutcome> {
        self.metrics.reconciliations.inc();
        let result = self.reconcile_pass(key).await;
        if let Err(e) = &result {
            self.metrics
                .reconcile_errors
                .with_label_values(&[e.metric_label()])
                .inc();
        }
        result
    }

    async fn reconcile_pass(&self, key: &DeclarationKey) -> Result<ReconcileOutcome> {
        let Some(mut database) = self.store.get_declaration(key).await? else {
            debug!("MariaDBDatabase not found, nothing to do");
            return Ok(ReconcileOutcome::done());
        };

        let Some(parent) = self.fetch_parent(key, &database).await? else {
            return Ok(ReconcileOutcome::done());
        };
        let parent_view = ParentView::observe(&parent);

        let mut retirement = Retirement::Unchecked;
        let mut task = TaskObservation::Unobserved;
        loop {
            let decision = decide(
                &DeclarationView::observe(&database),
                &parent_view,
                retirement,
                task,
            );
            debug!(phase = decision.phase(), "Derived phase");

            match decision {
                Decision::Nothing => return Ok(ReconcileOutcome::done()),
                Decision::AddGuard => {
                    database = self.add_guard(database).await?;
                }
                Decision::RetireProvision => {
                    retirement = self
                        .remove_job(JobKind::Provision, &database, &parent)
                        .await?
                        .into();
                }
                Decision::AwaitRetirement => {
                    info!("Waiting on create Job removal before dropping");
                    return Ok(ReconcileOutcome::requeue(self.config.job_wait));
                }
                Decision::AwaitParent => {
                    info!(parent = %parent.name_any(), "DB initialization not complete, requeueing");
                    return Ok(ReconcileOutcome::requeue(self.config.parent_wait));
                }
                Decision::EnsureTask(kind) => {
                    let job = self.job_for(kind, &database, &parent)?;
                    let progress = self.jobs.ensure_job(&job).await?;
                    if progress == JobProgress::Created {
                        self.metrics.jobs_created.inc();
                        info!(operation = %kind, "Started database Job");
                    }
                    task = progress.into();
                }
                Decision::AwaitTask(kind) => {
                    info!(operation = %kind, "Waiting on database Job");
                    return Ok(ReconcileOutcome::requeue(self.config.job_wait));
                }
                Decision::FinishProvision => {
                    database = self.set_completed(database).await?;
                    self.remove_job(JobKind::Provision, &database, &parent).await?;
                    return Ok(ReconcileOutcome::done());
                }
                Decision::FinishDeprovision => {
                    self.remove_job(JobKind::Deprovision, &database, &parent).await?;
                    self.remove_guard(database).await?;
                    info!("Database dropped, finalizer released");
                    return Ok(ReconcileOutcome::done());
                }
            }
        }
    }

    /// `Ok(None)` ends the pass without requeue
    async fn fetch_parent(
        &self,
        key: &DeclarationKey,
        database: &MariaDBDatabase,
    ) -> Result<Option<MariaDB>> {
        let Some(name) = database.parent_name(&self.config.parent_label) else {
            warn!(label = %self.config.parent_label, "MariaDBDatabase has no MariaDB label");
            return Ok(None);
        };

        match self.store.get_parent(&key.namespace, &name).await {
            Ok(Some(parent)) => Ok(Some(parent)),
            Ok(None) => {
                info!(parent = %name, label = %self.config.parent_label, "No MariaDB found for label");
                Ok(None)
            }
            Err(e) => Err(Error::ParentLookup {
                name,
                source: Box::new(e),
            }),
        }
    }

    async fn add_guard(&self, mut database: MariaDBDatabase) -> Result<MariaDBDatabase> {
        let token = database.guard_token();
        database.metadata.finalizers.get_or_insert_with(Vec::new).push(token.clone());
        let stored = self.store.update_declaration(&database).await?;
        info!(finalizer = %token, "Finalizer added");
        Ok(stored)
    }

    async fn remove_guard(&self, mut database: MariaDBDatabase) -> Result<MariaDBDatabase> {
        let token = database.guard_token();
        if let Some(finalizers) = database.metadata.finalizers.as_mut() {
            finalizers.retain(|f| *f != token);
        }
        self.store.update_declaration(&database).await
    }

    async fn set_completed(&self, mut database: MariaDBDatabase) -> Result<MariaDBDatabase> {
        if database.is_completed() {
            return Ok(database);
        }
        database
            .status
            .get_or_insert_with(MariaDBDatabaseStatus::default)
            .completed = true;
        let stored = self.store.update_declaration_status(&database).await?;
        info!("Database creation completed");
        Ok(stored)
    }

    fn job_for(&self, kind: JobKind, database: &MariaDBDatabase, parent: &MariaDB) -> Result<Job> {
        match kind {
            JobKind::Provision => self.factory.provision_job(database, parent),
            JobKind::Deprovision => self.factory.deprovision_job(database, parent),
        }
    }

    async fn remove_job(
        &self,
        kind: JobKind,
        database: &MariaDBDatabase,
        parent: &MariaDB,
    ) -> Result<JobRemoval> {
        let job = self.job_for(kind, database, parent)?;
        let removal = self.jobs.delete_job(&job).await?;
        match removal {
            JobRemoval::Absent => {}
            JobRemoval::Deleting => {
                self.metrics.jobs_deleted.inc();
                debug!(operation = %kind, "Job deletion still in flight");
            }
            JobRemoval::Deleted => self.metrics.jobs_deleted.inc(),
        }
        Ok(removal)
    }
}
