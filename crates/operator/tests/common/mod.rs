//! In-memory collaborators for reconciliation tests
//!
//! `InMemoryStore` mimics the API server semantics the reconciler relies on:
//! resourceVersion preconditions on every write, and erasure of a resource
//! once it is marked for deletion and carries no finalizers.

#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{Job, JobCondition, JobStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;
use kube::core::ErrorResponse;
use mariadb_operator::crd::{
    MariaDB, MariaDBDatabase, MariaDBDatabaseSpec, MariaDBDatabaseStatus, MariaDBSpec,
    MariaDBStatus,
};
use mariadb_operator::job::{JobOrchestrator, JobProgress, JobRemoval, job_progress};
use mariadb_operator::{DeclarationKey, Error, ResourceStore, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

pub const NAMESPACE: &str = "openstack";
pub const PARENT: &str = "openstack";

pub fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: reason.to_string(),
        reason: reason.to_string(),
        code,
    })
}

/// MariaDBDatabase fixture labelled with the default parent label
pub fn database(name: &str) -> MariaDBDatabase {
    let mut db = MariaDBDatabase::new(name, MariaDBDatabaseSpec {});
    db.metadata.namespace = Some(NAMESPACE.to_string());
    db.labels_mut().insert("dbName".to_string(), PARENT.to_string());
    db
}

pub fn guarded(mut db: MariaDBDatabase) -> MariaDBDatabase {
    let token = db.guard_token();
    db.finalizers_mut().push(token);
    db
}

pub fn completed(mut db: MariaDBDatabase) -> MariaDBDatabase {
    db.status = Some(MariaDBDatabaseStatus { completed: true });
    db
}

pub fn deleting(mut db: MariaDBDatabase) -> MariaDBDatabase {
    db.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
    db
}

pub fn parent(ready: bool) -> MariaDB {
    let mut parent = MariaDB::new(
        PARENT,
        MariaDBSpec {
            secret: "osp-secret".to_string(),
            container_image: "quay.io/tripleo/mariadb:current".to_string(),
            ..Default::default()
        },
    );
    parent.metadata.namespace = Some(NAMESPACE.to_string());
    parent.status = Some(MariaDBStatus {
        db_init_hash: if ready { "n5c4h".to_string() } else { String::new() },
    });
    parent
}

/// Versioned in-memory store for MariaDBDatabases and MariaDBs
#[derive(Debug, Default)]
pub struct InMemoryStore {
    declarations: Mutex<HashMap<DeclarationKey, MariaDBDatabase>>,
    parents: Mutex<HashMap<(String, String), MariaDB>>,
    writes: Mutex<Vec<String>>,
    parent_error: Mutex<Option<u16>>,
    conflict_next_write: Mutex<bool>,
    version: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    pub async fn insert_declaration(&self, mut db: MariaDBDatabase) -> DeclarationKey {
        db.metadata.resource_version = Some(self.next_version());
        let key = DeclarationKey::from_resource(&db).unwrap();
        self.declarations.lock().await.insert(key.clone(), db);
        key
    }

    pub async fn insert_parent(&self, parent: MariaDB) {
        let key = (parent.namespace().unwrap(), parent.name_any());
        self.parents.lock().await.insert(key, parent);
    }

    pub async fn declaration(&self, key: &DeclarationKey) -> Option<MariaDBDatabase> {
        self.declarations.lock().await.get(key).cloned()
    }

    /// Descriptions of every successful write, in order
    pub async fn writes(&self) -> Vec<String> {
        self.writes.lock().await.clone()
    }

    /// Make parent lookups fail with an API error carrying `code`
    pub async fn fail_parent_lookups(&self, code: u16) {
        *self.parent_error.lock().await = Some(code);
    }

    /// Simulate a concurrent writer winning the race for the next write
    pub async fn conflict_on_next_write(&self) {
        *self.conflict_next_write.lock().await = true;
    }

    /// Set the deletion marker as the API server does on delete
    pub async fn mark_deleting(&self, key: &DeclarationKey) {
        let version = self.next_version();
        if let Some(db) = self.declarations.lock().await.get_mut(key) {
            db.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
            db.metadata.resource_version = Some(version);
        }
    }

    /// Simulate a concurrent writer touching the stored object
    pub async fn touch(&self, key: &DeclarationKey) {
        let version = self.next_version();
        if let Some(db) = self.declarations.lock().await.get_mut(key) {
            db.metadata.resource_version = Some(version);
        }
    }

    async fn check_precondition(
        &self,
        key: &DeclarationKey,
        db: &MariaDBDatabase,
        stored: &HashMap<DeclarationKey, MariaDBDatabase>,
    ) -> Result<MariaDBDatabase> {
        let mut conflict = self.conflict_next_write.lock().await;
        let current = stored
            .get(key)
            .ok_or_else(|| Error::Kube(api_error(404, "NotFound")))?;
        if *conflict || current.resource_version() != db.resource_version() {
            *conflict = false;
            return Err(Error::VersionConflict {
                kind: "MariaDBDatabase",
                name: key.name.clone(),
            });
        }
        Ok(current.clone())
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get_declaration(&self, key: &DeclarationKey) -> Result<Option<MariaDBDatabase>> {
        Ok(self.declarations.lock().await.get(key).cloned())
    }

    async fn get_parent(&self, namespace: &str, name: &str) -> Result<Option<MariaDB>> {
        if let Some(code) = *self.parent_error.lock().await {
            return Err(Error::Kube(api_error(code, "ServiceUnavailable")));
        }
        Ok(self
            .parents
            .lock()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn update_declaration(&self, db: &MariaDBDatabase) -> Result<MariaDBDatabase> {
        let key = DeclarationKey::from_resource(db)?;
        let mut stored = self.declarations.lock().await;
        let current = self.check_precondition(&key, db, &stored).await?;

        let mut updated = db.clone();
        updated.status = current.status;
        updated.metadata.deletion_timestamp = current.metadata.deletion_timestamp;
        updated.metadata.resource_version = Some(self.next_version());
        self.writes.lock().await.push(format!("update {key}"));

        if updated.deletion_requested() && updated.finalizers().is_empty() {
            stored.remove(&key);
        } else {
            stored.insert(key, updated.clone());
        }
        Ok(updated)
    }

    async fn update_declaration_status(&self, db: &MariaDBDatabase) -> Result<MariaDBDatabase> {
        let key = DeclarationKey::from_resource(db)?;
        let mut stored = self.declarations.lock().await;
        let mut updated = self.check_precondition(&key, db, &stored).await?;

        updated.status = db.status.clone();
        updated.metadata.resource_version = Some(self.next_version());
        self.writes.lock().await.push(format!("status {key}"));
        stored.insert(key, updated.clone());
        Ok(updated)
    }
}

/// Job orchestrator keeping Jobs in memory; tests drive their status
#[derive(Debug, Default)]
pub struct FakeJobOrchestrator {
    jobs: Mutex<HashMap<String, Job>>,
    created: Mutex<Vec<Job>>,
    ensured: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    lingering: Mutex<HashSet<String>>,
}

impl FakeJobOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn job(&self, name: &str) -> Option<Job> {
        self.jobs.lock().await.get(name).cloned()
    }

    pub async fn created(&self) -> Vec<Job> {
        self.created.lock().await.clone()
    }

    pub async fn created_names(&self) -> Vec<String> {
        self.created.lock().await.iter().map(|j| j.name_any()).collect()
    }

    pub async fn ensured(&self) -> Vec<String> {
        self.ensured.lock().await.clone()
    }

    /// Jobs whose deletion was accepted, in order
    pub async fn deleted(&self) -> Vec<String> {
        self.deleted.lock().await.clone()
    }

    /// Keep the Job around after a delete request, as if its pods still ran
    pub async fn linger(&self, name: &str) {
        self.lingering.lock().await.insert(name.to_string());
    }

    /// Let a lingering Job's pods finish; the Job disappears
    pub async fn release(&self, name: &str) {
        self.lingering.lock().await.remove(name);
        self.jobs.lock().await.remove(name);
    }

    pub async fn succeed(&self, name: &str) {
        self.set_status(
            name,
            JobStatus {
                succeeded: Some(1),
                ..Default::default()
            },
        )
        .await;
    }

    pub async fn fail(&self, name: &str) {
        self.set_status(
            name,
            JobStatus {
                failed: Some(5),
                conditions: Some(vec![JobCondition {
                    type_: "Failed".to_string(),
                    status: "True".to_string(),
                    reason: Some("BackoffLimitExceeded".to_string()),
                    message: Some("Job has reached the specified backoff limit".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            },
        )
        .await;
    }

    async fn set_status(&self, name: &str, status: JobStatus) {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(name).unwrap_or_else(|| panic!("no job named {name}"));
        job.status = Some(status);
    }
}

#[async_trait]
impl JobOrchestrator for FakeJobOrchestrator {
    async fn ensure_job(&self, job: &Job) -> Result<JobProgress> {
        let name = job.name_any();
        self.ensured.lock().await.push(name.clone());

        let mut jobs = self.jobs.lock().await;
        if let Some(existing) = jobs.get(&name) {
            return job_progress(existing);
        }
        jobs.insert(name, job.clone());
        self.created.lock().await.push(job.clone());
        Ok(JobProgress::Created)
    }

    async fn delete_job(&self, job: &Job) -> Result<JobRemoval> {
        let name = job.name_any();
        let mut jobs = self.jobs.lock().await;
        if !jobs.contains_key(&name) {
            return Ok(JobRemoval::Absent);
        }
        self.deleted.lock().await.push(name.clone());

        if self.lingering.lock().await.contains(&name) {
            return Ok(JobRemoval::Deleting);
        }
        jobs.remove(&name);
        Ok(JobRemoval::Deleted)
    }
}
