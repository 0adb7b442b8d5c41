//! Database Job Factory
//!
//! Builds the `batch/v1` Job that creates or drops a database. Construction
//! is pure: the same MariaDBDatabase and MariaDB always produce the same Job,
//! name included, so the orchestrator can treat the name as the identity of
//! the operation.

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, PodSpec, PodTemplateSpec, SecretKeySelector,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;

use super::JobKind;
use crate::config::OperatorConfig;
use crate::crd::{MariaDB, MariaDBDatabase};
use crate::error::{Error, Result};
use crate::naming::{MAX_NAME_LEN, bounded_name};

const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
const DATABASE_LABEL: &str = "mariadb.openstack.org/database";
const OPERATION_LABEL: &str = "mariadb.openstack.org/operation";
const PASSWORD_SECRET_KEY: &str = "DbRootPassword";
const ADMIN_USERNAME: &str = "root";

const CREATE_SCRIPT: &str = r#"MYSQL_PWD="${DatabasePassword}" mysql -h "${DatabaseHost}" -u "${DatabaseAdminUsername}" -P 3306 -e "CREATE DATABASE IF NOT EXISTS \`${DatabaseName}\`;""#;
const DELETE_SCRIPT: &str = r#"MYSQL_PWD="${DatabasePassword}" mysql -h "${DatabaseHost}" -u "${DatabaseAdminUsername}" -P 3306 -e "DROP DATABASE IF EXISTS \`${DatabaseName}\`;""#;

/// Name of the Job performing `kind` for the database `database_name`
///
/// The name doubles as the `job-name` label of the Job's pods, so it is
/// bounded like a label value. The kind suffix is always kept intact.
pub fn job_name(database_name: &str, kind: JobKind) -> String {
    let suffix = kind.name_suffix();
    let prefix = bounded_name(database_name, MAX_NAME_LEN - suffix.len() - 1);
    format!("{prefix}-{suffix}")
}

/// Settings shared by every Job the factory builds
#[derive(Debug, Clone)]
pub struct DatabaseJobFactoryConfig {
    /// Labels added to every Job and its pod template
    pub base_labels: BTreeMap<String, String>,
    pub backoff_limit: i32,
    pub ttl_seconds_after_finished: Option<i32>,
    pub service_account: Option<String>,
}

impl Default for DatabaseJobFactoryConfig {
    fn default() -> Self {
        Self {
            base_labels: BTreeMap::from([(
                MANAGED_BY_LABEL.to_string(),
                "mariadb-operator".to_string(),
            )]),
            backoff_limit: 4,
            ttl_seconds_after_finished: None,
            service_account: None,
        }
    }
}

impl From<&OperatorConfig> for DatabaseJobFactoryConfig {
    fn from(config: &OperatorConfig) -> Self {
        Self {
            backoff_limit: config.job_backoff_limit,
            ttl_seconds_after_finished: config.job_ttl_seconds_after_finished,
            service_account: config.service_account.clone(),
            ..Self::default()
        }
    }
}

/// DatabaseJobFactory - builds create and drop Jobs for MariaDBDatabases
#[derive(Debug, Clone, Default)]
pub struct DatabaseJobFactory {
    config: DatabaseJobFactoryConfig,
}

impl DatabaseJobFactory {
    pub fn new(config: DatabaseJobFactoryConfig) -> Self {
        Self { config }
    }

    /// Job that creates the database if it does not exist
    pub fn provision_job(&self, database: &MariaDBDatabase, parent: &MariaDB) -> Result<Job> {
        self.build_job(JobKind::Provision, database, parent)
    }

    /// Job that drops the database if it exists
    pub fn deprovision_job(&self, database: &MariaDBDatabase, parent: &MariaDB) -> Result<Job> {
        self.build_job(JobKind::Deprovision, database, parent)
    }

    fn build_job(
        &self,
        kind: JobKind,
        database: &MariaDBDatabase,
        parent: &MariaDB,
    ) -> Result<Job> {
        let database_name = database.name_any();
        let namespace = database.namespace().ok_or_else(|| Error::MissingField {
            object: format!("MariaDBDatabase {database_name}"),
            field: "metadata.namespace",
        })?;

        let labels = self.build_labels(&database_name, kind);
        let container = Container {
            name: format!("mariadb-database-{}", kind.name_suffix()),
            image: Some(parent.spec.container_image.clone()),
            command: Some(vec!["/bin/bash".to_string()]),
            args: Some(vec!["-c".to_string(), script_for(kind).to_string()]),
            env: Some(self.build_env_vars(&database_name, parent)),
            image_pull_policy: Some("IfNotPresent".to_string()),
            ..Default::default()
        };

        Ok(Job {
            metadata: ObjectMeta {
                name: Some(job_name(&database_name, kind)),
                namespace: Some(namespace),
                labels: Some(labels.clone()),
                ..Default::default()
            },
            spec: Some(JobSpec {
                backoff_limit: Some(self.config.backoff_limit),
                ttl_seconds_after_finished: self.config.ttl_seconds_after_finished,
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        restart_policy: Some("OnFailure".to_string()),
                        service_account_name: self.config.service_account.clone(),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn build_labels(&self, database_name: &str, kind: JobKind) -> BTreeMap<String, String> {
        let mut labels = self.config.base_labels.clone();
        labels.insert(
            DATABASE_LABEL.to_string(),
            bounded_name(database_name, MAX_NAME_LEN),
        );
        labels.insert(OPERATION_LABEL.to_string(), kind.as_str().to_string());
        labels
    }

    fn build_env_vars(&self, database_name: &str, parent: &MariaDB) -> Vec<EnvVar> {
        vec![
            EnvVar {
                name: "DatabaseName".to_string(),
                value: Some(database_name.to_string()),
                ..Default::default()
            },
            EnvVar {
                name: "DatabaseHost".to_string(),
                value: Some(parent.name_any()),
                ..Default::default()
            },
            EnvVar {
                name: "DatabaseAdminUsername".to_string(),
                value: Some(ADMIN_USERNAME.to_string()),
                ..Default::default()
            },
            EnvVar {
                name: "DatabasePassword".to_string(),
                value_from: Some(EnvVarSource {
                    secret_key_ref: Some(SecretKeySelector {
                        name: parent.spec.secret.clone(),
                        key: PASSWORD_SECRET_KEY.to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ]
    }
}

fn script_for(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Provision => CREATE_SCRIPT,
        JobKind::Deprovision => DELETE_SCRIPT,
    }
}
