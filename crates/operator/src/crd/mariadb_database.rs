//! MariaDBDatabase CRD - Declares a database on a MariaDB instance

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::naming::{MAX_NAME_LEN, bounded_name};

const GUARD_PREFIX: &str = "mariadb-";

/// MariaDBDatabase CRD - The database name is the resource name
#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[kube(
    group = "database.openstack.org",
    version = "v1beta1",
    kind = "MariaDBDatabase",
    namespaced,
    status = "MariaDBDatabaseStatus",
    shortname = "mariadbdb",
    printcolumn = r#"{"name":"Completed","type":"boolean","jsonPath":".status.completed"}"#
)]
pub struct MariaDBDatabaseSpec {}

/// MariaDBDatabaseStatus defines the observed state of MariaDBDatabase
#[derive(Debug, Clone, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MariaDBDatabaseStatus {
    /// Set once the create Job succeeded, never reset
    #[serde(default)]
    pub completed: bool,
}

impl MariaDBDatabase {
    /// Finalizer this operator owns on the resource
    pub fn guard_token(&self) -> String {
        let name = bounded_name(&self.name_any(), MAX_NAME_LEN - GUARD_PREFIX.len());
        format!("{GUARD_PREFIX}{name}")
    }

    pub fn is_guarded(&self) -> bool {
        let token = self.guard_token();
        self.finalizers().iter().any(|f| *f == token)
    }

    pub fn deletion_requested(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.completed)
    }

    /// Name of the `MariaDB` this database lives on, read from `label`
    pub fn parent_name(&self, label: &str) -> Option<String> {
        self.labels()
            .get(label)
            .filter(|name| !name.is_empty())
            .cloned()
    }
}
