//! MariaDB CRD - The engine instance databases are created on

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// MariaDB CRD - Read-only input for database reconciliation
#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[kube(
    group = "database.openstack.org",
    version = "v1beta1",
    kind = "MariaDB",
    namespaced,
    status = "MariaDBStatus",
    shortname = "mdb",
    printcolumn = r#"{"name":"InitHash","type":"string","jsonPath":".status.dbInitHash"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MariaDBSpec {
    /// Secret holding the root password under `DbRootPassword`
    pub secret: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_request: Option<String>,

    /// Image used both for the server and for database Jobs
    pub container_image: String,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MariaDBStatus {
    /// Set once the instance finished bootstrapping
    #[serde(default)]
    pub db_init_hash: String,
}

impl MariaDB {
    /// True once the instance reports a non-empty init hash
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|status| !status.db_init_hash.is_empty())
    }
}
