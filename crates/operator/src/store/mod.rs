//! Resource store access
//!
//! The reconciler reads and writes MariaDBDatabases and reads MariaDBs only
//! through `ResourceStore`. Writes carry the `resourceVersion` of the object
//! they were derived from, so a write based on a stale read fails with
//! `Error::VersionConflict` instead of overwriting a concurrent change.

use async_trait::async_trait;
use kube::{
    Client, Resource, ResourceExt,
    api::{Api, Patch, PatchParams, PostParams},
};
use serde_json::json;
use std::fmt;

use crate::crd::{MariaDB, MariaDBDatabase};
use crate::error::{Error, Result, is_api_status};

/// Namespace and name of a MariaDBDatabase
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclarationKey {
    pub namespace: String,
    pub name: String,
}

impl DeclarationKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn from_resource(database: &MariaDBDatabase) -> Result<Self> {
        let name = database.meta().name.clone().ok_or_else(|| Error::MissingField {
            object: "MariaDBDatabase".to_string(),
            field: "metadata.name",
        })?;
        let namespace = database.namespace().ok_or_else(|| Error::MissingField {
            object: format!("MariaDBDatabase {name}"),
            field: "metadata.namespace",
        })?;
        Ok(Self { namespace, name })
    }
}

impl fmt::Display for DeclarationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// `None` when the MariaDBDatabase does not exist
    async fn get_declaration(&self, key: &DeclarationKey) -> Result<Option<MariaDBDatabase>>;

    /// `None` when the MariaDB does not exist
    async fn get_parent(&self, namespace: &str, name: &str) -> Result<Option<MariaDB>>;

    /// Replace metadata and spec, returns the stored object
    async fn update_declaration(&self, database: &MariaDBDatabase) -> Result<MariaDBDatabase>;

    /// Write the status subresource, returns the stored object
    async fn update_declaration_status(
        &self,
        database: &MariaDBDatabase,
    ) -> Result<MariaDBDatabase>;
}

/// ResourceStore backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeResourceStore {
    client: Client,
}

impl KubeResourceStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn declarations(&self, database: &MariaDBDatabase) -> Result<(Api<MariaDBDatabase>, String)> {
        let key = DeclarationKey::from_resource(database)?;
        Ok((Api::namespaced(self.client.clone(), &key.namespace), key.name))
    }
}

fn write_error(error: kube::Error, name: &str) -> Error {
    if is_api_status(&error, 409) {
        Error::VersionConflict {
            kind: "MariaDBDatabase",
            name: name.to_string(),
        }
    } else {
        Error::Kube(error)
    }
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn get_declaration(&self, key: &DeclarationKey) -> Result<Option<MariaDBDatabase>> {
        let api: Api<MariaDBDatabase> = Api::namespaced(self.client.clone(), &key.namespace);
        Ok(api.get_opt(&key.name).await?)
    }

    async fn get_parent(&self, namespace: &str, name: &str) -> Result<Option<MariaDB>> {
        let api: Api<MariaDB> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn update_declaration(&self, database: &MariaDBDatabase) -> Result<MariaDBDatabase> {
        let (api, name) = self.declarations(database)?;
        api.replace(&name, &PostParams::default(), database)
            .await
            .map_err(|e| write_error(e, &name))
    }

    async fn update_declaration_status(
        &self,
        database: &MariaDBDatabase,
    ) -> Result<MariaDBDatabase> {
        let (api, name) = self.declarations(database)?;
        // A resourceVersion inside a merge patch is checked like an update precondition
        let patch = json!({
            "metadata": { "resourceVersion": database.resource_version() },
            "status": database.status,
        });
        api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| write_error(e, &name))
    }
}
