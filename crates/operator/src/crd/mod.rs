//! CRD Definitions for the MariaDB Operator
//!
//! Two namespaced kinds live in the `database.openstack.org` group:
//! `MariaDB` describes a running engine instance (credentials, image and
//! readiness), `MariaDBDatabase` declares that a database should exist on
//! one of those instances.

mod mariadb;
mod mariadb_database;

pub use mariadb::{MariaDB, MariaDBSpec, MariaDBStatus};
pub use mariadb_database::{MariaDBDatabase, MariaDBDatabaseSpec, MariaDBDatabaseStatus};

/// Default label on a `MariaDBDatabase` naming its `MariaDB` instance
pub const PARENT_LABEL: &str = "dbName";
