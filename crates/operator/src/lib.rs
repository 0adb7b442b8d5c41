//! MariaDB Operator - Kubernetes operator for MariaDB databases
//!
//! Watches `MariaDBDatabase` resources and creates or drops the matching
//! database on the referenced `MariaDB` instance by running short-lived
//! Jobs. A finalizer keeps the resource alive until the drop Job succeeded,
//! so no database is left behind when a resource is deleted.

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod job;
pub mod metrics;
pub mod naming;
pub mod reconciler;
pub mod store;

pub use config::OperatorConfig;
pub use error::{Error, Result};
pub use metrics::OperatorMetrics;
pub use reconciler::{DatabaseReconciler, ReconcileOutcome};
pub use store::{DeclarationKey, KubeResourceStore, ResourceStore};
