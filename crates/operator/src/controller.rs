//! MariaDBDatabase controller
//!
//! Binds `DatabaseReconciler` to the kube-runtime watch queue. The queue
//! serializes passes per resource and runs distinct resources concurrently;
//! this module only translates outcomes and errors into requeue actions.

use futures::StreamExt;
use kube::{
    Api, Client,
    runtime::{Controller, controller::Action, watcher},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::OperatorConfig;
use crate::crd::MariaDBDatabase;
use crate::error::Error;
use crate::job::KubeJobOrchestrator;
use crate::metrics::OperatorMetrics;
use crate::reconciler::{DatabaseReconciler, ReconcileOutcome};
use crate::store::{DeclarationKey, KubeResourceStore};

/// Watch MariaDBDatabases and reconcile them until a shutdown signal arrives
pub async fn run(client: Client, config: OperatorConfig, metrics: OperatorMetrics) {
    let databases: Api<MariaDBDatabase> = match &config.namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };

    let reconciler = Arc::new(DatabaseReconciler::new(
        Arc::new(KubeResourceStore::new(client.clone())),
        Arc::new(KubeJobOrchestrator::new(client)),
        config,
        metrics,
    ));

    info!(namespace = ?reconciler.config().namespace, "MariaDBDatabase controller starting");

    Controller::new(databases, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => debug!(declaration = %object, ?action, "Reconciled"),
                Err(e) => warn!(error = %e, "Controller error"),
            }
        })
        .await;

    info!("MariaDBDatabase controller stopped");
}

async fn reconcile(
    database: Arc<MariaDBDatabase>,
    reconciler: Arc<DatabaseReconciler>,
) -> Result<Action, Error> {
    let key = DeclarationKey::from_resource(&database)?;
    let outcome = reconciler.reconcile(&key).await?;
    Ok(requeue_action(outcome, reconciler.config().resync_interval))
}

fn error_policy(
    database: Arc<MariaDBDatabase>,
    error: &Error,
    reconciler: Arc<DatabaseReconciler>,
) -> Action {
    let retry = error.requeue_after(reconciler.config());
    warn!(
        declaration = %kube::ResourceExt::name_any(database.as_ref()),
        error = %error,
        retry_in = ?retry,
        "Reconciliation failed"
    );
    Action::requeue(retry)
}

/// Map an outcome to a controller action, resyncing stable resources if configured
pub fn requeue_action(outcome: ReconcileOutcome, resync_interval: Option<Duration>) -> Action {
    match outcome.requeue_after.or(resync_interval) {
        Some(after) => Action::requeue(after),
        None => Action::await_change(),
    }
}
