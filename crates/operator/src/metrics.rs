//! OperatorMetrics - Prometheus metrics for database reconciliation

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters for reconciliation passes and the Jobs they drive
#[derive(Debug, Clone)]
pub struct OperatorMetrics {
    registry: Registry,

    /// Reconciliation passes started
    pub reconciliations: IntCounter,

    /// Failed passes, labelled by error kind
    pub reconcile_errors: IntCounterVec,

    /// Database Jobs submitted
    pub jobs_created: IntCounter,

    /// Job deletions accepted by the API server; absent Jobs are not counted
    pub jobs_deleted: IntCounter,
}

impl OperatorMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reconciliations = IntCounter::new(
            "mariadb_operator_reconciliations_total",
            "Total MariaDBDatabase reconciliation passes",
        )?;
        let reconcile_errors = IntCounterVec::new(
            Opts::new(
                "mariadb_operator_reconcile_errors_total",
                "Total failed MariaDBDatabase reconciliation passes",
            ),
            &["kind"],
        )?;
        let jobs_created = IntCounter::new(
            "mariadb_operator_jobs_created_total",
            "Total database Jobs created",
        )?;
        let jobs_deleted = IntCounter::new(
            "mariadb_operator_jobs_deleted_total",
            "Total database Job deletions accepted",
        )?;

        registry.register(Box::new(reconciliations.clone()))?;
        registry.register(Box::new(reconcile_errors.clone()))?;
        registry.register(Box::new(jobs_created.clone()))?;
        registry.register(Box::new(jobs_deleted.clone()))?;

        Ok(Self {
            registry,
            reconciliations,
            reconcile_errors,
            jobs_created,
            jobs_deleted,
        })
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
