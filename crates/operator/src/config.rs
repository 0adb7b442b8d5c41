//! Operator configuration
//!
//! Every knob has a default matching the behaviour operators expect out of
//! the box. Values can be overridden programmatically through the `with_*`
//! setters, or from `MARIADB_OPERATOR_*` environment variables.

use crate::crd::PARENT_LABEL;
use crate::error::{Error, Result};
use std::time::Duration;

/// Runtime configuration for the database controller
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorConfig {
    /// Namespace to watch, `None` watches all namespaces
    pub namespace: Option<String>,

    /// Label on a MariaDBDatabase that names its MariaDB
    pub parent_label: String,

    /// Requeue delay while waiting on an external readiness signal
    pub parent_wait: Duration,

    /// Requeue delay while a database Job is still running
    pub job_wait: Duration,

    /// Requeue delay after a failed reconciliation pass
    pub error_backoff: Duration,

    /// Periodic resync for resources that reached a stable state
    pub resync_interval: Option<Duration>,

    /// `backoffLimit` applied to database Jobs
    pub job_backoff_limit: i32,

    /// `ttlSecondsAfterFinished` applied to database Jobs
    pub job_ttl_seconds_after_finished: Option<i32>,

    /// Service account database Jobs run as
    pub service_account: Option<String>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            parent_label: PARENT_LABEL.to_string(),
            parent_wait: Duration::from_secs(10),
            job_wait: Duration::from_secs(5),
            error_backoff: Duration::from_secs(10),
            resync_interval: None,
            job_backoff_limit: 4,
            job_ttl_seconds_after_finished: None,
            service_account: None,
        }
    }
}

impl OperatorConfig {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_parent_label(mut self, label: impl Into<String>) -> Self {
        self.parent_label = label.into();
        self
    }

    pub fn with_parent_wait(mut self, wait: Duration) -> Self {
        self.parent_wait = wait;
        self
    }

    pub fn with_job_wait(mut self, wait: Duration) -> Self {
        self.job_wait = wait;
        self
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = Some(interval);
        self
    }

    pub fn with_job_backoff_limit(mut self, limit: i32) -> Self {
        self.job_backoff_limit = limit;
        self
    }

    pub fn with_job_ttl_seconds_after_finished(mut self, ttl: i32) -> Self {
        self.job_ttl_seconds_after_finished = Some(ttl);
        self
    }

    pub fn with_service_account(mut self, account: impl Into<String>) -> Self {
        self.service_account = Some(account.into());
        self
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(namespace) = lookup("MARIADB_OPERATOR_NAMESPACE") {
            config = config.with_namespace(namespace);
        }
        if let Some(label) = lookup("MARIADB_OPERATOR_PARENT_LABEL") {
            config = config.with_parent_label(label);
        }
        if let Some(secs) = lookup("MARIADB_OPERATOR_PARENT_WAIT_SECS") {
            config.parent_wait = parse_secs("MARIADB_OPERATOR_PARENT_WAIT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("MARIADB_OPERATOR_JOB_WAIT_SECS") {
            config.job_wait = parse_secs("MARIADB_OPERATOR_JOB_WAIT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("MARIADB_OPERATOR_ERROR_BACKOFF_SECS") {
            config.error_backoff = parse_secs("MARIADB_OPERATOR_ERROR_BACKOFF_SECS", &secs)?;
        }
        if let Some(secs) = lookup("MARIADB_OPERATOR_RESYNC_SECS") {
            config.resync_interval = Some(parse_secs("MARIADB_OPERATOR_RESYNC_SECS", &secs)?);
        }
        if let Some(limit) = lookup("MARIADB_OPERATOR_JOB_BACKOFF_LIMIT") {
            config.job_backoff_limit = limit.parse().map_err(|_| Error::InvalidConfig {
                message: format!("MARIADB_OPERATOR_JOB_BACKOFF_LIMIT is not an integer: {limit}"),
            })?;
        }
        if let Some(ttl) = lookup("MARIADB_OPERATOR_JOB_TTL_SECS") {
            let ttl = ttl.parse().map_err(|_| Error::InvalidConfig {
                message: format!("MARIADB_OPERATOR_JOB_TTL_SECS is not an integer: {ttl}"),
            })?;
            config = config.with_job_ttl_seconds_after_finished(ttl);
        }
        if let Some(account) = lookup("MARIADB_OPERATOR_SERVICE_ACCOUNT") {
            config = config.with_service_account(account);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.parent_label.is_empty() {
            return Err(Error::InvalidConfig {
                message: "parent label cannot be empty".to_string(),
            });
        }
        if self.parent_wait.is_zero() || self.job_wait.is_zero() || self.error_backoff.is_zero() {
            return Err(Error::InvalidConfig {
                message: "requeue intervals must be greater than zero".to_string(),
            });
        }
        if self.resync_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(Error::InvalidConfig {
                message: "resync interval must be greater than zero".to_string(),
            });
        }
        if self.job_backoff_limit < 0 {
            return Err(Error::InvalidConfig {
                message: format!("job backoff limit cannot be negative: {}", self.job_backoff_limit),
            });
        }
        Ok(())
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| Error::InvalidConfig {
            message: format!("{key} is not a number of seconds: {value}"),
        })
}
