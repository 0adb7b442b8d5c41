//! MariaDB Operator - Main Entry Point

use anyhow::{Context, Result};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use clap::{Args, Parser, Subcommand, ValueEnum};
use kube::{Client, CustomResourceExt};
use mariadb_operator::crd::{MariaDB, MariaDBDatabase};
use mariadb_operator::{OperatorConfig, OperatorMetrics, controller};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

/// MariaDB Kubernetes Operator
#[derive(Parser, Debug)]
#[command(name = "mariadb-operator")]
#[command(version)]
#[command(about = "Kubernetes operator that manages MariaDB databases", long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the controller (default)
    Run(RunArgs),
    /// Print the CustomResourceDefinitions as JSON
    Crd,
}

/// Flags override the `MARIADB_OPERATOR_*` environment read by
/// `OperatorConfig::from_env`
#[derive(Args, Debug)]
struct RunArgs {
    /// Namespace to watch, all namespaces when omitted
    #[arg(long)]
    namespace: Option<String>,

    /// Label on MariaDBDatabase naming its MariaDB [default: dbName]
    #[arg(long)]
    parent_label: Option<String>,

    /// Seconds between checks while the MariaDB is initializing [default: 10]
    #[arg(long)]
    parent_wait_secs: Option<u64>,

    /// Seconds between checks while a database Job is running [default: 5]
    #[arg(long)]
    job_wait_secs: Option<u64>,

    /// Seconds before retrying a failed reconciliation [default: 10]
    #[arg(long)]
    error_backoff_secs: Option<u64>,

    /// Periodically re-reconcile stable resources every N seconds
    #[arg(long)]
    resync_interval_secs: Option<u64>,

    /// backoffLimit of database Jobs [default: 4]
    #[arg(long)]
    job_backoff_limit: Option<i32>,

    /// ttlSecondsAfterFinished of database Jobs
    #[arg(long)]
    job_ttl_secs: Option<i32>,

    /// Service account database Jobs run as
    #[arg(long)]
    service_account: Option<String>,

    /// Port of the health and metrics endpoint
    #[arg(long, env = "MARIADB_OPERATOR_HTTP_PORT", default_value_t = 8080)]
    http_port: u16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl RunArgs {
    fn operator_config(&self) -> Result<OperatorConfig> {
        let config =
            OperatorConfig::from_env().context("Invalid MARIADB_OPERATOR_* environment")?;
        self.apply(config)
    }

    /// Layer the flags that were given on top of `config`
    fn apply(&self, mut config: OperatorConfig) -> Result<OperatorConfig> {
        if let Some(namespace) = &self.namespace {
            config = config.with_namespace(namespace.clone());
        }
        if let Some(label) = &self.parent_label {
            config = config.with_parent_label(label.clone());
        }
        if let Some(secs) = self.parent_wait_secs {
            config = config.with_parent_wait(Duration::from_secs(secs));
        }
        if let Some(secs) = self.job_wait_secs {
            config = config.with_job_wait(Duration::from_secs(secs));
        }
        if let Some(secs) = self.error_backoff_secs {
            config = config.with_error_backoff(Duration::from_secs(secs));
        }
        if let Some(secs) = self.resync_interval_secs {
            config = config.with_resync_interval(Duration::from_secs(secs));
        }
        if let Some(limit) = self.job_backoff_limit {
            config = config.with_job_backoff_limit(limit);
        }
        if let Some(ttl) = self.job_ttl_secs {
            config = config.with_job_ttl_seconds_after_finished(ttl);
        }
        if let Some(account) = &self.service_account {
            config = config.with_service_account(account.clone());
        }

        config.validate().context("Invalid operator configuration")?;
        Ok(config)
    }

    /// Arguments when no subcommand was given: environment and defaults only
    fn parse_from_env() -> Self {
        RunOnly::parse_from(["mariadb-operator"]).args
    }
}

#[derive(Parser, Debug)]
struct RunOnly {
    #[command(flatten)]
    args: RunArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level, cli.log_format);

    match cli.command {
        Some(Command::Crd) => print_crds(),
        Some(Command::Run(args)) => run(args).await,
        None => run(RunArgs::parse_from_env()).await,
    }
}

fn init_tracing(level: LogLevel, format: LogFormat) {
    let level = match level {
        LogLevel::Trace => LevelFilter::TRACE,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

fn print_crds() -> Result<()> {
    let crds = [MariaDB::crd(), MariaDBDatabase::crd()];
    println!(
        "{}",
        serde_json::to_string_pretty(&crds).context("Failed to serialize CRDs")?
    );
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    let config = args.operator_config()?;
    info!(?config, "Starting MariaDB operator");

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    info!("Connected to Kubernetes");

    let metrics = OperatorMetrics::new().context("Failed to register metrics")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], args.http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Health and metrics endpoint at http://{}", addr);

    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(|| async { "ok" }))
        .route("/metrics", get(render_metrics))
        .with_state(metrics.clone());

    tokio::select! {
        _ = controller::run(client, config, metrics) => {
            info!("Shutting down operator...");
        }
        served = axum::serve(listener, app).into_future() => {
            served.context("HTTP server failed")?;
        }
    }

    Ok(())
}

async fn render_metrics(State(metrics): State<OperatorMetrics>) -> (StatusCode, String) {
    match metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
