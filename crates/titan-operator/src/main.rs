//! Titan Operator - admission-controlled TrainingJob execution on Kubernetes

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use tracing::info;

use titan_api::{start_server, KubeJobCatalog, ServerConfig};
use titan_common::crd::TrainingJob;
use titan_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use titan_common::{
    DEFAULT_NAMESPACE, FIELD_MANAGER, MANAGED_BY_LABEL_KEY, MANAGED_BY_LABEL_VALUE,
};
use titan_job::config::{
    DEFAULT_ERROR_REQUEUE_INTERVAL, DEFAULT_MAX_ACTIVE_JOBS, DEFAULT_QUEUE_RECHECK_INTERVAL,
    DEFAULT_STATUS_CONFLICT_ATTEMPTS,
};
use titan_job::{error_policy, reconcile, Context, ControllerConfig};

/// Titan - run training jobs under a cluster-wide concurrency cap
#[derive(Parser, Debug)]
#[command(name = "titan-operator", version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Print the TrainingJob CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Log output format (text or json)
    #[arg(long, global = true, env = "TITAN_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Controller settings used when no subcommand is given
    #[command(flatten)]
    controller: ControllerArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the TrainingJob controller (default mode)
    ///
    /// Watches TrainingJobs and their Pods, admits jobs up to the configured
    /// cap, and mirrors Pod phases into job status.
    Controller(ControllerArgs),

    /// Run the job submission HTTP API
    Api(ApiArgs),
}

#[derive(Args, Debug, Clone)]
struct ControllerArgs {
    /// Maximum number of jobs in Pending or Running at once
    #[arg(long, env = "TITAN_MAX_ACTIVE_JOBS", default_value_t = DEFAULT_MAX_ACTIVE_JOBS)]
    max_active_jobs: usize,

    /// Seconds before a queued job is checked again
    #[arg(long, env = "TITAN_QUEUE_RECHECK_SECS", default_value_t = DEFAULT_QUEUE_RECHECK_INTERVAL.as_secs())]
    queue_recheck_secs: u64,

    /// Seconds before a failed reconcile is retried
    #[arg(long, env = "TITAN_ERROR_REQUEUE_SECS", default_value_t = DEFAULT_ERROR_REQUEUE_INTERVAL.as_secs())]
    error_requeue_secs: u64,

    /// Only manage jobs in this namespace (default: all namespaces)
    #[arg(long, env = "TITAN_WATCH_NAMESPACE")]
    watch_namespace: Option<String>,

    /// Extended resource used to request GPUs on job Pods (e.g. nvidia.com/gpu)
    #[arg(long, env = "TITAN_GPU_RESOURCE")]
    gpu_resource: Option<String>,

    /// Attempts for a status write that keeps hitting version conflicts
    #[arg(long, env = "TITAN_STATUS_CONFLICT_ATTEMPTS", default_value_t = DEFAULT_STATUS_CONFLICT_ATTEMPTS)]
    status_conflict_attempts: u32,
}

impl ControllerArgs {
    fn into_config(self) -> ControllerConfig {
        let mut config = ControllerConfig {
            max_active_jobs: self.max_active_jobs,
            queue_recheck_interval: Duration::from_secs(self.queue_recheck_secs),
            error_requeue_interval: Duration::from_secs(self.error_requeue_secs),
            watch_namespace: self.watch_namespace,
            gpu_resource: self.gpu_resource,
            ..Default::default()
        };
        config.status_retry.max_attempts = self.status_conflict_attempts;
        config
    }
}

#[derive(Args, Debug, Clone)]
struct ApiArgs {
    /// Address to listen on
    #[arg(long, env = "TITAN_API_ADDR", default_value = "0.0.0.0:8000")]
    addr: SocketAddr,

    /// Namespace jobs are submitted to and listed from
    #[arg(long, env = "TITAN_API_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    namespace: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&TrainingJob::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    init_telemetry(TelemetryConfig {
        format: cli.log_format,
        ..Default::default()
    })?;

    match cli.command {
        Some(Commands::Api(args)) => run_api(args).await,
        Some(Commands::Controller(args)) => run_controller(args).await,
        None => run_controller(cli.controller).await,
    }
}

/// Install or update the TrainingJob CRD
///
/// Server-side apply keeps the installed schema in step with the operator
/// version.
async fn ensure_crd_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    info!("Installing TrainingJob CRD...");
    crds.patch(
        TrainingJob::crd_name(),
        &params,
        &Patch::Apply(&TrainingJob::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install TrainingJob CRD: {}", e))?;

    Ok(())
}

async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    let config = args.into_config();
    config.validate()?;

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crd_installed(&client).await?;

    let (jobs, pods): (Api<TrainingJob>, Api<Pod>) = match &config.watch_namespace {
        Some(ns) => (
            Api::namespaced(client.clone(), ns),
            Api::namespaced(client.clone(), ns),
        ),
        None => (Api::all(client.clone()), Api::all(client.clone())),
    };
    let owned_pods = WatcherConfig::default()
        .labels(&format!("{MANAGED_BY_LABEL_KEY}={MANAGED_BY_LABEL_VALUE}"));

    info!(
        max_active_jobs = config.max_active_jobs,
        queue_recheck_secs = config.queue_recheck_interval.as_secs(),
        namespace = config.watch_namespace.as_deref().unwrap_or("*"),
        "Starting TrainingJob controller"
    );

    let ctx = Arc::new(Context::new(client, config));

    Controller::new(jobs, WatcherConfig::default())
        .owns(pods, owned_pods)
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "TrainingJob reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "TrainingJob reconciliation error");
                }
            }
        })
        .await;

    info!("TrainingJob controller stopped");
    Ok(())
}

async fn run_api(args: ApiArgs) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let catalog = Arc::new(KubeJobCatalog::new(client, &args.namespace));
    start_server(
        ServerConfig {
            addr: args.addr,
            namespace: args.namespace,
        },
        catalog,
    )
    .await?;

    Ok(())
}
