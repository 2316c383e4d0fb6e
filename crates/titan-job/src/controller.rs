//! Reconcile entry point for the TrainingJob controller
//!
//! Each pass looks at one job and its Pod:
//! - Pod present: mirror its phase into `status.state`
//! - Pod absent: ask the admission gate, then either create the Pod or mark
//!   the job Queued and check again after the recheck interval
//!
//! Passes only ever create Pods and write job status. Pods are removed by the
//! API server's garbage collector through their owner reference.

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use titan_common::crd::{JobKey, TrainingJob};

use crate::admission::{AdmissionController, AdmissionDecision};
use crate::config::ControllerConfig;
use crate::error::JobError;
use crate::pod::build_pod;
use crate::status::{observed_state, sync_status, StatusTarget, SyncOutcome};
use crate::store::{CreateOutcome, JobStore, KubeJobStore};

/// Shared state for all reconcile passes
pub struct Context {
    /// Object store access (trait object for testability)
    pub store: Arc<dyn JobStore>,
    /// Admission gate shared by every pass in this process
    pub admission: AdmissionController,
    /// Controller configuration
    pub config: ControllerConfig,
}

impl Context {
    /// Create a context backed by the Kubernetes API
    pub fn new(client: Client, config: ControllerConfig) -> Self {
        let store = KubeJobStore::new(client, config.watch_namespace.clone());
        Self::with_store(Arc::new(store), config)
    }

    /// Create a context over any [`JobStore`]
    pub fn with_store(store: Arc<dyn JobStore>, config: ControllerConfig) -> Self {
        Self {
            store,
            admission: AdmissionController::new(config.max_active_jobs),
            config,
        }
    }
}

/// What the dispatcher should do after a pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Wait for the next change to the job or its Pod
    Done,
    /// Run the pass again after the delay
    RequeueAfter(Duration),
}

impl ReconcileOutcome {
    /// Convert into a kube-runtime action
    pub fn into_action(self) -> Action {
        match self {
            Self::Done => Action::await_change(),
            Self::RequeueAfter(delay) => Action::requeue(delay),
        }
    }
}

/// Reconcile a TrainingJob
#[instrument(skip(job, ctx), fields(job = %job.name_any(), namespace = %job.namespace().unwrap_or_default()))]
pub async fn reconcile(job: Arc<TrainingJob>, ctx: Arc<Context>) -> Result<Action, JobError> {
    let key = JobKey::from_job(&job).ok_or(JobError::MissingNamespace)?;
    Ok(reconcile_key(&key, &ctx).await?.into_action())
}

/// Run one pass for the job at `key`.
///
/// The job is always re-read from the store, so the caller's copy may be
/// stale or the job may already be gone.
pub async fn reconcile_key(key: &JobKey, ctx: &Context) -> Result<ReconcileOutcome, JobError> {
    let store = ctx.store.as_ref();

    let Some(job) = store.get_job(key).await? else {
        debug!(job = %key, "job no longer exists");
        return Ok(ReconcileOutcome::Done);
    };

    if let Some(pod) = store.get_pod(key).await? {
        let state = observed_state(&pod);
        let outcome = sync_status(
            store,
            &ctx.config.status_retry,
            &job,
            &StatusTarget::mirror(state),
        )
        .await?;
        if state.is_unit_phase() || outcome == SyncOutcome::JobGone {
            ctx.admission.release(key).await;
        }
        return Ok(ReconcileOutcome::Done);
    }

    if job.is_deleting() {
        debug!(job = %key, "job is being deleted, not admitting");
        return Ok(ReconcileOutcome::Done);
    }

    if let Err(e) = job.spec.validate(&key.name) {
        warn!(job = %key, error = %e, "invalid job spec, not admitting");
        sync_status(
            store,
            &ctx.config.status_retry,
            &job,
            &StatusTarget::invalid_spec(e.to_string()),
        )
        .await?;
        return Ok(ReconcileOutcome::Done);
    }

    match ctx.admission.admit(store, key).await? {
        AdmissionDecision::Deny { active } => {
            let max_active = ctx.admission.max_active();
            let outcome = sync_status(
                store,
                &ctx.config.status_retry,
                &job,
                &StatusTarget::queued(max_active),
            )
            .await?;
            if outcome == SyncOutcome::Updated {
                info!(job = %key, active, max_active, "capacity reached, job queued");
            } else {
                debug!(job = %key, active, max_active, "still queued");
            }
            Ok(ReconcileOutcome::RequeueAfter(
                ctx.config.queue_recheck_interval,
            ))
        }
        AdmissionDecision::Admit(permit) => {
            let pod = build_pod(&job, ctx.config.gpu_resource.as_deref())?;
            match store.create_pod(&pod).await? {
                CreateOutcome::Created => {
                    info!(job = %key, image = %job.spec.image, "pod created")
                }
                CreateOutcome::AlreadyExists => debug!(job = %key, "pod already exists"),
            }
            permit.commit();
            Ok(ReconcileOutcome::Done)
        }
    }
}

/// Error policy for the controller
pub fn error_policy(job: Arc<TrainingJob>, error: &JobError, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        job = %job.name_any(),
        namespace = %job.namespace().unwrap_or_default(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );
    Action::requeue(ctx.config.error_requeue_interval)
}
