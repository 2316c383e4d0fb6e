//! Status synchronization
//!
//! Every status write goes through [`sync_status`]: compute the desired
//! status from the freshest copy of the job, skip the write when nothing
//! changed, and on a version conflict re-fetch and try again.

use k8s_openapi::api::core::v1::Pod;
use tracing::{debug, info};

use titan_common::crd::{
    set_condition, Condition, ConditionStatus, JobKey, JobState, TrainingJob, TrainingJobStatus,
    CONDITION_SCHEDULED,
};
use titan_common::retry::{retry_with_backoff, RetryConfig};

use crate::error::JobError;
use crate::store::{JobStore, UpdateOutcome};

/// Reason on `Scheduled=True` once the job has a Pod
pub const REASON_UNIT_CREATED: &str = "UnitCreated";
/// Reason on `Scheduled=False` while the cap is reached
pub const REASON_CAPACITY_EXHAUSTED: &str = "CapacityExhausted";
/// Reason on `Scheduled=False` for a spec that cannot be run
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";

/// The job state reported by a Pod
pub fn observed_state(pod: &Pod) -> JobState {
    JobState::from_pod_phase(pod.status.as_ref().and_then(|s| s.phase.as_deref()))
}

/// Desired status, applied on top of whatever the job currently reports
#[derive(Clone, Debug)]
pub struct StatusTarget {
    state: Option<JobState>,
    condition: Condition,
}

impl StatusTarget {
    /// Mirror the Pod's phase
    pub fn mirror(state: JobState) -> Self {
        Self {
            state: Some(state),
            condition: Condition::new(
                CONDITION_SCHEDULED,
                ConditionStatus::True,
                REASON_UNIT_CREATED,
                "execution unit created",
            ),
        }
    }

    /// Waiting for a free slot
    pub fn queued(max_active: usize) -> Self {
        Self {
            state: Some(JobState::Queued),
            condition: Condition::new(
                CONDITION_SCHEDULED,
                ConditionStatus::False,
                REASON_CAPACITY_EXHAUSTED,
                format!("waiting for one of {max_active} execution slots"),
            ),
        }
    }

    /// Spec rejected; state is left as it is
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self {
            state: None,
            condition: Condition::new(
                CONDITION_SCHEDULED,
                ConditionStatus::False,
                REASON_INVALID_SPEC,
                message,
            ),
        }
    }

    /// State this target writes, if any
    pub fn state(&self) -> Option<JobState> {
        self.state
    }

    /// Status to write for `job`, or None when it already matches
    pub fn apply(&self, job: &TrainingJob) -> Option<TrainingJobStatus> {
        let mut status = job.status.clone().unwrap_or_default();
        let mut changed = false;

        if let Some(state) = self.state {
            if status.state != state {
                status.state = state;
                changed = true;
            }
        }
        changed |= set_condition(&mut status.conditions, self.condition.clone());

        changed.then_some(status)
    }
}

/// Result of a status sync
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The job already reported the target status
    Unchanged,
    /// The status was written
    Updated,
    /// The job was deleted before the write landed
    JobGone,
}

/// Bring the job's status to `target`.
///
/// The first attempt uses `job` as read by the caller. Conflicting writes are
/// retried against a fresh copy until `retry` runs out, at which point the
/// conflict is returned so the pass is requeued.
pub async fn sync_status(
    store: &dyn JobStore,
    retry: &RetryConfig,
    job: &TrainingJob,
    target: &StatusTarget,
) -> Result<SyncOutcome, JobError> {
    let key = JobKey::from_job(job).ok_or(JobError::MissingNamespace)?;
    let key = &key;
    let mut seed = Some(job.clone());

    retry_with_backoff(retry, "status update", JobError::is_conflict, || {
        let seed = seed.take();
        async move {
            let current = match seed {
                Some(job) => job,
                None => match store.get_job(key).await? {
                    Some(job) => job,
                    None => return Ok(SyncOutcome::JobGone),
                },
            };

            let Some(status) = target.apply(&current) else {
                return Ok(SyncOutcome::Unchanged);
            };
            let from = current.state();
            let mut updated = current;
            updated.status = Some(status);

            match store.replace_job_status(&updated).await? {
                UpdateOutcome::Updated => {
                    info!(job = %key, from = %from, to = %updated.state(), "status updated");
                    Ok(SyncOutcome::Updated)
                }
                UpdateOutcome::NotFound => {
                    debug!(job = %key, "job deleted before status update");
                    Ok(SyncOutcome::JobGone)
                }
                UpdateOutcome::Conflict => Err(JobError::Conflict {
                    job: key.to_string(),
                }),
            }
        }
    })
    .await
}
