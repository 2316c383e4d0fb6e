//! Admission control against the active-job cap
//!
//! A job is *active* while its `status.state` is Pending or Running. The
//! active count is recomputed from a fresh listing on every check, so there is
//! no counter to drift out of sync with the cluster.
//!
//! Listing and then creating a Pod is not atomic. Two passes for different
//! jobs could both see `active < cap` and both create. Admissions therefore go
//! through a single gate held from the listing until the create returns, and
//! jobs admitted here whose status has not yet caught up with their Pod are
//! counted as in-flight. The listing stays the source of truth; an in-flight
//! entry is dropped as soon as the listing counts the job as active or the
//! job disappears. A terminal state in the listing may be left over from an
//! earlier Pod, so only a mirror pass releases the entry in that case.

use std::collections::BTreeSet;

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use titan_common::crd::{JobKey, TrainingJob};

use crate::error::JobError;
use crate::store::JobStore;

/// Number of listed jobs occupying a slot
pub fn count_active(jobs: &[TrainingJob]) -> usize {
    jobs.iter().filter(|job| job.state().is_active()).count()
}

/// Outcome of an admission check
pub enum AdmissionDecision<'a> {
    /// A slot is free; the permit holds the gate until committed or dropped
    Admit(AdmissionPermit<'a>),
    /// The cap is reached
    Deny {
        /// Active jobs counted, including in-flight admissions
        active: usize,
    },
}

/// Exclusive right to create one job's Pod
///
/// Dropping the permit without committing releases the gate and records
/// nothing, which is what a failed Pod create needs.
pub struct AdmissionPermit<'a> {
    guard: MutexGuard<'a, BTreeSet<JobKey>>,
    key: JobKey,
}

impl AdmissionPermit<'_> {
    /// Record the job as in-flight and release the gate
    pub fn commit(self) {
        let Self { mut guard, key } = self;
        debug!(job = %key, in_flight = guard.len() + 1, "admission committed");
        guard.insert(key);
    }
}

/// Serializes admission decisions within this process
pub struct AdmissionController {
    max_active: usize,
    in_flight: Mutex<BTreeSet<JobKey>>,
}

impl AdmissionController {
    /// Create a controller admitting at most `max_active` concurrent jobs
    pub fn new(max_active: usize) -> Self {
        Self {
            max_active,
            in_flight: Mutex::new(BTreeSet::new()),
        }
    }

    /// Configured cap
    pub fn max_active(&self) -> usize {
        self.max_active
    }

    /// Decide whether `key` may create its Pod now.
    ///
    /// The gate stays locked for as long as the returned permit lives, so the
    /// caller must create the Pod before dropping or committing it.
    pub async fn admit(
        &self,
        store: &dyn JobStore,
        key: &JobKey,
    ) -> Result<AdmissionDecision<'_>, JobError> {
        let mut in_flight = self.in_flight.lock().await;
        let jobs = store.list_jobs().await?;

        prune(&mut in_flight, &jobs);
        in_flight.remove(key);

        let listed = count_active(&jobs);
        let active = listed + in_flight.len();
        debug!(
            job = %key,
            listed,
            in_flight = in_flight.len(),
            max_active = self.max_active,
            "admission check"
        );

        if active < self.max_active {
            Ok(AdmissionDecision::Admit(AdmissionPermit {
                guard: in_flight,
                key: key.clone(),
            }))
        } else {
            Ok(AdmissionDecision::Deny { active })
        }
    }

    /// Forget an in-flight admission once its status reflects the Pod
    ///
    /// Waits for any admission in progress. Removing an entry while another
    /// pass sits between its listing and its count would let that pass miss
    /// the job in both, so releases are serialized behind the gate.
    pub async fn release(&self, key: &JobKey) {
        if self.in_flight.lock().await.remove(key) {
            debug!(job = %key, "in-flight admission released");
        }
    }

    /// Number of admissions whose status has not caught up yet
    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

/// Drop in-flight entries the listing already counts or no longer holds
fn prune(in_flight: &mut BTreeSet<JobKey>, jobs: &[TrainingJob]) {
    in_flight.retain(|key| {
        jobs.iter()
            .find(|job| JobKey::from_job(job).as_ref() == Some(key))
            .is_some_and(|job| !job.state().is_active())
    });
}
