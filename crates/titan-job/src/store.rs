//! Object store access for the TrainingJob controller
//!
//! The reconciler only talks to the API server through [`JobStore`], so the
//! admission and status logic can be driven by mocks or an in-memory store
//! in tests. [`KubeJobStore`] is the production implementation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use titan_common::crd::{JobKey, TrainingJob};
use titan_common::error::{is_conflict, is_not_found};
use titan_common::FIELD_MANAGER;

use crate::error::JobError;

/// Result of asking the store to create an execution unit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The Pod was created
    Created,
    /// A Pod with the same name already exists
    AlreadyExists,
}

/// Result of a conditional status write
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The status was written
    Updated,
    /// The job changed since it was read; re-fetch and try again
    Conflict,
    /// The job no longer exists
    NotFound,
}

/// Trait abstracting the object store operations the reconciler needs
///
/// Not-found lookups are `Ok(None)`; every other failure is an `Err` and
/// aborts the reconcile pass.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Get a TrainingJob by key
    async fn get_job(&self, key: &JobKey) -> Result<Option<TrainingJob>, JobError>;

    /// List every TrainingJob in the controller's scope
    async fn list_jobs(&self) -> Result<Vec<TrainingJob>, JobError>;

    /// Get the Pod sharing the job's key
    async fn get_pod(&self, key: &JobKey) -> Result<Option<Pod>, JobError>;

    /// Create a Pod
    async fn create_pod(&self, pod: &Pod) -> Result<CreateOutcome, JobError>;

    /// Write `job.status`, conditional on `job.metadata.resourceVersion`
    async fn replace_job_status(&self, job: &TrainingJob) -> Result<UpdateOutcome, JobError>;
}

/// Real Kubernetes implementation of [`JobStore`]
pub struct KubeJobStore {
    client: Client,
    namespace: Option<String>,
}

impl KubeJobStore {
    /// Create a store scoped to `namespace`, or cluster-wide when None
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self { client, namespace }
    }

    fn jobs_in(&self, namespace: &str) -> Api<TrainingJob> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Merge-patch body writing `job.status`
///
/// An explicit null clears the state. Carrying the resourceVersion makes the
/// API server reject stale writes with 409.
fn status_patch(job: &TrainingJob) -> serde_json::Value {
    let status = job.status.clone().unwrap_or_default();
    let state = if status.state.is_unset() {
        serde_json::Value::Null
    } else {
        serde_json::Value::String(status.state.as_str().to_string())
    };
    serde_json::json!({
        "metadata": { "resourceVersion": job.metadata.resource_version },
        "status": {
            "state": state,
            "conditions": status.conditions,
        }
    })
}

#[async_trait]
impl JobStore for KubeJobStore {
    async fn get_job(&self, key: &JobKey) -> Result<Option<TrainingJob>, JobError> {
        Ok(self.jobs_in(&key.namespace).get_opt(&key.name).await?)
    }

    async fn list_jobs(&self) -> Result<Vec<TrainingJob>, JobError> {
        let api: Api<TrainingJob> = match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_pod(&self, key: &JobKey) -> Result<Option<Pod>, JobError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &key.namespace);
        Ok(api.get_opt(&key.name).await?)
    }

    async fn create_pod(&self, pod: &Pod) -> Result<CreateOutcome, JobError> {
        let namespace = pod.namespace().ok_or(JobError::MissingNamespace)?;
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };

        match api.create(&params, pod).await {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(e) if is_conflict(&e) => {
                debug!(pod = %pod.name_any(), namespace = %namespace, "pod already exists");
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn replace_job_status(&self, job: &TrainingJob) -> Result<UpdateOutcome, JobError> {
        let namespace = job.namespace().ok_or(JobError::MissingNamespace)?;
        let name = job.name_any();
        let patch = status_patch(job);

        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        match self
            .jobs_in(&namespace)
            .patch_status(&name, &params, &Patch::Merge(&patch))
            .await
        {
            Ok(_) => Ok(UpdateOutcome::Updated),
            Err(e) if is_conflict(&e) => Ok(UpdateOutcome::Conflict),
            Err(e) if is_not_found(&e) => Ok(UpdateOutcome::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use titan_common::crd::{
        Condition, ConditionStatus, JobState, TrainingJobSpec, TrainingJobStatus,
        CONDITION_SCHEDULED,
    };

    fn job_at_version(version: &str, status: Option<TrainingJobStatus>) -> TrainingJob {
        let mut job = TrainingJob::new("bert-large", TrainingJobSpec::new("pytorch:2.3", 1));
        job.metadata.namespace = Some("default".to_string());
        job.metadata.resource_version = Some(version.to_string());
        job.status = status;
        job
    }

    #[test]
    fn status_patch_carries_resource_version() {
        let job = job_at_version(
            "42",
            Some(TrainingJobStatus {
                state: JobState::Running,
                conditions: Vec::new(),
            }),
        );

        let patch = status_patch(&job);
        assert_eq!(patch["metadata"]["resourceVersion"], "42");
        assert_eq!(patch["status"]["state"], "Running");
    }

    #[test]
    fn status_patch_clears_unset_state_with_null() {
        let condition = Condition::new(
            CONDITION_SCHEDULED,
            ConditionStatus::False,
            "InvalidSpec",
            "gpuCount must be at least 1",
        );
        let job = job_at_version(
            "7",
            Some(TrainingJobStatus {
                state: JobState::Unset,
                conditions: vec![condition],
            }),
        );

        let patch = status_patch(&job);
        let status = patch["status"].as_object().unwrap();
        assert!(status.contains_key("state"));
        assert!(status["state"].is_null());
        assert_eq!(status["conditions"][0]["reason"], "InvalidSpec");
        assert_eq!(patch["metadata"]["resourceVersion"], "7");
    }

    #[test]
    fn status_patch_for_job_without_status() {
        let patch = status_patch(&job_at_version("3", None));
        assert!(patch["status"]["state"].is_null());
        assert_eq!(patch["status"]["conditions"], serde_json::json!([]));
        assert_eq!(patch["metadata"]["resourceVersion"], "3");
    }
}
