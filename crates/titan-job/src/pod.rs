//! Execution unit construction
//!
//! Builds the single Pod that runs a TrainingJob. The Pod shares the job's
//! namespace and name and carries a controller owner reference, so the API
//! server's garbage collector removes it when the job is deleted.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};

use titan_common::crd::TrainingJob;
use titan_common::{JOB_LABEL_KEY, MANAGED_BY_LABEL_KEY, MANAGED_BY_LABEL_VALUE};

use crate::error::JobError;

/// Name of the only container in a job Pod
pub const CONTAINER_NAME: &str = "main";

/// Restart policy for job Pods
const RESTART_POLICY: &str = "OnFailure";

/// Build the Pod for a TrainingJob.
///
/// - One container named `main` running `spec.image`
/// - `spec.command` overrides the entrypoint when non-empty
/// - `gpu_resource` adds a `gpuCount` limit on that extended resource
/// - Controller owner reference back to the job
pub fn build_pod(job: &TrainingJob, gpu_resource: Option<&str>) -> Result<Pod, JobError> {
    let name = job.name_any();
    let namespace = job.namespace().ok_or(JobError::MissingNamespace)?;
    let owner = job
        .controller_owner_ref(&())
        .ok_or_else(|| JobError::MissingUid { job: name.clone() })?;

    let mut labels = BTreeMap::new();
    labels.insert(
        MANAGED_BY_LABEL_KEY.to_string(),
        MANAGED_BY_LABEL_VALUE.to_string(),
    );
    labels.insert(JOB_LABEL_KEY.to_string(), name.clone());

    let command = (!job.spec.command.is_empty()).then(|| job.spec.command.clone());

    let resources = gpu_resource.map(|resource| ResourceRequirements {
        limits: Some(BTreeMap::from([(
            resource.to_string(),
            Quantity(job.spec.gpu_count.to_string()),
        )])),
        ..Default::default()
    });

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(job.spec.image.clone()),
        command,
        resources,
        ..Default::default()
    };

    Ok(Pod {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace),
            labels: Some(labels),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![container],
            restart_policy: Some(RESTART_POLICY.to_string()),
            ..Default::default()
        }),
        status: None,
    })
}
