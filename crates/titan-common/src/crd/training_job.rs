//! TrainingJob CRD types
//!
//! A `TrainingJob` asks for exactly one execution unit (a Pod) running the
//! declared image. The controller gates Pod creation behind a cluster-wide
//! concurrency cap and mirrors the Pod phase back into `status.state`.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::Condition;

/// Condition type tracking whether the job has been given an execution unit
pub const CONDITION_SCHEDULED: &str = "Scheduled";

// =============================================================================
// State
// =============================================================================

/// Reported state of a TrainingJob
///
/// `Queued` is the only state the controller decides on its own. Every other
/// non-empty value is the phase of the job's Pod, copied verbatim.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum JobState {
    /// No state reported yet (new job, or Pod without a phase)
    #[default]
    #[serde(rename = "")]
    Unset,
    /// Waiting for a free slot under the concurrency cap
    Queued,
    /// Pod accepted but not all containers are running
    Pending,
    /// Pod bound and at least one container running
    Running,
    /// All containers terminated successfully
    Succeeded,
    /// All containers terminated, at least one in failure
    Failed,
    /// Pod phase could not be determined
    #[serde(other)]
    Unknown,
}

impl JobState {
    /// Map a Pod phase to the job state it mirrors
    pub fn from_pod_phase(phase: Option<&str>) -> Self {
        match phase {
            None | Some("") => Self::Unset,
            Some("Pending") => Self::Pending,
            Some("Running") => Self::Running,
            Some("Succeeded") => Self::Succeeded,
            Some("Failed") => Self::Failed,
            Some(_) => Self::Unknown,
        }
    }

    /// Whether this state occupies a slot under the concurrency cap
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Whether this state was copied from an observed Pod phase
    pub fn is_unit_phase(&self) -> bool {
        !matches!(self, Self::Unset | Self::Queued)
    }

    /// Whether no state has been reported
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Wire representation of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Queued => "Queued",
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Key
// =============================================================================

/// Namespaced name shared by a TrainingJob and its Pod
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobKey {
    /// Namespace of the job
    pub namespace: String,
    /// Name of the job
    pub name: String,
}

impl JobKey {
    /// Create a key from namespace and name
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an existing job, if it carries a namespace
    pub fn from_job(job: &TrainingJob) -> Option<Self> {
        job.namespace().map(|ns| Self::new(ns, job.name_any()))
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// =============================================================================
// CRD
// =============================================================================

fn default_gpu_count() -> u32 {
    1
}

/// A single-Pod training workload admitted under a cluster-wide concurrency cap
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "batch.titan.dev",
    version = "v1",
    kind = "TrainingJob",
    plural = "trainingjobs",
    shortname = "tj",
    namespaced,
    status = "TrainingJobStatus",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state","description":"The current state of the job"}"#,
    printcolumn = r#"{"name":"GPUs","type":"integer","jsonPath":".spec.gpuCount"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TrainingJobSpec {
    /// Container image running the workload
    pub image: String,

    /// Number of GPUs the job needs (not consulted by admission)
    #[serde(default = "default_gpu_count")]
    #[schemars(range(min = 1))]
    pub gpu_count: u32,

    /// Scheduling priority (not consulted by admission)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,

    /// Command overriding the image entrypoint
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
}

impl TrainingJobSpec {
    /// Create a spec running `image` on `gpu_count` GPUs
    pub fn new(image: impl Into<String>, gpu_count: u32) -> Self {
        Self {
            image: image.into(),
            gpu_count,
            priority: None,
            command: Vec::new(),
        }
    }

    /// Validate the spec
    ///
    /// `job` is only used to give the error context.
    pub fn validate(&self, job: &str) -> Result<(), crate::Error> {
        if self.image.trim().is_empty() {
            return Err(crate::Error::validation_for_field(
                job,
                "spec.image",
                "image must not be empty",
            ));
        }
        if self.gpu_count < 1 {
            return Err(crate::Error::validation_for_field(
                job,
                "spec.gpuCount",
                "gpuCount must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Status of a TrainingJob
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrainingJobStatus {
    /// Current state of the job
    #[serde(default, skip_serializing_if = "JobState::is_unset")]
    pub state: JobState,

    /// Conditions describing scheduling progress
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl TrainingJob {
    /// Reported state, `Unset` when the job has no status yet
    pub fn state(&self) -> JobState {
        self.status.as_ref().map(|s| s.state).unwrap_or_default()
    }

    /// Whether the job is being deleted
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}

// =============================================================================
// Tests
// =============================================================================
