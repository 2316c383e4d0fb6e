//! TrainingJob controller
//!
//! Reconciles `TrainingJob` resources into single-Pod workloads:
//! - Admission control against a cluster-wide cap on active jobs
//! - Pod construction with an owner reference back to the job
//! - Pod phase mirrored into `status.state`, retried on version conflicts

pub mod admission;
pub mod config;
pub mod controller;
pub mod error;
pub mod pod;
pub mod status;
pub mod store;

pub use config::ControllerConfig;
pub use controller::{error_policy, reconcile, reconcile_key, Context, ReconcileOutcome};
pub use error::JobError;
pub use store::{CreateOutcome, JobStore, KubeJobStore, UpdateOutcome};
