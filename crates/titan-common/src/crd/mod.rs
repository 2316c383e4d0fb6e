//! Custom Resource Definitions for Titan

mod training_job;
mod types;

pub use training_job::{
    JobKey, JobState, TrainingJob, TrainingJobSpec, TrainingJobStatus, CONDITION_SCHEDULED,
};
pub use types::{set_condition, Condition, ConditionStatus};
