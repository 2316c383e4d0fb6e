//! Controller error types

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    #[error("{0}")]
    Common(#[from] titan_common::Error),

    #[error("status update for {job} conflicted with a concurrent write")]
    Conflict { job: String },

    #[error("missing namespace on TrainingJob")]
    MissingNamespace,

    #[error("TrainingJob {job} has no uid; cannot set owner reference")]
    MissingUid { job: String },
}

impl JobError {
    /// Whether the error is a stale-`resourceVersion` rejection
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether another reconcile pass could succeed without a spec change
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Kube(e) => titan_common::error::is_retryable_kube_error(e),
            Self::Common(e) => e.is_retryable(),
            Self::Conflict { .. } => true,
            Self::MissingNamespace | Self::MissingUid { .. } => false,
        }
    }
}
