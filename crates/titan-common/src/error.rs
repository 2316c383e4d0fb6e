//! Error types shared across Titan crates
//!
//! Errors carry enough context (job name, field path) to be useful in a
//! structured log line without the caller re-wrapping them.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for Titan operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Validation error for a TrainingJob spec
    #[error("validation error for {job}: {message}")]
    Validation {
        /// Name of the job with invalid configuration
        job: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.gpuCount")
        field: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "store", "telemetry")
        context: String,
    },
}

impl Error {
    /// Create a validation error without job context
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            job: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with job context and field path
    pub fn validation_for_field(
        job: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            job: job.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Validation errors need a spec change, not a retry.
    /// Kubernetes errors are retryable unless the API rejected the request
    /// with a 4xx other than 409 (conflict) or 429 (throttled).
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => is_retryable_kube_error(source),
            Error::Validation { .. } => false,
            Error::Internal { .. } => true,
        }
    }
}

/// Whether a raw kube error is worth retrying
pub fn is_retryable_kube_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(ae) => {
            !(400..500).contains(&ae.code) || ae.code == 409 || ae.code == 429
        }
        _ => true,
    }
}

/// Whether a raw kube error is a 404 Not Found
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

/// Whether a raw kube error is a 409 Conflict (stale resourceVersion or AlreadyExists)
pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 409)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{reason} error"),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn validation_errors_need_a_spec_change() {
        let err = Error::validation_for_field("bert-large", "spec.gpuCount", "must be at least 1");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("bert-large"));
        assert!(err.to_string().contains("must be at least 1"));
    }

    #[test]
    fn validation_without_context_uses_unknown() {
        let err = Error::validation("bad input");
        assert!(matches!(err, Error::Validation { job, field: None, .. } if job == UNKNOWN_CONTEXT));
    }

    #[test]
    fn server_side_kube_errors_are_retryable() {
        let err: Error = api_error(503, "ServiceUnavailable").into();
        assert!(err.is_retryable());
    }

    #[test]
    fn conflicts_and_throttling_are_retryable() {
        assert!(is_retryable_kube_error(&api_error(409, "Conflict")));
        assert!(is_retryable_kube_error(&api_error(429, "TooManyRequests")));
    }

    #[test]
    fn client_side_rejections_are_not_retryable() {
        let err: Error = api_error(422, "Invalid").into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn status_code_helpers() {
        assert!(is_not_found(&api_error(404, "NotFound")));
        assert!(!is_not_found(&api_error(409, "Conflict")));
        assert!(is_conflict(&api_error(409, "AlreadyExists")));
        assert!(!is_conflict(&api_error(500, "InternalError")));
    }

    #[test]
    fn internal_errors_are_retryable() {
        let internal = Error::internal_with_context("telemetry", "subscriber already set");
        assert!(internal.is_retryable());
        assert!(internal.to_string().contains("[telemetry]"));
    }
}
