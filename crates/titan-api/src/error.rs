//! Error types for the submission API

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result type for API operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for API operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request rejected before reaching the cluster
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A job with the generated name already exists
    #[error("job already exists: {0}")]
    AlreadyExists(String),

    /// Kubernetes API call failed
    #[error("kubernetes error: {0}")]
    Kube(#[source] kube::Error),

    /// Server could not start or stopped unexpectedly
    #[error("server error: {0}")]
    Server(String),
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::AlreadyExists(_) => StatusCode::CONFLICT,
            Error::Kube(_) | Error::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        // Return K8s-style Status response
        let body = serde_json::json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": self.to_string(),
            "code": status.as_u16()
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self {
        Error::Kube(e)
    }
}

impl From<titan_common::Error> for Error {
    fn from(e: titan_common::Error) -> Self {
        match e {
            titan_common::Error::Validation { message, .. } => Error::InvalidRequest(message),
            titan_common::Error::Kube { source } => Error::Kube(source),
            other => Error::Server(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(error: Error) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn invalid_request_is_bad_request_status() {
        let (status, body) = body_json(Error::InvalidRequest("image must not be empty".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "Status");
        assert_eq!(body["code"], 400);
        assert_eq!(body["message"], "invalid request: image must not be empty");
    }

    #[tokio::test]
    async fn kube_failure_is_internal_error() {
        let err = kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "etcdserver: request timed out".to_string(),
            reason: "InternalError".to_string(),
            code: 500,
        });
        let (status, body) = body_json(Error::from(err)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "Failure");
    }

    #[test]
    fn validation_error_maps_to_invalid_request() {
        let err = Error::from(titan_common::Error::validation_for_field(
            "training-job-abc123",
            "spec.gpuCount",
            "gpuCount must be at least 1",
        ));
        assert!(matches!(err, Error::InvalidRequest(msg) if msg == "gpuCount must be at least 1"));
    }

    #[test]
    fn conflict_maps_to_409() {
        assert_eq!(
            Error::AlreadyExists("training-job-abc123".into()).status_code(),
            StatusCode::CONFLICT
        );
    }
}
