//! Submission API server

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use titan_common::crd::{JobState, TrainingJob, TrainingJobSpec};
use titan_common::DEFAULT_NAMESPACE;

use crate::catalog::JobCatalog;
use crate::error::Error;

/// Prefix of generated job names
pub const JOB_NAME_PREFIX: &str = "training-job-";

/// Status reported for every newly submitted job
const SUBMITTED_STATUS: &str = "Queued/Pending";

/// Status reported for jobs the controller has not touched yet
const UNKNOWN_STATUS: &str = "Unknown";

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind the server
    pub addr: SocketAddr,
    /// Namespace jobs are created in and listed from
    pub namespace: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

/// Shared state for handlers
#[derive(Clone)]
pub struct AppState {
    /// Job storage
    pub catalog: Arc<dyn JobCatalog>,
    /// Namespace new jobs are created in
    pub namespace: String,
}

/// Body of `POST /jobs`
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobRequest {
    /// Container image running the workload
    pub image: String,
    /// Number of GPUs requested
    #[serde(alias = "gpu_count", default = "default_gpu_count")]
    pub gpu_count: u32,
    /// Scheduling priority
    #[serde(default)]
    pub priority: Option<i32>,
    /// Command overriding the image entrypoint
    #[serde(default)]
    pub command: Vec<String>,
}

fn default_gpu_count() -> u32 {
    1
}

impl SubmitJobRequest {
    fn into_spec(self) -> TrainingJobSpec {
        TrainingJobSpec {
            image: self.image,
            gpu_count: self.gpu_count,
            priority: self.priority,
            command: self.command,
        }
    }
}

/// Response of `POST /jobs`
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SubmitJobResponse {
    /// Human-readable outcome
    pub message: String,
    /// Generated job name
    pub name: String,
    /// Initial status hint
    pub status: String,
}

/// One entry of `GET /jobs`
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct JobSummary {
    /// Job name
    pub name: String,
    /// Reported state, or `Unknown` before the controller has written one
    pub status: String,
    /// Container image
    pub image: String,
}

impl From<&TrainingJob> for JobSummary {
    fn from(job: &TrainingJob) -> Self {
        let status = match job.state() {
            JobState::Unset => UNKNOWN_STATUS.to_string(),
            state => state.to_string(),
        };
        Self {
            name: job.metadata.name.clone().unwrap_or_default(),
            status,
            image: job.spec.image.clone(),
        }
    }
}

/// Generate a job name: the prefix plus six hex characters
pub fn generate_job_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{JOB_NAME_PREFIX}{}", &id[..6])
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/jobs", get(list_jobs).post(submit_job))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

/// Handle `POST /jobs`
async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), Error> {
    let name = generate_job_name();
    let spec = request.into_spec();
    spec.validate(&name)?;

    let mut job = TrainingJob::new(&name, spec);
    job.metadata.namespace = Some(state.namespace.clone());
    state.catalog.create(&job).await?;

    info!(job = %name, namespace = %state.namespace, image = %job.spec.image, "job submitted");
    Ok((
        StatusCode::CREATED,
        Json(SubmitJobResponse {
            message: "Job submitted successfully".to_string(),
            name,
            status: SUBMITTED_STATUS.to_string(),
        }),
    ))
}

/// Handle `GET /jobs`
async fn list_jobs(State(state): State<AppState>) -> Result<Json<Vec<JobSummary>>, Error> {
    let jobs = state.catalog.list().await?;
    Ok(Json(jobs.iter().map(JobSummary::from).collect()))
}

/// Start the API server and serve until Ctrl-C
pub async fn start_server(config: ServerConfig, catalog: Arc<dyn JobCatalog>) -> Result<(), Error> {
    let app = router(AppState {
        catalog,
        namespace: config.namespace.clone(),
    });

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(|e| Error::Server(format!("failed to bind {}: {}", config.addr, e)))?;

    info!(addr = %config.addr, namespace = %config.namespace, "Starting job API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_on(tokio::signal::ctrl_c()))
        .await
        .map_err(|e| Error::Server(e.to_string()))
}

/// Resolve once `signal` fires
///
/// A handler that fails to install never fires, so the server keeps serving
/// instead of shutting down on the spot.
async fn shutdown_on(signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => info!("Shutdown signal received, draining connections"),
        Err(e) => {
            error!(error = %e, "failed to install shutdown signal handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use titan_common::crd::TrainingJobStatus;

    use crate::catalog::MockJobCatalog;

    fn app(catalog: MockJobCatalog) -> Router {
        router(AppState {
            catalog: Arc::new(catalog),
            namespace: "default".to_string(),
        })
    }

    fn post_jobs(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/jobs")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn stored_job(name: &str, image: &str, state: JobState) -> TrainingJob {
        let mut job = TrainingJob::new(name, TrainingJobSpec::new(image, 1));
        if !state.is_unset() {
            job.status = Some(TrainingJobStatus {
                state,
                conditions: Vec::new(),
            });
        }
        job
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn generated_names_have_six_hex_chars() {
        let name = generate_job_name();
        let suffix = name.strip_prefix(JOB_NAME_PREFIX).unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_job_name(), generate_job_name());
    }

    #[tokio::test]
    async fn submit_creates_job_in_configured_namespace() {
        let mut catalog = MockJobCatalog::new();
        catalog
            .expect_create()
            .withf(|job| {
                job.metadata.namespace.as_deref() == Some("default")
                    && job.spec.image == "pytorch:2.3"
                    && job.spec.gpu_count == 2
                    && job.spec.priority == Some(5)
            })
            .times(1)
            .returning(|job| Ok(job.clone()));

        let response = app(catalog)
            .oneshot(post_jobs(serde_json::json!({
                "image": "pytorch:2.3",
                "gpuCount": 2,
                "priority": 5
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body: SubmitJobResponse = read_json(response).await;
        assert_eq!(body.status, "Queued/Pending");
        assert_eq!(body.message, "Job submitted successfully");
        assert!(body.name.starts_with(JOB_NAME_PREFIX));
    }

    #[tokio::test]
    async fn submit_accepts_snake_case_gpu_count() {
        let mut catalog = MockJobCatalog::new();
        catalog
            .expect_create()
            .withf(|job| job.spec.gpu_count == 4)
            .returning(|job| Ok(job.clone()));

        let response = app(catalog)
            .oneshot(post_jobs(serde_json::json!({
                "image": "pytorch:2.3",
                "gpu_count": 4,
                "priority": 1
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn submit_rejects_invalid_spec_without_creating() {
        let mut catalog = MockJobCatalog::new();
        catalog.expect_create().never();

        let response = app(catalog)
            .oneshot(post_jobs(serde_json::json!({ "image": "pytorch:2.3", "gpuCount": 0 })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = read_json(response).await;
        assert_eq!(body["kind"], "Status");
    }

    #[tokio::test]
    async fn submit_surfaces_store_failure_as_500() {
        let mut catalog = MockJobCatalog::new();
        catalog
            .expect_create()
            .returning(|_| Err(Error::Server("connection refused".into())));

        let response = app(catalog)
            .oneshot(post_jobs(serde_json::json!({ "image": "pytorch:2.3", "gpuCount": 1 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn list_reports_state_or_unknown() {
        let mut catalog = MockJobCatalog::new();
        catalog.expect_list().returning(|| {
            Ok(vec![
                stored_job("training-job-aaaaaa", "pytorch:2.3", JobState::Running),
                stored_job("training-job-bbbbbb", "jax:0.4", JobState::Queued),
                stored_job("training-job-cccccc", "tf:2.16", JobState::Unset),
            ])
        });

        let response = app(catalog)
            .oneshot(Request::builder().uri("/jobs").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let jobs: Vec<JobSummary> = read_json(response).await;
        assert_eq!(
            jobs,
            vec![
                JobSummary {
                    name: "training-job-aaaaaa".into(),
                    status: "Running".into(),
                    image: "pytorch:2.3".into(),
                },
                JobSummary {
                    name: "training-job-bbbbbb".into(),
                    status: "Queued".into(),
                    image: "jax:0.4".into(),
                },
                JobSummary {
                    name: "training-job-cccccc".into(),
                    status: "Unknown".into(),
                    image: "tf:2.16".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn shutdown_follows_signal() {
        let fired = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            shutdown_on(async { Ok(()) }),
        )
        .await;
        assert!(fired.is_ok());
    }

    #[tokio::test]
    async fn failed_signal_handler_keeps_serving() {
        let fired = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            shutdown_on(async { Err(std::io::Error::other("signal driver unavailable")) }),
        )
        .await;
        assert!(fired.is_err());
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let response = app(MockJobCatalog::new())
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
