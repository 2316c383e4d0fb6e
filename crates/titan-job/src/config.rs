//! Controller configuration

use std::time::Duration;

use titan_common::retry::RetryConfig;
use titan_common::Error;

/// Default cap on jobs in Pending or Running state
pub const DEFAULT_MAX_ACTIVE_JOBS: usize = 2;

/// Default delay before a queued job is checked again
pub const DEFAULT_QUEUE_RECHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Default delay before a failed reconcile is retried
pub const DEFAULT_ERROR_REQUEUE_INTERVAL: Duration = Duration::from_secs(15);

/// Default number of attempts for a status write that keeps conflicting
pub const DEFAULT_STATUS_CONFLICT_ATTEMPTS: u32 = 5;

/// Runtime configuration for the TrainingJob controller
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    /// Maximum number of jobs allowed in Pending or Running at once
    pub max_active_jobs: usize,
    /// Requeue delay for jobs denied admission
    pub queue_recheck_interval: Duration,
    /// Requeue delay after a failed reconcile
    pub error_requeue_interval: Duration,
    /// Restrict the controller to one namespace (None = all namespaces)
    pub watch_namespace: Option<String>,
    /// Extended resource name used to request `gpuCount` GPUs on the Pod
    /// (e.g. `nvidia.com/gpu`). None leaves the Pod without GPU limits.
    pub gpu_resource: Option<String>,
    /// Backoff for status writes rejected with a version conflict
    pub status_retry: RetryConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_active_jobs: DEFAULT_MAX_ACTIVE_JOBS,
            queue_recheck_interval: DEFAULT_QUEUE_RECHECK_INTERVAL,
            error_requeue_interval: DEFAULT_ERROR_REQUEUE_INTERVAL,
            watch_namespace: None,
            gpu_resource: None,
            status_retry: RetryConfig {
                max_attempts: DEFAULT_STATUS_CONFLICT_ATTEMPTS,
                initial_delay: Duration::from_millis(50),
                max_delay: Duration::from_secs(2),
                backoff_multiplier: 2.0,
            },
        }
    }
}

impl ControllerConfig {
    /// Set the concurrency cap
    pub fn with_max_active_jobs(mut self, max: usize) -> Self {
        self.max_active_jobs = max;
        self
    }

    /// Set the queue recheck interval
    pub fn with_queue_recheck_interval(mut self, interval: Duration) -> Self {
        self.queue_recheck_interval = interval;
        self
    }

    /// Set the status conflict retry policy
    pub fn with_status_retry(mut self, retry: RetryConfig) -> Self {
        self.status_retry = retry;
        self
    }

    /// Validate the configuration
    ///
    /// A zero cap would queue every job forever, and an unbounded conflict
    /// retry could pin a worker on one job indefinitely.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_active_jobs == 0 {
            return Err(Error::validation("max_active_jobs must be at least 1"));
        }
        if self.status_retry.max_attempts == 0 {
            return Err(Error::validation(
                "status conflict attempts must be at least 1",
            ));
        }
        if self.queue_recheck_interval.is_zero() {
            return Err(Error::validation(
                "queue recheck interval must be greater than zero",
            ));
        }
        if let Some(resource) = &self.gpu_resource {
            if resource.trim().is_empty() {
                return Err(Error::validation("gpu resource name must not be empty"));
            }
        }
        Ok(())
    }
}
