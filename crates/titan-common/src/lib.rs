//! Common types for Titan: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod retry;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager name used for server-side apply and status writes
pub const FIELD_MANAGER: &str = "titan-controller";

/// Label key marking objects created by Titan
pub const MANAGED_BY_LABEL_KEY: &str = "app.kubernetes.io/managed-by";

/// Label value for [`MANAGED_BY_LABEL_KEY`]
pub const MANAGED_BY_LABEL_VALUE: &str = "titan";

/// Label key carrying the owning TrainingJob name on execution units
pub const JOB_LABEL_KEY: &str = "batch.titan.dev/job";

/// Namespace jobs are submitted to when none is configured
pub const DEFAULT_NAMESPACE: &str = "default";
