//! Job submission API
//!
//! A small HTTP front end over the TrainingJob CRD:
//! - `POST /jobs` creates a TrainingJob with a generated name
//! - `GET /jobs` lists jobs with their reported state
//!
//! Admission and execution are left entirely to the controller; this service
//! only writes and reads TrainingJob objects.

#![deny(missing_docs)]

pub mod catalog;
pub mod error;
pub mod server;

pub use catalog::{JobCatalog, KubeJobCatalog};
pub use error::{Error, Result};
pub use server::{router, start_server, AppState, ServerConfig};
