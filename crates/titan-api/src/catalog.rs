//! TrainingJob storage used by the API handlers

use async_trait::async_trait;
use kube::api::{Api, ListParams, PostParams};
use kube::Client;

#[cfg(test)]
use mockall::automock;

use titan_common::crd::TrainingJob;
use titan_common::error::is_conflict;

use crate::error::Error;

/// Create and list TrainingJobs in the API's namespace
#[cfg_attr(test, automock)]
#[async_trait]
pub trait JobCatalog: Send + Sync {
    /// Create a job; a name collision is [`Error::AlreadyExists`]
    async fn create(&self, job: &TrainingJob) -> Result<TrainingJob, Error>;

    /// List all jobs
    async fn list(&self) -> Result<Vec<TrainingJob>, Error>;
}

/// [`JobCatalog`] backed by the Kubernetes API
pub struct KubeJobCatalog {
    api: Api<TrainingJob>,
}

impl KubeJobCatalog {
    /// Create a catalog for jobs in `namespace`
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait]
impl JobCatalog for KubeJobCatalog {
    async fn create(&self, job: &TrainingJob) -> Result<TrainingJob, Error> {
        match self.api.create(&PostParams::default(), job).await {
            Ok(created) => Ok(created),
            Err(e) if is_conflict(&e) => Err(Error::AlreadyExists(
                job.metadata.name.clone().unwrap_or_default(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<TrainingJob>, Error> {
        Ok(self.api.list(&ListParams::default()).await?.items)
    }
}
