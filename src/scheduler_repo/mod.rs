// Scheduler query API: narrow read-only interface + HTTP adapter (Nomad-style REST)

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::config::SchedulerConfig;
use crate::error::ApiError;
use crate::models::raw::{RawAllocation, RawEvaluation, RawJob, RawJobStub, RawNode};
use crate::version;

/// Everything the collector and normalizer read from the scheduler. Implementations must
/// not write to the scheduler.
pub trait SchedulerApi: Send + Sync {
    fn list_jobs(
        &self,
        namespace: &str,
    ) -> impl Future<Output = Result<Vec<RawJobStub>, ApiError>> + Send;

    fn get_job(
        &self,
        namespace: &str,
        job_id: &str,
    ) -> impl Future<Output = Result<RawJob, ApiError>> + Send;

    /// Allocation stubs of a job (no allocated resources).
    fn get_allocations(
        &self,
        namespace: &str,
        job_id: &str,
    ) -> impl Future<Output = Result<Vec<RawAllocation>, ApiError>> + Send;

    /// Full allocation record, including task states and allocated resources.
    fn get_allocation(
        &self,
        namespace: &str,
        alloc_id: &str,
    ) -> impl Future<Output = Result<RawAllocation, ApiError>> + Send;

    fn get_evaluations(
        &self,
        namespace: &str,
        job_id: &str,
    ) -> impl Future<Output = Result<Vec<RawEvaluation>, ApiError>> + Send;

    fn get_node(&self, node_id: &str) -> impl Future<Output = Result<RawNode, ApiError>> + Send;
}

pub struct SchedulerRepo {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl SchedulerRepo {
    pub fn connect(config: &SchedulerConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(version::user_agent())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .danger_accept_invalid_certs(config.tls_insecure)
            .build()?;
        Ok(Self {
            client,
            base_url: config.address.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        namespace: Option<&str>,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url);
        if let Some(ns) = namespace {
            request = request.query(&[("namespace", ns)]);
        }
        if let Some(token) = &self.token {
            request = request.header("X-Nomad-Token", token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status { status, url });
        }
        Ok(response.json::<T>().await?)
    }
}

impl SchedulerApi for SchedulerRepo {
    #[instrument(skip(self), fields(repo = "scheduler", operation = "list_jobs"))]
    async fn list_jobs(&self, namespace: &str) -> Result<Vec<RawJobStub>, ApiError> {
        self.get_json("/v1/jobs", Some(namespace)).await
    }

    #[instrument(skip(self), fields(repo = "scheduler", operation = "get_job"))]
    async fn get_job(&self, namespace: &str, job_id: &str) -> Result<RawJob, ApiError> {
        self.get_json(&format!("/v1/job/{job_id}"), Some(namespace))
            .await
    }

    #[instrument(skip(self), fields(repo = "scheduler", operation = "get_allocations"))]
    async fn get_allocations(
        &self,
        namespace: &str,
        job_id: &str,
    ) -> Result<Vec<RawAllocation>, ApiError> {
        self.get_json(&format!("/v1/job/{job_id}/allocations"), Some(namespace))
            .await
    }

    #[instrument(skip(self), fields(repo = "scheduler", operation = "get_allocation"))]
    async fn get_allocation(
        &self,
        namespace: &str,
        alloc_id: &str,
    ) -> Result<RawAllocation, ApiError> {
        self.get_json(&format!("/v1/allocation/{alloc_id}"), Some(namespace))
            .await
    }

    #[instrument(skip(self), fields(repo = "scheduler", operation = "get_evaluations"))]
    async fn get_evaluations(
        &self,
        namespace: &str,
        job_id: &str,
    ) -> Result<Vec<RawEvaluation>, ApiError> {
        self.get_json(&format!("/v1/job/{job_id}/evaluations"), Some(namespace))
            .await
    }

    #[instrument(skip(self), fields(repo = "scheduler", operation = "get_node"))]
    async fn get_node(&self, node_id: &str) -> Result<RawNode, ApiError> {
        self.get_json(&format!("/v1/node/{node_id}"), None).await
    }
}
