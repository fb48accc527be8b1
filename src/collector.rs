// Takes one snapshot: scan each namespace, normalize every user job, stamp with poll time.

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::models::time::truncate_to_second;
use crate::models::{NamespaceDeployments, NormalizedDeployment, Snapshot};
use crate::normalizer::DeploymentNormalizer;
use crate::scheduler_repo::SchedulerApi;

pub struct Collector<S> {
    api: S,
    normalizer: DeploymentNormalizer,
    namespaces: Vec<String>,
    job_prefix: String,
}

impl<S: SchedulerApi> Collector<S> {
    pub fn new(
        api: S,
        normalizer: DeploymentNormalizer,
        namespaces: Vec<String>,
        job_prefix: String,
    ) -> Self {
        Self {
            api,
            normalizer,
            namespaces,
            job_prefix,
        }
    }

    /// Polls all configured namespaces. A namespace whose job listing fails is left out of
    /// the snapshot; a job that cannot be normalized is left out of its namespace.
    #[instrument(skip(self), fields(operation = "take_snapshot"))]
    pub async fn take_snapshot(&self) -> Snapshot {
        let timestamp = truncate_to_second(Utc::now());
        let mut namespaces = NamespaceDeployments::new();
        for namespace in &self.namespaces {
            match self.scan_namespace(namespace).await {
                Ok(deployments) => {
                    namespaces.insert(namespace.clone(), deployments);
                }
                Err(e) => {
                    warn!(namespace = %namespace, error = %e, "namespace scan failed; left out of snapshot");
                }
            }
        }

        if let Some(prober) = self.normalizer.prober() {
            for deployments in namespaces.values_mut() {
                prober.probe_all(deployments).await;
            }
        }

        let snapshot = Snapshot::new(timestamp, namespaces);
        info!(
            taken_at = %snapshot.key(),
            namespaces = snapshot.namespaces.len(),
            deployments = snapshot.deployment_count(),
            "snapshot taken"
        );
        snapshot
    }

    async fn scan_namespace(&self, namespace: &str) -> anyhow::Result<Vec<NormalizedDeployment>> {
        let jobs = self.api.list_jobs(namespace).await?;
        let mut deployments = Vec::new();
        for job in jobs.iter().filter(|j| j.name.starts_with(&self.job_prefix)) {
            match self.normalizer.fetch(&self.api, namespace, &job.id, false).await {
                Ok(d) => deployments.push(d),
                Err(e) => {
                    warn!(namespace, job_id = %job.id, error = %e, "skipping job");
                }
            }
        }
        deployments.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        Ok(deployments)
    }
}
