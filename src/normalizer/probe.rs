// Endpoint reachability probing

use std::time::Duration;

use futures_util::{StreamExt, stream};
use reqwest::Client;
use tracing::debug;

use super::endpoints::MISSING_ENDPOINT;
use crate::models::{DeploymentStatus, NormalizedDeployment};
use crate::version;

pub struct EndpointProber {
    client: Client,
    max_concurrency: usize,
}

impl EndpointProber {
    pub fn new(timeout: Duration, max_concurrency: usize) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(version::user_agent())
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self {
            client,
            max_concurrency: max_concurrency.max(1),
        })
    }

    /// True when a GET on `url` answers 2xx within the timeout.
    pub async fn is_active(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(url, error = %e, "endpoint probe failed");
                false
            }
        }
    }

    /// Fills `active_endpoints` with the (sorted) labels that answered. A deployment that
    /// is down has no reachable endpoints, whatever a probe would say.
    pub async fn probe_deployment(&self, deployment: &mut NormalizedDeployment) {
        if deployment.status == DeploymentStatus::Down {
            deployment.active_endpoints = Some(Vec::new());
            return;
        }
        let candidates: Vec<(&String, &String)> = deployment
            .endpoints
            .iter()
            .filter(|(_, url)| url.as_str() != MISSING_ENDPOINT)
            .collect();
        let mut active: Vec<String> = stream::iter(candidates)
            .map(|(label, url)| async move { self.is_active(url).await.then(|| label.clone()) })
            .buffer_unordered(self.max_concurrency)
            .filter_map(|label| async move { label })
            .boxed()
            .collect()
            .await;
        active.sort();
        deployment.active_endpoints = Some(active);
    }

    /// Probes the endpoints of all `deployments` through a single stream, so the
    /// concurrency cap holds across deployments.
    pub async fn probe_all(&self, deployments: &mut [NormalizedDeployment]) {
        let mut targets: Vec<(usize, String, String)> = Vec::new();
        for (idx, deployment) in deployments.iter_mut().enumerate() {
            deployment.active_endpoints = Some(Vec::new());
            if deployment.status == DeploymentStatus::Down {
                continue;
            }
            for (label, url) in &deployment.endpoints {
                if url != MISSING_ENDPOINT {
                    targets.push((idx, label.clone(), url.clone()));
                }
            }
        }

        let answered: Vec<(usize, String)> = stream::iter(targets)
            .map(|(idx, label, url)| async move { self.is_active(&url).await.then_some((idx, label)) })
            .buffer_unordered(self.max_concurrency)
            .filter_map(|hit| async move { hit })
            .collect()
            .await;

        for (idx, label) in answered {
            if let Some(active) = deployments[idx].active_endpoints.as_mut() {
                active.push(label);
            }
        }
        for deployment in deployments.iter_mut() {
            if let Some(active) = deployment.active_endpoints.as_mut() {
                active.sort();
            }
        }
    }
}
