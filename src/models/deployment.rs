// Normalized deployment record: one per job per poll, scheduler-independent

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ResourceVector;
use super::time::{opt_scheduler_time, submit_time};

/// User-facing deployment status; serializes to lowercase (e.g. "running").
/// Older snapshots carried raw allocation statuses, accepted here as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Queued,
    #[serde(alias = "pending")]
    Starting,
    Running,
    #[serde(alias = "unknown", alias = "lost")]
    Down,
    Complete,
    Failed,
    Dead,
    Error,
}

impl DeploymentStatus {
    /// Terminal statuses: the backing allocation (if any) has stopped for good.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::Complete | DeploymentStatus::Failed | DeploymentStatus::Dead
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Queued => "queued",
            DeploymentStatus::Starting => "starting",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Down => "down",
            DeploymentStatus::Complete => "complete",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::Dead => "dead",
            DeploymentStatus::Error => "error",
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One deployment as observed at one poll. Field names follow the snapshot files written
/// by earlier pollers, so old snapshot directories import without conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDeployment {
    #[serde(rename = "job_ID")]
    pub job_id: String,
    #[serde(default)]
    pub name: String,
    pub status: DeploymentStatus,
    pub owner: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub docker_image: Option<String>,
    #[serde(default)]
    pub docker_command: Option<String>,
    #[serde(with = "submit_time")]
    pub submit_time: DateTime<Utc>,
    #[serde(default)]
    pub resources: ResourceVector,
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
    /// Labels of endpoints that answered a reachability probe; `None` when not probed.
    #[serde(default)]
    pub active_endpoints: Option<Vec<String>>,
    /// Label of the endpoint the deployment is primarily used through.
    #[serde(default)]
    pub main_endpoint: Option<String>,
    #[serde(default, rename = "alloc_ID")]
    pub alloc_id: Option<String>,
    #[serde(default, with = "opt_scheduler_time")]
    pub alloc_start: Option<DateTime<Utc>>,
    #[serde(default, with = "opt_scheduler_time")]
    pub alloc_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub datacenter: Option<String>,
    #[serde(default)]
    pub error_msg: Option<String>,
}
