// Allocation selection and allocation-status mapping.

use crate::error::ValidationError;
use crate::models::DeploymentStatus;
use crate::models::raw::RawAllocation;

/// Allocation statuses after which the allocation will not run again.
const TERMINAL_CLIENT_STATUSES: [&str; 3] = ["complete", "failed", "lost"];

/// Picks the allocation that represents the deployment, by fixed priority:
///
/// 1. `unknown`: the node lost contact. A replacement allocation may exist meanwhile, but the
///    original comes back once the partition heals, so it stays canonical.
/// 2. `running`: after a partition heals, the temporary replacement (now `complete`) can be
///    more recent than the recovered running allocation.
/// 3. Otherwise the most recently created one.
///
/// Within each rule the most recent allocation wins. Returns an index into `allocations`.
pub fn select_allocation(allocations: &[RawAllocation]) -> Option<usize> {
    if allocations.is_empty() {
        return None;
    }
    let mut by_recency: Vec<usize> = (0..allocations.len()).collect();
    // Stable: equal create times keep the scheduler's order.
    by_recency.sort_by(|a, b| {
        allocations[*b]
            .create_time
            .cmp(&allocations[*a].create_time)
    });

    let first_with = |status: &str| {
        by_recency
            .iter()
            .copied()
            .find(|i| allocations[*i].client_status == status)
    };

    first_with("unknown")
        .or_else(|| first_with("running"))
        .or_else(|| by_recency.first().copied())
}

/// Maps the scheduler's allocation status to the deployment status shown to users.
pub fn map_allocation_status(
    job_id: &str,
    client_status: &str,
) -> Result<DeploymentStatus, ValidationError> {
    match client_status {
        "pending" => Ok(DeploymentStatus::Starting),
        "running" => Ok(DeploymentStatus::Running),
        "unknown" | "lost" => Ok(DeploymentStatus::Down),
        "complete" => Ok(DeploymentStatus::Complete),
        "failed" => Ok(DeploymentStatus::Failed),
        "dead" => Ok(DeploymentStatus::Dead),
        other => Err(ValidationError::UnrecognizedStatus {
            job_id: job_id.to_string(),
            status: other.to_string(),
        }),
    }
}

pub fn is_terminal_client_status(client_status: &str) -> bool {
    TERMINAL_CLIENT_STATUSES.contains(&client_status)
}
