// Raw scheduler state (job + allocations + evaluations + node) -> NormalizedDeployment.

pub mod allocation;
pub mod endpoints;
mod probe;

pub use probe::EndpointProber;

use chrono::{DateTime, Utc};
use tracing::{instrument, warn};

use crate::error::{NormalizeError, ValidationError};
use crate::models::raw::{
    RawAllocMetric, RawAllocation, RawEvaluation, RawJob, RawNode, RawTask, RawTaskGroup,
    RawTaskState,
};
use crate::models::time::{from_unix_nanos, parse_scheduler_time};
use crate::models::{DeploymentStatus, NormalizedDeployment, ResourceVector};
use crate::scheduler_repo::SchedulerApi;

use allocation::{is_terminal_client_status, map_allocation_status, select_allocation};
use endpoints::{derive_endpoints, main_endpoint};

const EXIT_CODE_ONE: &str = "Docker container exited with non-zero exit code: 1";
const NETWORK_ISSUE_MSG: &str = "There seems to be network issues in the cluster. Please wait until \
     the network is restored and you should be able to fully recover your deployment.";

#[derive(Debug, Clone)]
pub struct NormalizerOptions {
    /// Task whose state and resources stand for the whole deployment.
    pub primary_task: String,
    /// Backfill `cpu_num` from `cpu_MHz` when it is reported as 0.
    pub cpu_num_backfill: bool,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            primary_task: "usertask".to_string(),
            cpu_num_backfill: true,
        }
    }
}

/// Builds the deployment record from already-fetched scheduler state. `allocations` must hold
/// the full record for the allocation `select_allocation` picks; `node` is that allocation's
/// node. Deterministic; never probes.
pub fn normalize(
    job: &RawJob,
    allocations: &[RawAllocation],
    evaluations: &[RawEvaluation],
    node: Option<&RawNode>,
    options: &NormalizerOptions,
) -> Result<NormalizedDeployment, ValidationError> {
    let meta = job.meta.as_ref().ok_or_else(|| missing(job, "Meta"))?;
    let owner = meta
        .get("owner")
        .filter(|o| !o.is_empty())
        .ok_or_else(|| missing(job, "Meta.owner"))?
        .clone();
    let submit_time = job
        .submit_time
        .map(from_unix_nanos)
        .ok_or_else(|| missing(job, "SubmitTime"))?;
    let group = job
        .task_groups
        .as_ref()
        .and_then(|groups| groups.first())
        .ok_or_else(|| missing(job, "TaskGroups"))?;
    let task = primary_task(job, group, &options.primary_task)?;

    let docker_image = task.config.as_ref().and_then(|c| c.image.clone());
    let docker_command = task.config.as_ref().map(|c| {
        let command = c.command.as_deref().unwrap_or("");
        let args = c.args.as_deref().unwrap_or(&[]).join(" ");
        format!("{command} {args}").trim().to_string()
    });

    let selected = select_allocation(allocations).map(|i| &allocations[i]);
    let node_domain = selected.and(node).and_then(RawNode::domain);
    let services = group.services.as_deref().unwrap_or(&[]);
    let endpoints = derive_endpoints(services, node_domain);
    let main_endpoint = main_endpoint(docker_command.as_deref(), &endpoints);

    let mut deployment = NormalizedDeployment {
        job_id: job.id.clone(),
        name: job.name.clone(),
        status: DeploymentStatus::Queued,
        owner,
        title: meta.get("title").cloned().unwrap_or_default(),
        description: meta.get("description").cloned().unwrap_or_default(),
        docker_image,
        docker_command,
        submit_time,
        resources: ResourceVector::default(),
        endpoints,
        active_endpoints: None,
        main_endpoint,
        alloc_id: None,
        alloc_start: None,
        alloc_end: None,
        datacenter: None,
        error_msg: None,
    };

    if let Some(alloc) = selected {
        apply_allocation(&mut deployment, job, alloc, node, &options.primary_task)?;
    } else if let Some(failure) = placement_failure(evaluations) {
        deployment.status = DeploymentStatus::Error;
        deployment.error_msg = Some(failure);
    } else {
        deployment.resources = requested_resources(group, task);
    }

    if options.cpu_num_backfill && deployment.resources.backfill_cpu_num() {
        warn!(
            job_id = %deployment.job_id,
            cpu_num = deployment.resources.cpu_num,
            "cpu_num reported as 0; backfilled from cpu_MHz"
        );
    }

    // A job can be torn down while its allocation still reports running.
    if job.is_dead() {
        if deployment.status == DeploymentStatus::Down {
            deployment.error_msg = None;
        }
        deployment.status = DeploymentStatus::Dead;
    }

    Ok(deployment)
}

fn missing(job: &RawJob, field: &'static str) -> ValidationError {
    ValidationError::MissingField {
        job_id: job.id.clone(),
        field,
    }
}

fn primary_task<'a>(
    job: &RawJob,
    group: &'a RawTaskGroup,
    name: &str,
) -> Result<&'a RawTask, ValidationError> {
    group
        .tasks
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| ValidationError::MissingPrimaryTask {
            job_id: job.id.clone(),
            task: name.to_string(),
        })
}

fn apply_allocation(
    deployment: &mut NormalizedDeployment,
    job: &RawJob,
    alloc: &RawAllocation,
    node: Option<&RawNode>,
    task_name: &str,
) -> Result<(), ValidationError> {
    deployment.status = map_allocation_status(&job.id, &alloc.client_status)?;
    deployment.alloc_id = Some(alloc.id.clone());
    deployment.datacenter = node
        .map(|n| n.datacenter.clone())
        .filter(|dc| !dc.is_empty());
    deployment.resources = allocated_resources(job, alloc, task_name)?;

    let task_state = alloc
        .task_states
        .as_ref()
        .and_then(|states| states.get(task_name));
    if let Some(state) = task_state {
        deployment.alloc_start = state.started_at.as_deref().and_then(parse_scheduler_time);
        deployment.alloc_end = finished_at(alloc, state);
    }

    deployment.error_msg = match deployment.status {
        DeploymentStatus::Failed => task_state
            .and_then(first_event_message)
            .map(|msg| friendly_failure(msg, deployment.docker_command.as_deref())),
        DeploymentStatus::Down => Some(NETWORK_ISSUE_MSG.to_string()),
        _ => None,
    };
    Ok(())
}

/// Finish time, only once the task or its allocation has actually stopped; a restarted task
/// keeps the finish time of its previous run.
fn finished_at(alloc: &RawAllocation, state: &RawTaskState) -> Option<DateTime<Utc>> {
    if state.state == "dead" || is_terminal_client_status(&alloc.client_status) {
        state.finished_at.as_deref().and_then(parse_scheduler_time)
    } else {
        None
    }
}

fn first_event_message(state: &RawTaskState) -> Option<&str> {
    state
        .events
        .as_deref()
        .and_then(|events| events.first())
        .map(|e| {
            // DisplayMessage is the scheduler's own rewording; Message is the driver's text.
            if e.message.is_empty() {
                e.display_message.as_str()
            } else {
                e.message.as_str()
            }
        })
        .filter(|m| !m.is_empty())
}

fn friendly_failure(msg: &str, command: Option<&str>) -> String {
    if msg == EXIT_CODE_ONE {
        format!(
            "An error seems to appear when running this Docker container. Try to run this \
             Docker locally with the command `{}` to find what is the error or contact the \
             module owner.",
            command.unwrap_or_default()
        )
    } else {
        msg.to_string()
    }
}

fn allocated_resources(
    job: &RawJob,
    alloc: &RawAllocation,
    task_name: &str,
) -> Result<ResourceVector, ValidationError> {
    let allocated = alloc.allocated_resources.as_ref();
    let task = allocated
        .and_then(|r| r.tasks.get(task_name))
        .ok_or_else(|| ValidationError::MissingAllocatedResources {
            job_id: job.id.clone(),
            alloc_id: alloc.id.clone(),
            task: task_name.to_string(),
        })?;
    let gpu_num = task
        .devices
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .find(|d| d.kind == "gpu")
        .map_or(0, |d| d.device_ids.as_ref().map_or(0, Vec::len) as u64);
    Ok(ResourceVector {
        cpu_num: task.cpu.reserved_cores.as_ref().map_or(0, Vec::len) as u64,
        cpu_mhz: task.cpu.cpu_shares,
        memory_mb: task.memory.memory_mb,
        disk_mb: allocated
            .and_then(|r| r.shared.as_ref())
            .map_or(0, |s| s.disk_mb),
        gpu_num,
    })
}

/// Requested quantities of a job that has not been placed; the clock share is unknown
/// before allocation and reported as 0.
fn requested_resources(group: &RawTaskGroup, task: &RawTask) -> ResourceVector {
    let requested = task.resources.as_ref();
    let gpu_num = requested
        .and_then(|r| r.devices.as_deref())
        .unwrap_or(&[])
        .iter()
        .find(|d| d.name == "gpu" || d.name.ends_with("/gpu"))
        .map_or(0, |d| d.count);
    ResourceVector {
        cpu_num: requested.and_then(|r| r.cores).unwrap_or(0),
        cpu_mhz: 0,
        memory_mb: requested.and_then(|r| r.memory_mb).unwrap_or(0),
        disk_mb: group.ephemeral_disk.as_ref().map_or(0, |d| d.size_mb),
        gpu_num,
    }
}

/// Message of the first placement failure, if any evaluation recorded one.
fn placement_failure(evaluations: &[RawEvaluation]) -> Option<String> {
    evaluations
        .iter()
        .filter_map(|e| e.failed_tg_allocs.as_ref())
        .find_map(|failed| failed.iter().next())
        .map(|(group, metric)| describe_placement_failure(group, metric))
}

fn describe_placement_failure(group: &str, metric: &RawAllocMetric) -> String {
    let mut msg = format!(
        "placement failed for task group `{group}`: {} nodes evaluated, {} filtered, {} exhausted",
        metric.nodes_evaluated, metric.nodes_filtered, metric.nodes_exhausted
    );
    for (title, counts) in [
        ("exhausted", &metric.dimension_exhausted),
        ("constraints", &metric.constraint_filtered),
    ] {
        if let Some(counts) = counts.as_ref().filter(|c| !c.is_empty()) {
            let detail: Vec<String> = counts.iter().map(|(k, v)| format!("{k}: {v}")).collect();
            msg.push_str(&format!("; {title} ({})", detail.join(", ")));
        }
    }
    msg
}

/// Fetches a job's scheduler state through `SchedulerApi` and normalizes it.
pub struct DeploymentNormalizer {
    options: NormalizerOptions,
    prober: Option<EndpointProber>,
}

impl DeploymentNormalizer {
    pub fn new(options: NormalizerOptions, prober: Option<EndpointProber>) -> Self {
        Self { options, prober }
    }

    pub fn prober(&self) -> Option<&EndpointProber> {
        self.prober.as_ref()
    }

    /// Reads job, allocations, evaluations and the selected allocation's node, then
    /// normalizes. Endpoints are probed only when `probe_endpoints` is set and a prober was
    /// configured. Fails for this job only.
    #[instrument(skip(self, api), fields(operation = "normalize"))]
    pub async fn fetch<S: SchedulerApi>(
        &self,
        api: &S,
        namespace: &str,
        job_id: &str,
        probe_endpoints: bool,
    ) -> Result<NormalizedDeployment, NormalizeError> {
        let job = api.get_job(namespace, job_id).await?;
        let mut allocations = api.get_allocations(namespace, job_id).await?;
        let evaluations = api.get_evaluations(namespace, job_id).await?;

        let mut node = None;
        if let Some(idx) = select_allocation(&allocations) {
            let full = api.get_allocation(namespace, &allocations[idx].id).await?;
            node = match api.get_node(&full.node_id).await {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!(
                        job_id,
                        node_id = %full.node_id,
                        error = %e,
                        "node lookup failed; datacenter and domain left unresolved"
                    );
                    None
                }
            };
            allocations[idx] = full;
        }

        let mut deployment = normalize(
            &job,
            &allocations,
            &evaluations,
            node.as_ref(),
            &self.options,
        )?;
        if probe_endpoints && let Some(prober) = &self.prober {
            prober.probe_deployment(&mut deployment).await;
        }
        Ok(deployment)
    }
}
