// Shared test helpers: deployment/snapshot builders, raw scheduler payloads, fake scheduler
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, TimeZone, Utc};
use cluster_accounting::error::ApiError;
use cluster_accounting::models::raw::*;
use cluster_accounting::models::*;
use cluster_accounting::scheduler_repo::SchedulerApi;

/// 2024-03-`day` `h`:`m`:00 UTC.
pub fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, h, m, 0).unwrap()
}

pub fn cpus(cpu_num: u64) -> ResourceVector {
    ResourceVector {
        cpu_num,
        cpu_mhz: 1000 * cpu_num,
        memory_mb: 2000,
        disk_mb: 1000,
        gpu_num: 0,
    }
}

pub fn deployment(job_id: &str, owner: &str, status: DeploymentStatus) -> NormalizedDeployment {
    NormalizedDeployment {
        job_id: job_id.to_string(),
        name: format!("userjob-{job_id}"),
        status,
        owner: owner.to_string(),
        title: String::new(),
        description: String::new(),
        docker_image: Some("registry.example.org/module:latest".into()),
        docker_command: Some("deep-start --jupyter".into()),
        submit_time: at(1, 0, 0),
        resources: ResourceVector::default(),
        endpoints: BTreeMap::new(),
        active_endpoints: None,
        main_endpoint: None,
        alloc_id: None,
        alloc_start: None,
        alloc_end: None,
        datacenter: None,
        error_msg: None,
    }
}

pub fn running(
    job_id: &str,
    owner: &str,
    resources: ResourceVector,
    alloc_start: DateTime<Utc>,
) -> NormalizedDeployment {
    NormalizedDeployment {
        resources,
        alloc_id: Some(format!("alloc-{job_id}")),
        alloc_start: Some(alloc_start),
        ..deployment(job_id, owner, DeploymentStatus::Running)
    }
}

pub fn dead(
    job_id: &str,
    owner: &str,
    resources: ResourceVector,
    alloc_start: DateTime<Utc>,
    alloc_end: Option<DateTime<Utc>>,
) -> NormalizedDeployment {
    NormalizedDeployment {
        resources,
        alloc_id: Some(format!("alloc-{job_id}")),
        alloc_start: Some(alloc_start),
        alloc_end,
        ..deployment(job_id, owner, DeploymentStatus::Dead)
    }
}

pub fn queued(job_id: &str, owner: &str) -> NormalizedDeployment {
    NormalizedDeployment {
        resources: ResourceVector {
            cpu_mhz: 0,
            ..cpus(2)
        },
        ..deployment(job_id, owner, DeploymentStatus::Queued)
    }
}

pub fn snapshot(
    timestamp: DateTime<Utc>,
    namespaces: &[(&str, Vec<NormalizedDeployment>)],
) -> Snapshot {
    Snapshot::new(
        timestamp,
        namespaces
            .iter()
            .map(|(ns, deployments)| (ns.to_string(), deployments.clone()))
            .collect(),
    )
}

// Raw scheduler payloads

pub fn raw_job(id: &str, owner: &str) -> RawJob {
    RawJob {
        id: id.to_string(),
        name: format!("userjob-{id}"),
        status: "running".into(),
        submit_time: Some(at(1, 8, 0).timestamp_nanos_opt().unwrap()),
        meta: Some(HashMap::from([
            ("owner".to_string(), owner.to_string()),
            ("title".to_string(), "My module".to_string()),
            ("description".to_string(), "Testing".to_string()),
        ])),
        task_groups: Some(vec![RawTaskGroup {
            name: "usergroup".into(),
            tasks: Some(vec![
                RawTask {
                    name: "storagetask".into(),
                    ..Default::default()
                },
                RawTask {
                    name: "usertask".into(),
                    config: Some(RawTaskConfig {
                        image: Some("registry.example.org/module:latest".into()),
                        command: Some("deep-start".into()),
                        args: Some(vec!["--jupyter".into()]),
                    }),
                    resources: Some(RawTaskResources {
                        cpu: Some(2000),
                        cores: Some(4),
                        memory_mb: Some(8000),
                        devices: Some(vec![RawRequestedDevice {
                            name: "gpu".into(),
                            count: 1,
                        }]),
                    }),
                },
            ]),
            services: Some(vec![
                raw_service("api", &format!("api-{id}.${{meta.domain}}")),
                raw_service("ide", &format!("ide-{id}.${{meta.domain}}")),
            ]),
            ephemeral_disk: Some(RawEphemeralDisk { size_mb: 10_000 }),
        }]),
    }
}

pub fn raw_service(label: &str, host: &str) -> RawService {
    RawService {
        name: format!("svc-{label}"),
        port_label: label.to_string(),
        tags: Some(vec![
            "traefik.enable=true".into(),
            format!("traefik.http.routers.r-{label}.rule=Host(`{host}`)"),
        ]),
    }
}

pub fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

/// Full allocation record on `node_id`, with a primary task in `task_state`.
pub fn raw_allocation(id: &str, client_status: &str, create_time: i64, task_state: &str) -> RawAllocation {
    RawAllocation {
        id: id.to_string(),
        node_id: "node-1".into(),
        client_status: client_status.to_string(),
        create_time,
        task_states: Some(HashMap::from([(
            "usertask".to_string(),
            RawTaskState {
                state: task_state.to_string(),
                started_at: Some(rfc3339(at(1, 9, 0))),
                finished_at: Some(ZERO_TIME.to_string()),
                events: Some(vec![RawTaskEvent {
                    message: String::new(),
                    display_message: "Task started by client".into(),
                }]),
            },
        )])),
        allocated_resources: Some(RawAllocatedResources {
            tasks: HashMap::from([(
                "usertask".to_string(),
                RawAllocatedTaskResources {
                    cpu: RawAllocatedCpu {
                        cpu_shares: 2000,
                        reserved_cores: Some(vec![0, 1, 2, 3]),
                    },
                    memory: RawAllocatedMemory { memory_mb: 8000 },
                    devices: Some(vec![RawAllocatedDevice {
                        kind: "gpu".into(),
                        name: "Tesla T4".into(),
                        device_ids: Some(vec!["GPU-1".into()]),
                    }]),
                },
            )]),
            shared: Some(RawAllocatedShared { disk_mb: 10_000 }),
        }),
    }
}

/// Listing entry of an allocation (no task states or resources).
pub fn alloc_stub(full: &RawAllocation) -> RawAllocation {
    RawAllocation {
        id: full.id.clone(),
        node_id: full.node_id.clone(),
        client_status: full.client_status.clone(),
        create_time: full.create_time,
        task_states: None,
        allocated_resources: None,
    }
}

pub fn raw_node(id: &str, datacenter: &str, domain: &str) -> RawNode {
    RawNode {
        id: id.to_string(),
        datacenter: datacenter.to_string(),
        meta: Some(HashMap::from([("domain".to_string(), domain.to_string())])),
    }
}

pub fn failed_evaluation(group: &str) -> RawEvaluation {
    RawEvaluation {
        id: "eval-1".into(),
        failed_tg_allocs: Some(BTreeMap::from([(
            group.to_string(),
            RawAllocMetric {
                nodes_evaluated: 3,
                nodes_filtered: 1,
                nodes_exhausted: 2,
                dimension_exhausted: Some(BTreeMap::from([("memory".to_string(), 2)])),
                constraint_filtered: None,
            },
        )])),
    }
}

/// In-memory scheduler. Unknown namespaces, jobs, allocations and nodes answer 404.
#[derive(Default)]
pub struct FakeScheduler {
    pub jobs: HashMap<String, Vec<RawJobStub>>,
    pub job_details: HashMap<String, RawJob>,
    pub allocations: HashMap<String, Vec<RawAllocation>>,
    pub full_allocations: HashMap<String, RawAllocation>,
    pub evaluations: HashMap<String, Vec<RawEvaluation>>,
    pub nodes: HashMap<String, RawNode>,
}

fn not_found(what: &str) -> ApiError {
    ApiError::Status {
        status: reqwest::StatusCode::NOT_FOUND,
        url: format!("fake://{what}"),
    }
}

impl FakeScheduler {
    /// Registers a job (and its stub in `namespace`) with the given full allocations.
    pub fn add_job(&mut self, namespace: &str, job: RawJob, allocations: Vec<RawAllocation>) {
        self.jobs
            .entry(namespace.to_string())
            .or_default()
            .push(RawJobStub {
                id: job.id.clone(),
                name: job.name.clone(),
            });
        self.allocations
            .insert(job.id.clone(), allocations.iter().map(alloc_stub).collect());
        for alloc in allocations {
            self.full_allocations.insert(alloc.id.clone(), alloc);
        }
        self.job_details.insert(job.id.clone(), job);
    }
}

impl SchedulerApi for FakeScheduler {
    async fn list_jobs(&self, namespace: &str) -> Result<Vec<RawJobStub>, ApiError> {
        self.jobs
            .get(namespace)
            .cloned()
            .ok_or_else(|| not_found(namespace))
    }

    async fn get_job(&self, _namespace: &str, job_id: &str) -> Result<RawJob, ApiError> {
        self.job_details
            .get(job_id)
            .cloned()
            .ok_or_else(|| not_found(job_id))
    }

    async fn get_allocations(
        &self,
        _namespace: &str,
        job_id: &str,
    ) -> Result<Vec<RawAllocation>, ApiError> {
        Ok(self.allocations.get(job_id).cloned().unwrap_or_default())
    }

    async fn get_allocation(
        &self,
        _namespace: &str,
        alloc_id: &str,
    ) -> Result<RawAllocation, ApiError> {
        self.full_allocations
            .get(alloc_id)
            .cloned()
            .ok_or_else(|| not_found(alloc_id))
    }

    async fn get_evaluations(
        &self,
        _namespace: &str,
        job_id: &str,
    ) -> Result<Vec<RawEvaluation>, ApiError> {
        Ok(self.evaluations.get(job_id).cloned().unwrap_or_default())
    }

    async fn get_node(&self, node_id: &str) -> Result<RawNode, ApiError> {
        self.nodes
            .get(node_id)
            .cloned()
            .ok_or_else(|| not_found(node_id))
    }
}
