// Scheduler API payloads (Nomad-style JSON). Only the fields the normalizer reads are
// modeled; everything the scheduler may omit is an Option and validated downstream.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

/// Entry of the job listing for a namespace.
#[derive(Debug, Clone, Deserialize)]
pub struct RawJobStub {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJob {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Status", default)]
    pub status: String,
    /// Nanoseconds since the epoch.
    #[serde(rename = "SubmitTime", default)]
    pub submit_time: Option<i64>,
    #[serde(rename = "Meta", default)]
    pub meta: Option<HashMap<String, String>>,
    #[serde(rename = "TaskGroups", default)]
    pub task_groups: Option<Vec<RawTaskGroup>>,
}

impl RawJob {
    /// Job-level terminal flag (the job was stopped or has finished).
    pub fn is_dead(&self) -> bool {
        self.status == "dead"
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTaskGroup {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Tasks", default)]
    pub tasks: Option<Vec<RawTask>>,
    #[serde(rename = "Services", default)]
    pub services: Option<Vec<RawService>>,
    #[serde(rename = "EphemeralDisk", default)]
    pub ephemeral_disk: Option<RawEphemeralDisk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEphemeralDisk {
    #[serde(rename = "SizeMB", default)]
    pub size_mb: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTask {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Config", default)]
    pub config: Option<RawTaskConfig>,
    #[serde(rename = "Resources", default)]
    pub resources: Option<RawTaskResources>,
}

/// Driver config; keys are lowercase in the scheduler's JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTaskConfig {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Option<Vec<String>>,
}

/// Requested resources of a task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTaskResources {
    #[serde(rename = "CPU", default)]
    pub cpu: Option<u64>,
    #[serde(rename = "Cores", default)]
    pub cores: Option<u64>,
    #[serde(rename = "MemoryMB", default)]
    pub memory_mb: Option<u64>,
    #[serde(rename = "Devices", default)]
    pub devices: Option<Vec<RawRequestedDevice>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRequestedDevice {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Count", default)]
    pub count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawService {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "PortLabel", default)]
    pub port_label: String,
    #[serde(rename = "Tags", default)]
    pub tags: Option<Vec<String>>,
}

/// Allocation as listed per job (stub) or fetched by id (full record with resources).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAllocation {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "NodeID", default)]
    pub node_id: String,
    #[serde(rename = "ClientStatus", default)]
    pub client_status: String,
    /// Nanoseconds since the epoch.
    #[serde(rename = "CreateTime", default)]
    pub create_time: i64,
    #[serde(rename = "TaskStates", default)]
    pub task_states: Option<HashMap<String, RawTaskState>>,
    #[serde(rename = "AllocatedResources", default)]
    pub allocated_resources: Option<RawAllocatedResources>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTaskState {
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "StartedAt", default)]
    pub started_at: Option<String>,
    #[serde(rename = "FinishedAt", default)]
    pub finished_at: Option<String>,
    #[serde(rename = "Events", default)]
    pub events: Option<Vec<RawTaskEvent>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTaskEvent {
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "DisplayMessage", default)]
    pub display_message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAllocatedResources {
    #[serde(rename = "Tasks", default)]
    pub tasks: HashMap<String, RawAllocatedTaskResources>,
    #[serde(rename = "Shared", default)]
    pub shared: Option<RawAllocatedShared>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAllocatedTaskResources {
    #[serde(rename = "Cpu", default)]
    pub cpu: RawAllocatedCpu,
    #[serde(rename = "Memory", default)]
    pub memory: RawAllocatedMemory,
    #[serde(rename = "Devices", default)]
    pub devices: Option<Vec<RawAllocatedDevice>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAllocatedCpu {
    #[serde(rename = "CpuShares", default)]
    pub cpu_shares: u64,
    #[serde(rename = "ReservedCores", default)]
    pub reserved_cores: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAllocatedMemory {
    #[serde(rename = "MemoryMB", default)]
    pub memory_mb: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAllocatedDevice {
    #[serde(rename = "Type", default)]
    pub kind: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "DeviceIDs", default)]
    pub device_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAllocatedShared {
    #[serde(rename = "DiskMB", default)]
    pub disk_mb: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvaluation {
    #[serde(rename = "ID")]
    pub id: String,
    /// Placement failures keyed by task group name.
    #[serde(rename = "FailedTGAllocs", default)]
    pub failed_tg_allocs: Option<BTreeMap<String, RawAllocMetric>>,
}

/// Placement metrics of a failed task group.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAllocMetric {
    #[serde(rename = "NodesEvaluated", default)]
    pub nodes_evaluated: u64,
    #[serde(rename = "NodesFiltered", default)]
    pub nodes_filtered: u64,
    #[serde(rename = "NodesExhausted", default)]
    pub nodes_exhausted: u64,
    #[serde(rename = "DimensionExhausted", default)]
    pub dimension_exhausted: Option<BTreeMap<String, u64>>,
    #[serde(rename = "ConstraintFiltered", default)]
    pub constraint_filtered: Option<BTreeMap<String, u64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNode {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Datacenter", default)]
    pub datacenter: String,
    #[serde(rename = "Meta", default)]
    pub meta: Option<HashMap<String, String>>,
}

impl RawNode {
    /// Public domain the node's endpoints are served under (node meta `domain`).
    pub fn domain(&self) -> Option<&str> {
        self.meta
            .as_ref()
            .and_then(|m| m.get("domain"))
            .map(String::as_str)
            .filter(|d| !d.is_empty())
    }
}
