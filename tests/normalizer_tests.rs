// Normalizer tests: status mapping, resources, endpoints, error messages, fetch via fake scheduler

mod common;

use cluster_accounting::error::{NormalizeError, ValidationError};
use cluster_accounting::models::raw::*;
use cluster_accounting::models::*;
use cluster_accounting::normalizer::{DeploymentNormalizer, NormalizerOptions, normalize};
use common::*;

fn opts() -> NormalizerOptions {
    NormalizerOptions::default()
}

fn node() -> RawNode {
    raw_node("node-1", "dc-a", "node1.example.org")
}

fn primary_state(alloc: &mut RawAllocation) -> &mut RawTaskState {
    alloc
        .task_states
        .as_mut()
        .unwrap()
        .get_mut("usertask")
        .unwrap()
}

#[test]
fn normalize_running_allocation_reads_allocated_resources() {
    let job = raw_job("j1", "alice@example.org");
    let allocs = vec![raw_allocation("a1", "running", 10, "running")];
    let d = normalize(&job, &allocs, &[], Some(&node()), &opts()).unwrap();

    assert_eq!(d.status, DeploymentStatus::Running);
    assert_eq!(d.owner, "alice@example.org");
    assert_eq!(d.title, "My module");
    assert_eq!(d.alloc_id.as_deref(), Some("a1"));
    assert_eq!(d.datacenter.as_deref(), Some("dc-a"));
    assert_eq!(
        d.resources,
        ResourceVector {
            cpu_num: 4,
            cpu_mhz: 2000,
            memory_mb: 8000,
            disk_mb: 10_000,
            gpu_num: 1,
        }
    );
    assert_eq!(d.alloc_start, Some(at(1, 9, 0)));
    assert_eq!(d.alloc_end, None);
    assert_eq!(d.submit_time, at(1, 8, 0));
    assert_eq!(d.docker_command.as_deref(), Some("deep-start --jupyter"));
    assert_eq!(d.error_msg, None);
}

#[test]
fn normalize_resolves_domain_and_main_endpoint_once_placed() {
    let job = raw_job("j1", "alice");
    let allocs = vec![raw_allocation("a1", "running", 10, "running")];
    let d = normalize(&job, &allocs, &[], Some(&node()), &opts()).unwrap();

    assert_eq!(d.endpoints["api"], "http://api-j1.node1.example.org/ui");
    assert_eq!(d.endpoints["ide"], "http://ide-j1.node1.example.org");
    assert_eq!(d.main_endpoint.as_deref(), Some("ide"));
    assert_eq!(d.active_endpoints, None);
}

#[test]
fn normalize_queued_reads_requested_resources() {
    let job = raw_job("j2", "bob");
    let d = normalize(&job, &[], &[], None, &opts()).unwrap();

    assert_eq!(d.status, DeploymentStatus::Queued);
    assert_eq!(d.alloc_id, None);
    assert_eq!(d.resources.cpu_mhz, 0);
    assert_eq!(d.resources.cpu_num, 4);
    assert_eq!(d.resources.memory_mb, 8000);
    assert_eq!(d.resources.disk_mb, 10_000);
    assert_eq!(d.resources.gpu_num, 1);
    assert_eq!(d.endpoints["ide"], "http://ide-j2.${meta.domain}");
}

#[test]
fn normalize_evaluations_without_failures_stay_queued() {
    let job = raw_job("j2", "bob");
    let evals = vec![RawEvaluation {
        id: "e1".into(),
        failed_tg_allocs: None,
    }];
    let d = normalize(&job, &[], &evals, None, &opts()).unwrap();
    assert_eq!(d.status, DeploymentStatus::Queued);
}

#[test]
fn normalize_placement_failure_gives_error_with_message() {
    let job = raw_job("j3", "carol");
    let d = normalize(&job, &[], &[failed_evaluation("usergroup")], None, &opts()).unwrap();

    assert_eq!(d.status, DeploymentStatus::Error);
    assert_eq!(d.alloc_id, None);
    let msg = d.error_msg.unwrap();
    assert!(msg.contains("usergroup"));
    assert!(msg.contains("3 nodes evaluated"));
    assert!(msg.contains("memory: 2"));
}

#[test]
fn normalize_dead_job_overrides_running_allocation() {
    let mut job = raw_job("j4", "dave");
    job.status = "dead".into();
    let allocs = vec![raw_allocation("a1", "running", 10, "running")];
    let d = normalize(&job, &allocs, &[], Some(&node()), &opts()).unwrap();
    assert_eq!(d.status, DeploymentStatus::Dead);
}

#[test]
fn normalize_failed_exit_code_gets_friendly_message_and_end_time() {
    let job = raw_job("j5", "erin");
    let mut alloc = raw_allocation("a1", "failed", 10, "dead");
    let state = primary_state(&mut alloc);
    state.finished_at = Some(rfc3339(at(1, 10, 30)));
    state.events = Some(vec![RawTaskEvent {
        message: "Docker container exited with non-zero exit code: 1".into(),
        display_message: String::new(),
    }]);

    let d = normalize(&job, &[alloc], &[], Some(&node()), &opts()).unwrap();
    assert_eq!(d.status, DeploymentStatus::Failed);
    assert_eq!(d.alloc_end, Some(at(1, 10, 30)));
    let msg = d.error_msg.unwrap();
    assert!(msg.contains("`deep-start --jupyter`"), "{msg}");
}

#[test]
fn normalize_failed_keeps_other_messages() {
    let job = raw_job("j5", "erin");
    let mut alloc = raw_allocation("a1", "failed", 10, "dead");
    primary_state(&mut alloc).events = Some(vec![RawTaskEvent {
        message: "image not found".into(),
        display_message: String::new(),
    }]);
    let d = normalize(&job, &[alloc], &[], Some(&node()), &opts()).unwrap();
    assert_eq!(d.error_msg.as_deref(), Some("image not found"));
}

#[test]
fn normalize_failed_prefers_driver_message_over_display_message() {
    let job = raw_job("j5", "erin");
    let mut alloc = raw_allocation("a1", "failed", 10, "dead");
    primary_state(&mut alloc).events = Some(vec![RawTaskEvent {
        message: "Docker container exited with non-zero exit code: 1".into(),
        display_message:
            "Exit Code: 1, Exit Message: \"Docker container exited with non-zero exit code: 1\""
                .into(),
    }]);
    let d = normalize(&job, &[alloc], &[], Some(&node()), &opts()).unwrap();
    let msg = d.error_msg.unwrap();
    assert!(msg.contains("Try to run this"), "{msg}");
    assert!(msg.contains("`deep-start --jupyter`"), "{msg}");
}

#[test]
fn normalize_failed_falls_back_to_display_message() {
    let job = raw_job("j5", "erin");
    let mut alloc = raw_allocation("a1", "failed", 10, "dead");
    primary_state(&mut alloc).events = Some(vec![RawTaskEvent {
        message: String::new(),
        display_message: "Task killed by client".into(),
    }]);
    let d = normalize(&job, &[alloc], &[], Some(&node()), &opts()).unwrap();
    assert_eq!(d.error_msg.as_deref(), Some("Task killed by client"));
}

#[test]
fn normalize_unknown_allocation_is_down_with_network_message() {
    let job = raw_job("j6", "frank");
    let allocs = vec![raw_allocation("a1", "unknown", 10, "running")];
    let d = normalize(&job, &allocs, &[], Some(&node()), &opts()).unwrap();
    assert_eq!(d.status, DeploymentStatus::Down);
    assert!(d.error_msg.unwrap().contains("network"));
}

#[test]
fn normalize_dead_job_drops_network_message_of_down_allocation() {
    let mut job = raw_job("j6", "frank");
    job.status = "dead".into();
    let allocs = vec![raw_allocation("a1", "unknown", 10, "running")];
    let d = normalize(&job, &allocs, &[], Some(&node()), &opts()).unwrap();
    assert_eq!(d.status, DeploymentStatus::Dead);
    assert_eq!(d.error_msg, None);
}

#[test]
fn normalize_pending_allocation_is_starting() {
    let job = raw_job("j6", "frank");
    let allocs = vec![raw_allocation("a1", "pending", 10, "pending")];
    let d = normalize(&job, &allocs, &[], Some(&node()), &opts()).unwrap();
    assert_eq!(d.status, DeploymentStatus::Starting);
}

#[test]
fn normalize_running_task_keeps_no_end_time_after_restart() {
    let job = raw_job("j7", "gina");
    let mut alloc = raw_allocation("a1", "running", 10, "running");
    primary_state(&mut alloc).finished_at = Some(rfc3339(at(1, 9, 30)));
    let d = normalize(&job, &[alloc], &[], Some(&node()), &opts()).unwrap();
    assert_eq!(d.alloc_end, None);
}

#[test]
fn normalize_missing_owner_is_validation_error() {
    let mut job = raw_job("j8", "hal");
    job.meta.as_mut().unwrap().remove("owner");
    let err = normalize(&job, &[], &[], None, &opts()).unwrap_err();
    assert_eq!(
        err,
        ValidationError::MissingField {
            job_id: "j8".into(),
            field: "Meta.owner",
        }
    );
}

#[test]
fn normalize_missing_primary_task_is_validation_error() {
    let job = raw_job("j9", "ivy");
    let options = NormalizerOptions {
        primary_task: "maintask".into(),
        ..opts()
    };
    let err = normalize(&job, &[], &[], None, &options).unwrap_err();
    assert!(matches!(err, ValidationError::MissingPrimaryTask { .. }));
}

#[test]
fn normalize_unrecognized_allocation_status_is_validation_error() {
    let job = raw_job("j10", "jo");
    let allocs = vec![raw_allocation("a1", "evicted", 10, "running")];
    let err = normalize(&job, &allocs, &[], Some(&node()), &opts()).unwrap_err();
    assert!(matches!(err, ValidationError::UnrecognizedStatus { .. }));
}

#[test]
fn normalize_backfills_cpu_num_only_when_enabled() {
    let job = raw_job("j11", "kim");
    let mut alloc = raw_allocation("a1", "running", 10, "running");
    alloc
        .allocated_resources
        .as_mut()
        .unwrap()
        .tasks
        .get_mut("usertask")
        .unwrap()
        .cpu
        .reserved_cores = None;
    let allocs = vec![alloc];

    let d = normalize(&job, &allocs, &[], Some(&node()), &opts()).unwrap();
    assert_eq!(d.resources.cpu_num, 2000);

    let off = NormalizerOptions {
        cpu_num_backfill: false,
        ..opts()
    };
    let d = normalize(&job, &allocs, &[], Some(&node()), &off).unwrap();
    assert_eq!(d.resources.cpu_num, 0);
}

#[tokio::test]
async fn fetch_selects_unknown_allocation_and_resolves_node() {
    let mut scheduler = FakeScheduler::default();
    scheduler.add_job(
        "research",
        raw_job("j1", "alice"),
        vec![
            raw_allocation("complete-10", "complete", 10, "dead"),
            raw_allocation("unknown-20", "unknown", 20, "running"),
            raw_allocation("running-5", "running", 5, "running"),
        ],
    );
    scheduler.nodes.insert("node-1".into(), node());

    let normalizer = DeploymentNormalizer::new(opts(), None);
    let d = normalizer
        .fetch(&scheduler, "research", "j1", false)
        .await
        .unwrap();
    assert_eq!(d.alloc_id.as_deref(), Some("unknown-20"));
    assert_eq!(d.status, DeploymentStatus::Down);
    assert_eq!(d.datacenter.as_deref(), Some("dc-a"));
    assert_eq!(d.resources.cpu_num, 4);
}

#[tokio::test]
async fn fetch_continues_when_node_lookup_fails() {
    let mut scheduler = FakeScheduler::default();
    scheduler.add_job(
        "research",
        raw_job("j1", "alice"),
        vec![raw_allocation("a1", "running", 10, "running")],
    );

    let normalizer = DeploymentNormalizer::new(opts(), None);
    let d = normalizer
        .fetch(&scheduler, "research", "j1", true)
        .await
        .unwrap();
    assert_eq!(d.status, DeploymentStatus::Running);
    assert_eq!(d.datacenter, None);
    assert_eq!(d.endpoints["ide"], "http://ide-j1.${meta.domain}");
}

#[tokio::test]
async fn fetch_unknown_job_is_api_error() {
    let scheduler = FakeScheduler::default();
    let normalizer = DeploymentNormalizer::new(opts(), None);
    let err = normalizer
        .fetch(&scheduler, "research", "missing", false)
        .await
        .unwrap_err();
    assert!(matches!(err, NormalizeError::Api(_)));
}
