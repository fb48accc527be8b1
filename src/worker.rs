// Background snapshot worker: take a snapshot on a fixed interval or a cron schedule and
// append it to the store. Failures are logged and the loop keeps going.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::time::{Duration, interval};
use tracing::Instrument;

use crate::collector::Collector;
use crate::scheduler_repo::SchedulerApi;
use crate::snapshot_repo::SnapshotRepo;

/// When to take snapshots.
#[derive(Debug, Clone)]
pub enum SnapshotSchedule {
    Every(Duration),
    /// Cron expression, evaluated in UTC.
    Cron(cron::Schedule),
}

impl SnapshotSchedule {
    /// Cron expression when given, else the fixed interval.
    pub fn from_config(interval_secs: u64, cron_expr: Option<&str>) -> anyhow::Result<Self> {
        match cron_expr {
            Some(expr) => Ok(Self::Cron(cron::Schedule::from_str(expr).map_err(|e| {
                anyhow::anyhow!("invalid snapshot schedule {expr:?}: {e}")
            })?)),
            None => Ok(Self::Every(Duration::from_secs(interval_secs))),
        }
    }
}

pub struct WorkerDeps<S> {
    pub collector: Arc<Collector<S>>,
    pub snapshot_repo: Arc<SnapshotRepo>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

pub fn spawn<S>(deps: WorkerDeps<S>, schedule: SnapshotSchedule) -> tokio::task::JoinHandle<()>
where
    S: SchedulerApi + 'static,
{
    let WorkerDeps {
        collector,
        snapshot_repo,
        shutdown_rx,
    } = deps;

    tokio::spawn(
        run(collector, snapshot_repo, schedule, shutdown_rx)
            .instrument(tracing::debug_span!("snapshot_worker")),
    )
}

async fn run<S: SchedulerApi>(
    collector: Arc<Collector<S>>,
    snapshot_repo: Arc<SnapshotRepo>,
    schedule: SnapshotSchedule,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut snapshots_saved_total: u64 = 0;
    match schedule {
        SnapshotSchedule::Every(period) => {
            let mut tick = interval(period);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        if run_once(&collector, &snapshot_repo).await {
                            snapshots_saved_total += 1;
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        }
        SnapshotSchedule::Cron(schedule) => loop {
            let now = Utc::now();
            let Some(next) = schedule.after(&now).next() else {
                tracing::warn!("snapshot schedule has no upcoming run; worker stopping");
                break;
            };
            let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if run_once(&collector, &snapshot_repo).await {
                        snapshots_saved_total += 1;
                    }
                }
                _ = &mut shutdown_rx => break,
            }
        },
    }
    tracing::debug!(snapshots_saved_total, "Snapshot worker shutting down");
}

/// Takes and saves one snapshot; returns whether it was stored.
pub async fn run_once<S: SchedulerApi>(
    collector: &Collector<S>,
    snapshot_repo: &SnapshotRepo,
) -> bool {
    let snapshot = collector.take_snapshot().await;
    match snapshot_repo.save(&snapshot).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                error = %e,
                operation = "save",
                taken_at = %snapshot.key(),
                "Failed to save snapshot"
            );
            false
        }
    }
}
