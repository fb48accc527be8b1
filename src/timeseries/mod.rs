// Daily rollups: per-namespace mean usage and queue depth, per-owner resource-days.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::warn;

use crate::accounting::{AccountingOptions, ensure_increasing};
use crate::error::SequencingError;
use crate::models::{
    DailyRow, DateWindow, DeploymentStatus, NamespaceSeries, OwnerUsage, ResourceTotals,
    Snapshot, TimeseriesReport,
};

/// Sums for one namespace over one day.
#[derive(Debug, Default)]
struct DayAccumulator {
    /// Snapshots of the day in which the namespace was observed.
    observed: usize,
    usage: ResourceTotals,
    running: usize,
    queued: usize,
}

#[derive(Debug, Default)]
struct NamespaceAccumulator {
    days: BTreeMap<NaiveDate, DayAccumulator>,
    /// Running resources per owner per day, summed over snapshots.
    owners: BTreeMap<String, BTreeMap<NaiveDate, ResourceTotals>>,
}

/// Builds the daily series over `window`.
///
/// Namespace rows average over the snapshots in which the namespace was observed (a
/// snapshot where it held nothing counts as a zero row). Owner figures divide each day's
/// sum by the number of snapshots taken that day overall, so snapshots where the owner had
/// nothing running count as zero; the daily means are then summed into resource-days.
pub fn summarize(
    snapshots: &[Snapshot],
    window: &DateWindow,
    options: &AccountingOptions,
) -> Result<TimeseriesReport, SequencingError> {
    ensure_increasing(snapshots)?;

    let mut snapshots_per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    let mut namespaces: BTreeMap<String, NamespaceAccumulator> = BTreeMap::new();
    let mut backfilled: BTreeSet<String> = BTreeSet::new();

    for snapshot in snapshots.iter().filter(|s| window.contains(&s.timestamp)) {
        let date = snapshot.timestamp.date_naive();
        *snapshots_per_day.entry(date).or_default() += 1;

        for (namespace, deployments) in &snapshot.namespaces {
            let acc = namespaces.entry(namespace.clone()).or_default();
            let day = acc.days.entry(date).or_default();
            day.observed += 1;

            for deployment in deployments {
                match deployment.status {
                    DeploymentStatus::Running => {
                        day.running += 1;
                        let mut resources = deployment.resources;
                        if options.cpu_num_backfill
                            && resources.backfill_cpu_num()
                            && backfilled.insert(deployment.job_id.clone())
                        {
                            warn!(
                                namespace = %namespace,
                                job_id = %deployment.job_id,
                                "cpu_num reported as 0; backfilled from cpu_MHz"
                            );
                        }
                        day.usage.add_scaled(&resources, 1.0);
                        acc.owners
                            .entry(deployment.owner.clone())
                            .or_default()
                            .entry(date)
                            .or_default()
                            .add_scaled(&resources, 1.0);
                    }
                    DeploymentStatus::Queued => {
                        day.queued += 1;
                        // Queued owners are listed, with nothing held.
                        acc.owners.entry(deployment.owner.clone()).or_default();
                    }
                    _ => {}
                }
            }
        }
    }

    let series = namespaces
        .into_iter()
        .map(|(namespace, acc)| namespace_series(namespace, acc, &snapshots_per_day))
        .collect();

    Ok(TimeseriesReport {
        window: *window,
        namespaces: series,
    })
}

fn namespace_series(
    namespace: String,
    acc: NamespaceAccumulator,
    snapshots_per_day: &BTreeMap<NaiveDate, usize>,
) -> NamespaceSeries {
    let daily = acc
        .days
        .iter()
        .map(|(date, day)| {
            let n = day.observed.max(1) as f64;
            DailyRow {
                date: *date,
                usage: day.usage.divided(n).rounded(),
                running: (day.running as f64 / n).round() as u64,
                queued: (day.queued as f64 / n).round() as u64,
            }
        })
        .collect();

    let owners: Vec<OwnerUsage> = acc
        .owners
        .iter()
        .map(|(owner, per_day)| {
            let mut days = ResourceTotals::default();
            for (date, sum) in per_day {
                let taken = snapshots_per_day.get(date).copied().unwrap_or(1).max(1);
                days.add(&sum.divided(taken as f64));
            }
            OwnerUsage {
                owner: owner.clone(),
                days,
            }
        })
        .collect();

    let mut total_days = ResourceTotals::default();
    for owner in &owners {
        total_days.add(&owner.days);
    }

    NamespaceSeries {
        namespace,
        daily,
        owners,
        total_days,
    }
}
