// Resource accounting: folds an ordered snapshot sequence into resource-seconds per
// namespace and per (namespace, owner).

mod integration;

pub use integration::{Eligibility, Malformation, classify, overlap_seconds};

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::SequencingError;
use crate::models::{
    DateWindow, NamespaceOwners, NamespaceUsage, OwnerUsage, ResourceTotals, Snapshot,
    UsageReport,
};

const SECONDS_PER_HOUR: f64 = 3600.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy)]
pub struct AccountingOptions {
    pub cpu_num_backfill: bool,
}

impl Default for AccountingOptions {
    fn default() -> Self {
        Self {
            cpu_num_backfill: true,
        }
    }
}

/// Record-level data problem: compensated or skipped, reported once per job id per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataQualityWarning {
    CpuBackfilled { namespace: String, job_id: String },
    MalformedWindow {
        namespace: String,
        job_id: String,
        kind: Malformation,
    },
}

impl DataQualityWarning {
    pub fn job_id(&self) -> &str {
        match self {
            DataQualityWarning::CpuBackfilled { job_id, .. }
            | DataQualityWarning::MalformedWindow { job_id, .. } => job_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceLedger {
    pub resource_seconds: ResourceTotals,
    pub jobs: BTreeSet<String>,
    pub owners: BTreeSet<String>,
}

/// Transient result of one `integrate` run.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountingLedger {
    pub window: DateWindow,
    /// Every namespace observed in the window, including those that held nothing.
    pub namespaces: BTreeMap<String, NamespaceLedger>,
    /// Resource-seconds per (namespace, owner).
    pub owners: BTreeMap<(String, String), ResourceTotals>,
    pub warnings: Vec<DataQualityWarning>,
}

/// Integrates `snapshots` over `window`. A job's resources seen at snapshot `S_i` are held
/// constant over `(S_{i-1}, S_i]`, with `S_{-1}` the window start. Snapshots outside the
/// window are ignored; timestamps must be strictly increasing.
pub fn integrate(
    snapshots: &[Snapshot],
    window: &DateWindow,
    options: &AccountingOptions,
) -> Result<AccountingLedger, SequencingError> {
    ensure_increasing(snapshots)?;

    let mut ledger = AccountingLedger {
        window: *window,
        namespaces: BTreeMap::new(),
        owners: BTreeMap::new(),
        warnings: Vec::new(),
    };
    let mut reported: BTreeSet<(&'static str, String)> = BTreeSet::new();
    let mut previous = window.start;

    for snapshot in snapshots.iter().filter(|s| window.contains(&s.timestamp)) {
        for (namespace, deployments) in &snapshot.namespaces {
            let ns_ledger = ledger.namespaces.entry(namespace.clone()).or_default();
            for deployment in deployments {
                let (alloc_start, alloc_end) = match classify(deployment) {
                    Eligibility::Integrate {
                        alloc_start,
                        alloc_end,
                    } => (alloc_start, alloc_end),
                    Eligibility::Skip => continue,
                    Eligibility::Malformed(kind) => {
                        if reported.insert(("window", deployment.job_id.clone())) {
                            warn!(
                                namespace = %namespace,
                                job_id = %deployment.job_id,
                                snapshot = %snapshot.key(),
                                problem = kind.describe(),
                                "ignoring deployment with malformed allocation window"
                            );
                            ledger.warnings.push(DataQualityWarning::MalformedWindow {
                                namespace: namespace.clone(),
                                job_id: deployment.job_id.clone(),
                                kind,
                            });
                        }
                        continue;
                    }
                };

                let mut resources = deployment.resources;
                if options.cpu_num_backfill
                    && resources.backfill_cpu_num()
                    && reported.insert(("cpu", deployment.job_id.clone()))
                {
                    warn!(
                        namespace = %namespace,
                        job_id = %deployment.job_id,
                        cpu_num = resources.cpu_num,
                        "cpu_num reported as 0; backfilled from cpu_MHz"
                    );
                    ledger.warnings.push(DataQualityWarning::CpuBackfilled {
                        namespace: namespace.clone(),
                        job_id: deployment.job_id.clone(),
                    });
                }

                let (seconds, clamped) = integration::clamped_overlap(
                    previous,
                    snapshot.timestamp,
                    alloc_start,
                    alloc_end,
                );
                if clamped {
                    debug!(
                        namespace = %namespace,
                        job_id = %deployment.job_id,
                        snapshot = %snapshot.key(),
                        "allocation window ended before the previous snapshot; no contribution"
                    );
                }

                ns_ledger.resource_seconds.add_scaled(&resources, seconds);
                ns_ledger.jobs.insert(deployment.job_id.clone());
                ns_ledger.owners.insert(deployment.owner.clone());
                ledger
                    .owners
                    .entry((namespace.clone(), deployment.owner.clone()))
                    .or_default()
                    .add_scaled(&resources, seconds);
            }
        }
        previous = snapshot.timestamp;
    }

    Ok(ledger)
}

pub(crate) fn ensure_increasing(snapshots: &[Snapshot]) -> Result<(), SequencingError> {
    let mut last: Option<DateTime<Utc>> = None;
    for snapshot in snapshots {
        if let Some(previous) = last
            && snapshot.timestamp <= previous
        {
            return Err(SequencingError {
                previous,
                current: snapshot.timestamp,
            });
        }
        last = Some(snapshot.timestamp);
    }
    Ok(())
}

impl AccountingLedger {
    /// Namespace hours (truncated), distinct jobs and users, the all-namespace total, and
    /// per-owner resource-days.
    pub fn usage_report(&self) -> UsageReport {
        let namespaces: Vec<NamespaceUsage> = self
            .namespaces
            .iter()
            .map(|(namespace, ns)| NamespaceUsage {
                namespace: namespace.clone(),
                hours: ns
                    .resource_seconds
                    .divided(SECONDS_PER_HOUR)
                    .truncated(),
                jobs: ns.jobs.len(),
                active_users: ns.owners.len(),
            })
            .collect();

        let users: BTreeSet<&String> = self.namespaces.values().flat_map(|ns| &ns.owners).collect();
        let total = NamespaceUsage {
            namespace: "total".to_string(),
            hours: namespaces
                .iter()
                .fold(Default::default(), |acc, ns| ns.hours.saturating_add(&acc)),
            jobs: namespaces.iter().map(|ns| ns.jobs).sum(),
            active_users: users.len(),
        };

        let owners = self
            .namespaces
            .keys()
            .map(|namespace| NamespaceOwners {
                namespace: namespace.clone(),
                owners: self.owner_days(namespace),
            })
            .collect();

        UsageReport {
            window: self.window,
            namespaces,
            total,
            owners,
        }
    }

    /// Owners of `namespace` with their usage in resource-days, by owner name.
    pub fn owner_days(&self, namespace: &str) -> Vec<OwnerUsage> {
        self.owners
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|((_, owner), seconds)| OwnerUsage {
                owner: owner.clone(),
                days: seconds.divided(SECONDS_PER_DAY),
            })
            .collect()
    }
}
