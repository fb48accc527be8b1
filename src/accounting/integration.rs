// Step-function integration primitive shared by the namespace and owner ledgers.

use chrono::{DateTime, Utc};

use crate::models::{DeploymentStatus, NormalizedDeployment};

/// How one deployment observation enters the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Integrate over `[alloc_start, alloc_end]` clipped to the snapshot interval.
    Integrate {
        alloc_start: DateTime<Utc>,
        alloc_end: Option<DateTime<Utc>>,
    },
    /// Never held resources (queued, error, starting, down, or terminal before placement).
    Skip,
    /// Window fields contradict the status; excluded and reported once per job.
    Malformed(Malformation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformation {
    RunningWithoutStart,
    TerminalWithoutEnd,
}

impl Malformation {
    pub fn describe(&self) -> &'static str {
        match self {
            Malformation::RunningWithoutStart => "running with no alloc_start",
            Malformation::TerminalWithoutEnd => "terminal with no alloc_end",
        }
    }
}

pub fn classify(deployment: &NormalizedDeployment) -> Eligibility {
    match deployment.status {
        DeploymentStatus::Running => match deployment.alloc_start {
            Some(alloc_start) => Eligibility::Integrate {
                alloc_start,
                alloc_end: None,
            },
            None => Eligibility::Malformed(Malformation::RunningWithoutStart),
        },
        status if status.is_terminal() => match (deployment.alloc_start, deployment.alloc_end) {
            // Failed before ever being placed.
            (None, _) => Eligibility::Skip,
            (Some(_), None) => Eligibility::Malformed(Malformation::TerminalWithoutEnd),
            (Some(alloc_start), Some(alloc_end)) => Eligibility::Integrate {
                alloc_start,
                alloc_end: Some(alloc_end),
            },
        },
        _ => Eligibility::Skip,
    }
}

/// Overlap of the allocation window with `(previous, current]`, in seconds, clamped at zero.
/// A still-running job (`alloc_end == None`) is taken as active through `current`.
pub fn overlap_seconds(
    previous: DateTime<Utc>,
    current: DateTime<Utc>,
    alloc_start: DateTime<Utc>,
    alloc_end: Option<DateTime<Utc>>,
) -> f64 {
    let start = previous.max(alloc_start);
    let end = alloc_end.map_or(current, |e| current.min(e));
    let millis = (end - start).num_milliseconds();
    (millis.max(0) as f64) / 1000.0
}

/// Same as `overlap_seconds`, but also says whether the clamp was hit.
pub(super) fn clamped_overlap(
    previous: DateTime<Utc>,
    current: DateTime<Utc>,
    alloc_start: DateTime<Utc>,
    alloc_end: Option<DateTime<Utc>>,
) -> (f64, bool) {
    let start = previous.max(alloc_start);
    let end = alloc_end.map_or(current, |e| current.min(e));
    (overlap_seconds(previous, current, alloc_start, alloc_end), end < start)
}
