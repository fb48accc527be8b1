// Snapshot (one poll of all namespaces) and report window models

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::NormalizedDeployment;
use super::time::{end_of_day, snapshot_key, start_of_day};

/// Deployments per namespace, as persisted for one snapshot.
pub type NamespaceDeployments = BTreeMap<String, Vec<NormalizedDeployment>>;

/// One point-in-time poll. A namespace that was scanned and held nothing maps to an empty
/// list; a namespace that could not be scanned is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub namespaces: NamespaceDeployments,
}

impl Snapshot {
    pub fn new(timestamp: DateTime<Utc>, namespaces: NamespaceDeployments) -> Self {
        Self {
            timestamp,
            namespaces,
        }
    }

    /// Store key, e.g. `2024-03-01T06:00:00`.
    pub fn key(&self) -> String {
        snapshot_key(&self.timestamp)
    }

    pub fn deployment_count(&self) -> usize {
        self.namespaces.values().map(Vec::len).sum()
    }
}

/// Inclusive report window `[start, end]`; `end` is the last second of its day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    /// Whole days: `start_date` 00:00:00 through `end_date` 23:59:59.
    pub fn days(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start: start_of_day(start_date),
            end: end_of_day(end_date),
        }
    }

    /// Starts at an exact instant (e.g. the first stored snapshot) and runs to the end of
    /// `end_date`.
    pub fn from_instant(start: DateTime<Utc>, end_date: NaiveDate) -> Self {
        Self {
            start,
            end: end_of_day(end_date),
        }
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.start <= *ts && *ts <= self.end
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date_naive()
    }
}
