// Report rows: namespace accounting, per-owner usage, daily timeseries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{DateWindow, ResourceTotals, ResourceVector};

/// Namespace accounting over a window, in whole resource-hours (truncated).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceUsage {
    pub namespace: String,
    pub hours: ResourceVector,
    pub jobs: usize,
    pub active_users: usize,
}

/// Usage of one owner within a namespace, in resource-days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerUsage {
    pub owner: String,
    #[serde(flatten)]
    pub days: ResourceTotals,
}

/// One day of a namespace timeseries: mean resources held and mean queue depth per status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRow {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub usage: ResourceVector,
    pub running: u64,
    pub queued: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub window: DateWindow,
    pub namespaces: Vec<NamespaceUsage>,
    /// All namespaces together; users are counted once across namespaces.
    pub total: NamespaceUsage,
    pub owners: Vec<NamespaceOwners>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceOwners {
    pub namespace: String,
    pub owners: Vec<OwnerUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceSeries {
    pub namespace: String,
    pub daily: Vec<DailyRow>,
    pub owners: Vec<OwnerUsage>,
    /// Sum over owners, in resource-days.
    pub total_days: ResourceTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesReport {
    pub window: DateWindow,
    pub namespaces: Vec<NamespaceSeries>,
}
