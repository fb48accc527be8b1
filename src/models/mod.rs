// Domain models: raw scheduler payloads, normalized deployments, snapshots, reports

mod deployment;
pub mod raw;
mod report;
mod resources;
mod snapshot;
pub mod time;

pub use deployment::{DeploymentStatus, NormalizedDeployment};
pub use report::{
    DailyRow, NamespaceOwners, NamespaceSeries, NamespaceUsage, OwnerUsage, TimeseriesReport,
    UsageReport,
};
pub use resources::{Resource, ResourceTotals, ResourceVector};
pub use snapshot::{DateWindow, NamespaceDeployments, Snapshot};
