use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub snapshots: SnapshotsConfig,
    #[serde(default)]
    pub probing: ProbingConfig,
    #[serde(default)]
    pub compat: CompatConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Base URL of the scheduler HTTP API, e.g. `https://scheduler.example.org:4646`.
    pub address: String,
    #[serde(default)]
    pub token: Option<String>,
    pub namespaces: Vec<String>,
    /// Only jobs whose name starts with this prefix are user deployments.
    #[serde(default = "default_job_prefix")]
    pub job_prefix: String,
    #[serde(default = "default_primary_task")]
    pub primary_task: String,
    #[serde(default)]
    pub tls_insecure: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_job_prefix() -> String {
    "userjob".into()
}

fn default_primary_task() -> String {
    "usertask".into()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotsConfig {
    pub database_path: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Cron expression (UTC, with seconds field). Takes precedence over `interval_secs`.
    #[serde(default)]
    pub schedule: Option<String>,
}

fn default_interval_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for ProbingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_ms: default_probe_timeout_ms(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_max_concurrency() -> usize {
    16
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompatConfig {
    /// Older jobs report the CPU clock share in place of the core count; copy it over.
    #[serde(default = "default_true")]
    pub cpu_num_backfill: bool,
}

impl Default for CompatConfig {
    fn default() -> Self {
        Self {
            cpu_num_backfill: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading config {path}: {e}"))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.scheduler.address.is_empty(),
            "scheduler.address must be non-empty"
        );
        anyhow::ensure!(
            !self.scheduler.namespaces.is_empty(),
            "scheduler.namespaces must list at least one namespace"
        );
        anyhow::ensure!(
            self.scheduler.namespaces.iter().all(|ns| !ns.is_empty()),
            "scheduler.namespaces must not contain empty names"
        );
        anyhow::ensure!(
            !self.scheduler.primary_task.is_empty(),
            "scheduler.primary_task must be non-empty"
        );
        anyhow::ensure!(
            self.scheduler.request_timeout_secs > 0,
            "scheduler.request_timeout_secs must be > 0, got {}",
            self.scheduler.request_timeout_secs
        );
        anyhow::ensure!(
            !self.snapshots.database_path.is_empty(),
            "snapshots.database_path must be non-empty"
        );
        anyhow::ensure!(
            self.snapshots.interval_secs > 0,
            "snapshots.interval_secs must be > 0, got {}",
            self.snapshots.interval_secs
        );
        if let Some(expr) = &self.snapshots.schedule {
            cron::Schedule::from_str(expr).map_err(|e| {
                anyhow::anyhow!("snapshots.schedule is not a valid cron expression: {e}")
            })?;
        }
        anyhow::ensure!(
            self.probing.timeout_ms > 0,
            "probing.timeout_ms must be > 0, got {}",
            self.probing.timeout_ms
        );
        anyhow::ensure!(
            self.probing.max_concurrency > 0,
            "probing.max_concurrency must be > 0, got {}",
            self.probing.max_concurrency
        );
        Ok(())
    }
}
