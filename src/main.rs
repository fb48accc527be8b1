use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use cluster_accounting::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

use cluster_accounting::accounting::AccountingOptions;
use cluster_accounting::collector::Collector;
use cluster_accounting::config::AppConfig;
use cluster_accounting::models::DateWindow;
use cluster_accounting::normalizer::{DeploymentNormalizer, EndpointProber, NormalizerOptions};
use cluster_accounting::scheduler_repo::SchedulerRepo;
use cluster_accounting::snapshot_repo::SnapshotRepo;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[derive(Parser)]
#[command(
    name = "cluster-accounting",
    about = "Deployment snapshots and resource usage reports for a scheduler cluster",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take one snapshot of all configured namespaces and store it
    Snapshot,
    /// Take snapshots periodically until interrupted
    Watch,
    /// Resource-hours, jobs and users per namespace, plus per-owner resource-days
    Usage(ReportArgs),
    /// Daily usage and queue depth per namespace, plus per-owner resource-days
    Summarize(ReportArgs),
    /// Import a directory of `<timestamp>.json` snapshot files
    Import { dir: PathBuf },
}

#[derive(Args)]
struct ReportArgs {
    /// First day of the period (YYYY-MM-DD). Defaults to the first stored snapshot.
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last day of the period, inclusive (YYYY-MM-DD). Defaults to the last stored snapshot.
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Emit JSON instead of text tables
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let app_config = AppConfig::load()?;
    let snapshot_repo = Arc::new(SnapshotRepo::connect(&app_config.snapshots.database_path).await?);
    snapshot_repo.init().await?;

    match cli.command {
        Commands::Snapshot => {
            let collector = build_collector(&app_config)?;
            let snapshot = collector.take_snapshot().await;
            snapshot_repo.save(&snapshot).await?;
        }
        Commands::Watch => watch(&app_config, snapshot_repo).await?,
        Commands::Usage(args) => {
            let window = resolve_window(&snapshot_repo, args.start, args.end).await?;
            let snapshots = snapshot_repo.load_range(&window.start, &window.end).await?;
            let ledger = accounting::integrate(&snapshots, &window, &accounting_options(&app_config))?;
            let report = ledger.usage_report();
            if args.json {
                println!("{}", report::to_json(&report)?);
            } else {
                print!("{}", report::render_usage(&report));
            }
        }
        Commands::Summarize(args) => {
            let window = resolve_window(&snapshot_repo, args.start, args.end).await?;
            let snapshots = snapshot_repo.load_range(&window.start, &window.end).await?;
            let report =
                timeseries::summarize(&snapshots, &window, &accounting_options(&app_config))?;
            if args.json {
                println!("{}", report::to_json(&report)?);
            } else {
                print!("{}", report::render_timeseries(&report));
            }
        }
        Commands::Import { dir } => {
            let summary = snapshot_repo.import_legacy_dir(&dir).await?;
            println!(
                "imported {} snapshots ({} already stored, {} files ignored)",
                summary.imported, summary.skipped, summary.ignored
            );
        }
    }

    Ok(())
}

fn accounting_options(config: &AppConfig) -> AccountingOptions {
    AccountingOptions {
        cpu_num_backfill: config.compat.cpu_num_backfill,
    }
}

fn build_collector(config: &AppConfig) -> Result<Collector<SchedulerRepo>> {
    let api = SchedulerRepo::connect(&config.scheduler)?;
    let prober = if config.probing.enabled {
        Some(EndpointProber::new(
            Duration::from_millis(config.probing.timeout_ms),
            config.probing.max_concurrency,
        )?)
    } else {
        None
    };
    let normalizer = DeploymentNormalizer::new(
        NormalizerOptions {
            primary_task: config.scheduler.primary_task.clone(),
            cpu_num_backfill: config.compat.cpu_num_backfill,
        },
        prober,
    );
    Ok(Collector::new(
        api,
        normalizer,
        config.scheduler.namespaces.clone(),
        config.scheduler.job_prefix.clone(),
    ))
}

/// Explicit dates cover whole days. Without a start date the window opens at the first
/// stored snapshot; without an end date it closes at the end of the last snapshot's day.
async fn resolve_window(
    repo: &SnapshotRepo,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<DateWindow> {
    let window = match (start, end) {
        (Some(start), Some(end)) => DateWindow::days(start, end),
        _ => {
            let Some((first, last)) = repo.bounds().await? else {
                anyhow::bail!("no snapshots stored; pass --start and --end or take a snapshot first");
            };
            let end = end.unwrap_or_else(|| last.date_naive());
            match start {
                Some(start) => DateWindow::days(start, end),
                None => DateWindow::from_instant(first, end),
            }
        }
    };
    anyhow::ensure!(
        window.start <= window.end,
        "start date {} is after end date {}",
        window.start_date(),
        window.end_date()
    );
    Ok(window)
}

async fn watch(config: &AppConfig, snapshot_repo: Arc<SnapshotRepo>) -> Result<()> {
    let schedule = worker::SnapshotSchedule::from_config(
        config.snapshots.interval_secs,
        config.snapshots.schedule.as_deref(),
    )?;
    let collector = Arc::new(build_collector(config)?);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    tracing::info!(
        app = version::NAME,
        version = version::VERSION,
        namespaces = ?config.scheduler.namespaces,
        "Snapshot worker started"
    );
    let worker_handle = worker::spawn(
        worker::WorkerDeps {
            collector,
            snapshot_repo,
            shutdown_rx,
        },
        schedule,
    );

    shutdown_signal().await;
    tracing::info!("Received shutdown signal");
    let _ = shutdown_tx.send(());
    let _ = worker_handle.await;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
