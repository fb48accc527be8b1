// SQLite snapshot store. One row per poll, keyed by its second-precision UTC timestamp;
// rows are never updated once written.

mod legacy;

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::instrument;

use crate::models::time::{parse_snapshot_key, snapshot_key};
use crate::models::{NamespaceDeployments, Snapshot};

pub use legacy::ImportSummary;

/// Layout of the `data` column. Bump when `NormalizedDeployment` changes incompatibly.
pub(crate) const FORMAT_VERSION: i64 = 1;

pub struct SnapshotRepo {
    pool: SqlitePool,
}

impl SnapshotRepo {
    pub async fn connect(path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                taken_at TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL,
                format_version INTEGER NOT NULL,
                data TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Appends one snapshot. A snapshot already stored under the same key is an error.
    #[instrument(
        skip(self, snapshot),
        fields(repo = "snapshots", operation = "save", taken_at = %snapshot.key())
    )]
    pub async fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let key = snapshot.key();
        let data = serde_json::to_string(&snapshot.namespaces)?;
        let created_at = Utc::now().timestamp_millis();
        let result = sqlx::query(
            "INSERT OR IGNORE INTO snapshots (taken_at, created_at, format_version, data) VALUES ($1, $2, $3, $4)",
        )
        .bind(&key)
        .bind(created_at)
        .bind(FORMAT_VERSION)
        .bind(&data)
        .execute(&self.pool)
        .await?;
        anyhow::ensure!(
            result.rows_affected() == 1,
            "snapshot {key} already stored; snapshots are append-only"
        );
        Ok(())
    }

    pub async fn contains(&self, timestamp: &DateTime<Utc>) -> anyhow::Result<bool> {
        let row = sqlx::query("SELECT 1 FROM snapshots WHERE taken_at = $1")
            .bind(snapshot_key(timestamp))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Stored timestamps in `[from, to]`, ascending.
    #[instrument(skip(self), fields(repo = "snapshots", operation = "list_timestamps"))]
    pub async fn list_timestamps(
        &self,
        from: &DateTime<Utc>,
        to: &DateTime<Utc>,
    ) -> anyhow::Result<Vec<DateTime<Utc>>> {
        let keys = sqlx::query_scalar::<_, String>(
            "SELECT taken_at FROM snapshots WHERE taken_at >= $1 AND taken_at <= $2 ORDER BY taken_at ASC",
        )
        .bind(snapshot_key(from))
        .bind(snapshot_key(to))
        .fetch_all(&self.pool)
        .await?;
        keys.iter().map(|k| parse_key(k)).collect()
    }

    #[instrument(skip(self), fields(repo = "snapshots", operation = "load"))]
    pub async fn load(&self, timestamp: &DateTime<Utc>) -> anyhow::Result<Option<Snapshot>> {
        let row = sqlx::query("SELECT taken_at, format_version, data FROM snapshots WHERE taken_at = $1")
            .bind(snapshot_key(timestamp))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::parse_row).transpose()
    }

    /// Snapshots in `[from, to]`, ascending by timestamp.
    #[instrument(skip(self), fields(repo = "snapshots", operation = "load_range"))]
    pub async fn load_range(
        &self,
        from: &DateTime<Utc>,
        to: &DateTime<Utc>,
    ) -> anyhow::Result<Vec<Snapshot>> {
        let rows = sqlx::query(
            "SELECT taken_at, format_version, data FROM snapshots
             WHERE taken_at >= $1 AND taken_at <= $2 ORDER BY taken_at ASC",
        )
        .bind(snapshot_key(from))
        .bind(snapshot_key(to))
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(Self::parse_row(row)?);
        }
        Ok(out)
    }

    /// First and last stored timestamps; `None` when the store is empty.
    pub async fn bounds(&self) -> anyhow::Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let row = sqlx::query("SELECT MIN(taken_at) AS first, MAX(taken_at) AS last FROM snapshots")
            .fetch_one(&self.pool)
            .await?;
        let first: Option<String> = row.try_get("first")?;
        let last: Option<String> = row.try_get("last")?;
        match (first, last) {
            (Some(first), Some(last)) => Ok(Some((parse_key(&first)?, parse_key(&last)?))),
            _ => Ok(None),
        }
    }

    pub async fn count(&self) -> anyhow::Result<i64> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM snapshots")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Imports a directory of `<timestamp>.json` files written by earlier pollers.
    /// Timestamps already stored are skipped.
    #[instrument(skip(self, dir), fields(repo = "snapshots", operation = "import_legacy_dir"))]
    pub async fn import_legacy_dir(&self, dir: &Path) -> anyhow::Result<ImportSummary> {
        legacy::import_dir(self, dir).await
    }

    fn parse_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Snapshot> {
        let taken_at: String = row.try_get("taken_at")?;
        let format_version: i64 = row.try_get("format_version")?;
        let data: String = row.try_get("data")?;
        anyhow::ensure!(
            format_version <= FORMAT_VERSION,
            "snapshot {taken_at} has format version {format_version}, newer than supported {FORMAT_VERSION}"
        );
        let namespaces: NamespaceDeployments = serde_json::from_str(&data)
            .map_err(|e| anyhow::anyhow!("snapshot {taken_at}: {e}"))?;
        Ok(Snapshot::new(parse_key(&taken_at)?, namespaces))
    }
}

fn parse_key(key: &str) -> anyhow::Result<DateTime<Utc>> {
    parse_snapshot_key(key).ok_or_else(|| anyhow::anyhow!("malformed snapshot key: {key}"))
}
