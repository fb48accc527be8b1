// Import of snapshot directories written by earlier pollers: one `<timestamp>.json` file
// per poll, holding `{namespace: [deployment, ...]}`.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::SnapshotRepo;
use crate::models::time::parse_snapshot_key;
use crate::models::{NamespaceDeployments, Snapshot};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    /// Already stored under the same timestamp.
    pub skipped: usize,
    /// Files whose name is not a snapshot timestamp.
    pub ignored: usize,
}

pub(super) async fn import_dir(repo: &SnapshotRepo, dir: &Path) -> anyhow::Result<ImportSummary> {
    let mut files: Vec<(String, PathBuf)> = Vec::new();
    let mut summary = ImportSummary::default();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        files.push((stem.to_string(), path.clone()));
    }
    // Keys sort chronologically.
    files.sort();

    for (stem, path) in files {
        let Some(timestamp) = parse_snapshot_key(&stem) else {
            debug!(file = %path.display(), "not a snapshot file, ignored");
            summary.ignored += 1;
            continue;
        };
        if repo.contains(&timestamp).await? {
            summary.skipped += 1;
            continue;
        }
        let data = std::fs::read_to_string(&path)?;
        let namespaces: NamespaceDeployments = serde_json::from_str(&data)
            .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
        repo.save(&Snapshot::new(timestamp, namespaces)).await?;
        summary.imported += 1;
    }

    if summary.ignored > 0 {
        warn!(ignored = summary.ignored, dir = %dir.display(), "files without a snapshot timestamp name were ignored");
    }
    info!(
        imported = summary.imported,
        skipped = summary.skipped,
        "legacy snapshot import complete"
    );
    Ok(summary)
}
