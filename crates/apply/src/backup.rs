//! Pre-apply snapshots and explicit restore.
//!
//! Before the applier mutates anything, every `.md` under the graph root
//! is copied into a timestamped scratch directory beside the root. Clean
//! completion removes it; an applier failure leaves it for `restore`.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

use graphscribe_core::{EnrichError, BACKUP_DIR_PREFIX};

/// Relative paths of every `.md` document under `dir`, skipping dot
/// entries and nested backup directories.
fn collect_markdown(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![PathBuf::new()];

    while let Some(rel) = pending.pop() {
        let abs = dir.join(&rel);
        let Ok(entries) = std::fs::read_dir(&abs) else { continue };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || name.starts_with(BACKUP_DIR_PREFIX) {
                continue;
            }
            let rel_child = rel.join(&name);
            if entry.path().is_dir() {
                pending.push(rel_child);
            } else if name.ends_with(".md") {
                found.push(rel_child);
            }
        }
    }

    found.sort();
    found
}

/// Snapshot the graph's markdown into a fresh scratch directory next to
/// the root. Returns the backup path.
pub fn create_backup(root: &Path) -> Result<PathBuf, EnrichError> {
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let parent = root.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let backup_dir = parent.join(format!("{BACKUP_DIR_PREFIX}{stamp}"));
    std::fs::create_dir_all(&backup_dir)?;

    let mut copied = 0usize;
    for rel in collect_markdown(root) {
        let target = backup_dir.join(&rel);
        if let Some(target_parent) = target.parent() {
            std::fs::create_dir_all(target_parent)?;
        }
        std::fs::copy(root.join(&rel), &target)?;
        copied += 1;
    }

    info!(backup = %backup_dir.display(), files = copied, "backup created");
    Ok(backup_dir)
}

/// Remove a scratch directory after clean completion. Best-effort.
pub fn remove_backup(backup_dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(backup_dir) {
        warn!(backup = %backup_dir.display(), "backup cleanup failed: {e}");
    }
}

/// Newest backup beside the root, by directory name (the timestamp sorts
/// lexicographically).
pub fn find_latest_backup(root: &Path) -> Option<PathBuf> {
    let parent = root.parent()?;
    let mut backups: Vec<PathBuf> = std::fs::read_dir(parent)
        .ok()?
        .flatten()
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with(BACKUP_DIR_PREFIX)
        })
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    backups.sort();
    backups.pop()
}

/// Copy every file present in the backup back over the graph. Files the
/// backup does not know about are untouched. Returns the restore count.
pub fn restore_backup(root: &Path, backup_dir: &Path) -> Result<usize, EnrichError> {
    if !backup_dir.is_dir() {
        return Err(EnrichError::GraphPath(backup_dir.display().to_string()));
    }

    let mut restored = 0usize;
    for rel in collect_markdown(backup_dir) {
        let target = root.join(&rel);
        if let Some(target_parent) = target.parent() {
            std::fs::create_dir_all(target_parent)?;
        }
        std::fs::copy(backup_dir.join(&rel), &target)?;
        restored += 1;
    }

    info!(backup = %backup_dir.display(), files = restored, "backup restored");
    Ok(restored)
}
