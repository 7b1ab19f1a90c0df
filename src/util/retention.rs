//! Age based retention of local backups.

use std::fs::{self, DirEntry};
use std::io;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::util::naming;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Default number of days a local backup is kept.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Configure retention of local backups.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Retention {
    /// Maximum age in days a backup may reach before it is deleted.
    pub days: u32,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl Retention {
    pub fn new(days: u32) -> Self {
        Self { days }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(u64::from(self.days) * SECS_PER_DAY)
    }

    /// Returns if a backup last modified at `modified` is to be retained at `now`.
    ///
    /// Modification times in the future are always retained.
    pub fn retain(&self, modified: SystemTime, now: SystemTime) -> bool {
        now.duration_since(modified)
            .map_or(true, |age| age <= self.window())
    }
}

/// Deletes stale backups from a single directory.
#[derive(Clone, Debug)]
pub struct Pruner {
    backup_dir: PathBuf,
    retention: Retention,
}

impl Pruner {
    pub fn new(backup_dir: impl Into<PathBuf>, retention: Retention) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            retention,
        }
    }

    /// Deletes every backup older than the retention window at `now`.
    ///
    /// Only regular files directly inside the backup directory that follow the
    /// naming scheme are considered. A missing directory yields nothing to delete.
    /// Returns the paths that were removed.
    pub fn prune(&self, now: SystemTime) -> io::Result<Vec<PathBuf>> {
        log::info!(target: "retention", "Cleaning up local backups older than {} days", self.retention.days);

        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!(target: "retention", "Backup directory {} does not exist", self.backup_dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        Ok(entries
            .filter_map(|entry| self.prune_entry(entry, now))
            .collect())
    }

    /// Deletes a single directory entry if it is a stale backup, returning its path.
    fn prune_entry(&self, entry: io::Result<DirEntry>, now: SystemTime) -> Option<PathBuf> {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!(target: "retention", "Reading {} failed: {e}", self.backup_dir.display());
                return None;
            }
        };
        let path = entry.path();
        if !naming::is_backup_file(&path) {
            return None;
        }

        // symlinks are reported as such and skipped
        let modified = entry
            .metadata()
            .and_then(|metadata| {
                if metadata.is_file() {
                    metadata.modified().map(Some)
                } else {
                    Ok(None)
                }
            });
        match modified {
            Ok(Some(modified)) if !self.retention.retain(modified, now) => {}
            Ok(_) => return None,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!(target: "retention", "{} vanished before inspection", path.display());
                return None;
            }
            Err(e) => {
                log::warn!(target: "retention", "Inspecting {} failed: {e}", path.display());
                return None;
            }
        }

        log::info!(target: "retention", "Deleting old backup: {}", path.display());
        match fs::remove_file(&path) {
            Ok(()) => Some(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!(target: "retention", "{} vanished before deletion", path.display());
                None
            }
            Err(e) => {
                log::warn!(target: "retention", "Deleting {} failed: {e}", path.display());
                None
            }
        }
    }
}
