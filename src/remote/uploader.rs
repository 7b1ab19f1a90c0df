//! Uploads the newest local backup.

use std::fs;
use std::io;
use std::path::PathBuf;

use super::{RemoteError, RemoteFile, RemoteStore};
use crate::backends::BackupFile;
use crate::util::naming::{self, DumpFormat};

#[derive(Debug, Clone)]
pub struct Uploader {
    backup_dir: PathBuf,
}

impl Uploader {
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
        }
    }

    /// The most recently created backup in the backup directory.
    pub fn latest_backup(&self) -> io::Result<Option<BackupFile>> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut latest: Option<BackupFile> = None;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !naming::is_backup_file(&path) || !entry.file_type()?.is_file() {
                continue;
            }

            let backup = BackupFile::from_path(path)?;
            let newer = latest
                .as_ref()
                .is_none_or(|l| (backup.created, &backup.path) > (l.created, &l.path));
            if newer {
                latest = Some(backup);
            }
        }

        Ok(latest)
    }

    /// Uploads the newest backup into `folder_id`.
    ///
    /// Returns [None] if there is no backup to upload.
    pub fn upload<S: RemoteStore + ?Sized>(
        &self,
        store: &S,
        folder_id: Option<&str>,
    ) -> Result<Option<RemoteFile>, RemoteError> {
        let latest = self.latest_backup().map_err(|source| RemoteError::Read {
            path: self.backup_dir.clone(),
            source,
        })?;
        let Some(backup) = latest else {
            log::warn!(target: "remote::uploader", "No backup files found to upload in {}", self.backup_dir.display());
            return Ok(None);
        };
        let Some(name) = backup.file_name() else {
            return Ok(None);
        };

        log::info!(target: "remote::uploader", "Uploading {name} ({} bytes)...", backup.size);
        let mime_type = DumpFormat::of_file_name(name).mime_type();
        let file = store.upload_file(&backup.path, name, mime_type, folder_id)?;
        log::info!(target: "remote::uploader", "Upload complete. File ID: {}", file.id);

        Ok(Some(file))
    }
}
