//! A complete backup run: ensure the backup directory, dump, upload, prune.
//!
//! ```text
//! EnsureDirectory -> Dump -> Upload -> Prune -> Finished
//!                      \-------- on failure --------/
//! ```
//!
//! A failed dump ends the run; nothing is uploaded or pruned. A failed or skipped
//! upload doesn't keep local retention from running.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use derive_more::Display;

use crate::backends::{BackupFile, DumpError, Dumper};
use crate::config::JobConfig;
use crate::remote::{RemoteFile, RemoteStore, Taxonomy, Uploader};
use crate::util::naming;
use crate::util::retention::Pruner;

/// Steps of a backup run, in order.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum Step {
    #[display("ensure backup directory")]
    EnsureDirectory,
    #[display("dump")]
    Dump,
    #[display("upload")]
    Upload,
    #[display("prune")]
    Prune,
    #[display("finished")]
    Finished,
}

/// What happened to the remote copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Not attempted: no usable credential or nothing to upload.
    Skipped,
    Uploaded(RemoteFile),
    Failed,
}

/// Overall result of a run.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum JobStatus {
    #[display("succeeded")]
    Succeeded,
    /// The dump succeeded, but uploading or pruning didn't.
    #[display("partially succeeded")]
    Partial,
    /// No dump was taken.
    #[display("aborted")]
    Aborted,
}

impl JobStatus {
    /// `0` whenever a dump was taken.
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Succeeded | Self::Partial => ExitCode::SUCCESS,
            Self::Aborted => ExitCode::FAILURE,
        }
    }
}

#[derive(Debug)]
pub struct JobReport {
    /// Steps entered, in order.
    pub steps: Vec<Step>,
    pub backup: Option<BackupFile>,
    pub dump_error: Option<DumpError>,
    pub upload: UploadOutcome,
    pub pruned: Vec<PathBuf>,
    pub prune_failed: bool,
}

impl JobReport {
    fn new() -> Self {
        Self {
            steps: Vec::new(),
            backup: None,
            dump_error: None,
            upload: UploadOutcome::Skipped,
            pruned: Vec::new(),
            prune_failed: false,
        }
    }

    fn enter(&mut self, step: Step) {
        log::debug!(target: "job", "Entering step: {step}");
        self.steps.push(step);
    }

    pub fn status(&self) -> JobStatus {
        if self.backup.is_none() {
            JobStatus::Aborted
        } else if self.upload == UploadOutcome::Failed || self.prune_failed {
            JobStatus::Partial
        } else {
            JobStatus::Succeeded
        }
    }

    fn finish(mut self) -> Self {
        self.enter(Step::Finished);
        log::info!(target: "job", "=== Backup Job Finished ({}) ===", self.status());
        self
    }
}

/// One backup run with its collaborators.
pub struct Job<D, S> {
    config: JobConfig,
    dumper: D,
    /// [None] if uploads are disabled.
    store: Option<S>,
}

impl<D: Dumper, S: RemoteStore> Job<D, S> {
    pub fn new(config: JobConfig, dumper: D, store: Option<S>) -> Self {
        Self {
            config,
            dumper,
            store,
        }
    }

    pub fn run(&self) -> JobReport {
        self.run_at(Local::now())
    }

    /// Runs the job as if it was started at `now`.
    pub fn run_at(&self, now: DateTime<Local>) -> JobReport {
        log::info!(target: "job", "=== Backup Job Started ===");
        let mut report = JobReport::new();

        report.enter(Step::EnsureDirectory);
        if let Err(e) = self.ensure_backup_dir() {
            log::error!(target: "job", "Creating backup directory {} failed: {e}", self.config.backup_dir.display());
            report.dump_error = Some(e.into());
            return report.finish();
        }

        report.enter(Step::Dump);
        match self.dump(now) {
            Ok(backup) => report.backup = Some(backup),
            Err(e) => {
                log::error!(target: "job", "Database dump failed: {e}");
                report.dump_error = Some(e);
                return report.finish();
            }
        }

        report.enter(Step::Upload);
        report.upload = self.upload();

        report.enter(Step::Prune);
        match Pruner::new(&self.config.backup_dir, self.config.retention).prune(SystemTime::from(now)) {
            Ok(pruned) => {
                log::info!(target: "job", "Deleted {} old backup(s)", pruned.len());
                report.pruned = pruned;
            }
            Err(e) => {
                log::error!(target: "job", "Cleaning up old backups failed: {e}");
                report.prune_failed = true;
            }
        }

        report.finish()
    }

    fn ensure_backup_dir(&self) -> std::io::Result<()> {
        let backup_dir = &self.config.backup_dir;
        if !backup_dir.is_dir() {
            fs::create_dir_all(backup_dir)?;
            log::info!(target: "job", "Created backup directory: {}", backup_dir.display());
        }
        Ok(())
    }

    fn dump(&self, now: DateTime<Local>) -> Result<BackupFile, DumpError> {
        let connection = self
            .config
            .database_url
            .as_ref()
            .ok_or(DumpError::MissingConnectionString)?;

        let file_name = naming::backup_file_name(now.naive_local(), self.config.dump.format);
        let out_path = self.config.backup_dir.join(file_name);
        self.dumper.dump(connection, &out_path)?;

        Ok(BackupFile::from_path(out_path)?)
    }

    fn upload(&self) -> UploadOutcome {
        let Some(store) = &self.store else {
            log::info!(target: "job", "No usable Google Drive credential, upload skipped");
            return UploadOutcome::Skipped;
        };

        let folder_id = match &self.config.root_folder_id {
            Some(root_id) => {
                let taxonomy = Taxonomy::new(root_id, &self.config.taxonomy);
                let ids = taxonomy.ensure(store);
                match ids.get(&self.config.taxonomy.backups_folder) {
                    Some(id) => Some(id.clone()),
                    None => {
                        log::error!(
                            target: "job",
                            "Backups folder '{}' is unavailable, upload skipped",
                            self.config.taxonomy.backups_folder
                        );
                        return UploadOutcome::Failed;
                    }
                }
            }
            None => {
                log::debug!(target: "job", "No root folder configured, uploading without parent");
                None
            }
        };

        match Uploader::new(&self.config.backup_dir).upload(store, folder_id.as_deref()) {
            Ok(Some(file)) => UploadOutcome::Uploaded(file),
            Ok(None) => UploadOutcome::Skipped,
            Err(e) => {
                log::error!(target: "job", "Google Drive upload failed: {e}");
                UploadOutcome::Failed
            }
        }
    }
}
