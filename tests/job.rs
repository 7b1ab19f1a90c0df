use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local, TimeZone};
use db_backup_lib::backends::{ConnectionString, DumpError, Dumper};
use db_backup_lib::config::{DumpConfig, JobConfig};
use db_backup_lib::job::{Job, JobStatus, Step, UploadOutcome};
use db_backup_lib::remote::taxonomy::TaxonomyConfig;
use db_backup_lib::remote::MemoryStore;
use db_backup_lib::util::retention::Retention;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Writes a fixed dump, or fails like a crashed dump tool.
struct FakeDumper {
    fail: bool,
}

impl FakeDumper {
    fn succeeding() -> Self {
        Self { fail: false }
    }

    fn failing() -> Self {
        Self { fail: true }
    }
}

impl Dumper for FakeDumper {
    fn dump(&self, connection: &ConnectionString, out_path: &Path) -> Result<(), DumpError> {
        assert_eq!(connection.expose(), "postgres://localhost/app");
        if self.fail {
            return Err(io::Error::other("pg_dump: connection refused").into());
        }
        fs::write(out_path, "SELECT 1;\n")?;
        Ok(())
    }
}

fn config(backup_dir: &Path, root_folder_id: Option<&str>) -> JobConfig {
    JobConfig {
        database_url: ConnectionString::new("postgres://localhost/app"),
        backup_dir: backup_dir.to_path_buf(),
        credential_file: backup_dir.join("service_account.json"),
        root_folder_id: root_folder_id.map(str::to_string),
        retention: Retention::new(30),
        taxonomy: TaxonomyConfig::default(),
        dump: DumpConfig::default(),
    }
}

fn new_year_noon() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).single().unwrap()
}

fn old_backup(dir: &Path, name: &str, age: Duration) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
    path
}

#[test]
fn uploads_into_new_backups_folder() {
    let dir = tempfile::tempdir().unwrap();
    let backup_dir = dir.path().join("backups");
    let store = MemoryStore::new();
    let job = Job::new(
        config(&backup_dir, Some("root")),
        FakeDumper::succeeding(),
        Some(store),
    );

    let report = job.run_at(new_year_noon());

    let backup = report.backup.as_ref().unwrap();
    assert_eq!(
        backup.path,
        backup_dir.join("db_backup_2024_01_01_120000.sql")
    );
    assert_eq!(report.status(), JobStatus::Succeeded);
    assert_eq!(
        report.steps,
        [
            Step::EnsureDirectory,
            Step::Dump,
            Step::Upload,
            Step::Prune,
            Step::Finished
        ]
    );

    let UploadOutcome::Uploaded(file) = &report.upload else {
        panic!("unexpected upload outcome: {:?}", report.upload);
    };
    assert_eq!(file.name, "db_backup_2024_01_01_120000.sql");
    assert!(!file.id.is_empty());
}

#[test]
fn taxonomy_is_created_once_and_receives_the_upload() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let backups = TaxonomyConfig::default().backups_folder;

    let job = Job::new(config(dir.path(), Some("root")), FakeDumper::succeeding(), Some(&store));
    let report = job.run_at(new_year_noon());

    let folders = store.folders();
    let backups_folders: Vec<_> = folders.iter().filter(|f| f.name == backups).collect();
    assert_eq!(backups_folders.len(), 1);
    assert_eq!(folders.len(), 4);

    let files = store.files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].parent_id.as_deref(), Some(backups_folders[0].id.as_str()));
    assert_eq!(report.upload, UploadOutcome::Uploaded(files[0].clone()));
    assert_eq!(store.content(&files[0].id).unwrap(), b"SELECT 1;\n");

    // a later run reuses every folder
    let later = Local.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).single().unwrap();
    job.run_at(later);
    assert_eq!(store.folders(), folders);
    assert_eq!(store.files().len(), 2);
}

#[test]
fn uploads_without_parent_when_no_root_is_configured() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();

    let job = Job::new(config(dir.path(), None), FakeDumper::succeeding(), Some(&store));
    let report = job.run_at(new_year_noon());

    assert_eq!(report.status(), JobStatus::Succeeded);
    assert!(store.folders().is_empty());
    assert_eq!(store.files()[0].parent_id, None);
}

#[test]
fn failed_dump_skips_upload_and_prune() {
    let dir = tempfile::tempdir().unwrap();
    let stale = old_backup(dir.path(), "db_backup_2020_01_01_000000.sql", 400 * DAY);
    let store = MemoryStore::new();

    let job = Job::new(config(dir.path(), Some("root")), FakeDumper::failing(), Some(&store));
    let report = job.run();

    assert_eq!(report.status(), JobStatus::Aborted);
    assert!(matches!(report.dump_error, Some(DumpError::Io(_))));
    assert_eq!(report.steps, [Step::EnsureDirectory, Step::Dump, Step::Finished]);
    assert!(store.folders().is_empty());
    assert!(store.files().is_empty());
    assert!(stale.exists());
}

#[test]
fn missing_connection_string_aborts_before_dumping() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), None);
    config.database_url = None;
    let dumper = FakeDumper::succeeding();

    let job: Job<_, MemoryStore> = Job::new(config, dumper, None);
    let report = job.run();

    assert_eq!(report.status(), JobStatus::Aborted);
    assert!(matches!(
        report.dump_error,
        Some(DumpError::MissingConnectionString)
    ));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn missing_credential_skips_upload_but_prunes() {
    let dir = tempfile::tempdir().unwrap();
    let stale = old_backup(dir.path(), "db_backup_2020_01_01_000000.sql", 40 * DAY);

    let job: Job<_, MemoryStore> = Job::new(config(dir.path(), Some("root")), FakeDumper::succeeding(), None);
    let report = job.run();

    assert_eq!(report.status(), JobStatus::Succeeded);
    assert_eq!(report.upload, UploadOutcome::Skipped);
    assert_eq!(report.pruned, [stale.clone()]);
    assert!(!stale.exists());
}

#[test]
fn failed_upload_still_prunes() {
    let dir = tempfile::tempdir().unwrap();
    let fresh = old_backup(dir.path(), "db_backup_2020_03_01_000000.sql", 5 * DAY);
    let stale = old_backup(dir.path(), "db_backup_2020_02_01_000000.sql", 40 * DAY);
    let ancient = old_backup(dir.path(), "db_backup_2020_01_01_000000.sql", 100 * DAY);

    let job = Job::new(
        config(dir.path(), Some("root")),
        FakeDumper::succeeding(),
        Some(MemoryStore::unavailable()),
    );
    let report = job.run();

    assert_eq!(report.upload, UploadOutcome::Failed);
    assert_eq!(report.status(), JobStatus::Partial);
    assert!(fresh.exists());
    assert!(!stale.exists());
    assert!(!ancient.exists());
    assert!(report.backup.unwrap().path.exists());
}

#[test]
fn creates_missing_backup_directory() {
    let dir = tempfile::tempdir().unwrap();
    let backup_dir = dir.path().join("nested/backups");

    let job: Job<_, MemoryStore> = Job::new(config(&backup_dir, None), FakeDumper::succeeding(), None);
    let report = job.run();

    assert_eq!(report.status(), JobStatus::Succeeded);
    assert!(backup_dir.is_dir());
    assert_eq!(fs::read_dir(&backup_dir).unwrap().count(), 1);
}
