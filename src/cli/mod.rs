use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use crate::util::retention::DEFAULT_RETENTION_DAYS;

/// Dump the database, upload the dump to Google Drive and prune old local backups.
///
/// Every option can be given through its environment variable instead.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Verbosity of the command output.
    #[arg(long)]
    pub verbose: Option<LevelFilter>,

    /// Connection string of the database to dump.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Folder for the local database dumps.
    #[arg(long, env = "BACKUP_DIR", default_value = "backups")]
    pub backup_dir: PathBuf,

    /// Google service-account credential used for uploads.
    #[arg(
        long,
        env = "GDRIVE_SERVICE_ACCOUNT_FILE",
        default_value = "service_account.json"
    )]
    pub service_account_file: PathBuf,

    /// Drive folder holding the folder taxonomy. Uploads go to the account root without it.
    #[arg(long, env = "GDRIVE_FOLDER_ID")]
    pub folder_id: Option<String>,

    /// Days of local backups to keep.
    #[arg(
        long,
        env = "RETENTION_DAYS",
        default_value_t = DEFAULT_RETENTION_DAYS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub retention_days: u32,

    /// TOML file configuring the dump tool and the folder taxonomy.
    ///
    /// Created with the defaults if it doesn't exist yet.
    #[arg(long, env = "BACKUP_CONFIG")]
    pub config: Option<PathBuf>,
}
