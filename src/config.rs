//! Configuration of a backup run.
//!
//! [JobConfig] is the single value handed to the [Job](crate::job::Job). It is assembled
//! from the command line / environment ([Cli]) and an optional TOML file ([FileConfig]).

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_more::{Display, Error, From};

use crate::backends::ConnectionString;
use crate::cli::Cli;
use crate::remote::taxonomy::TaxonomyConfig;
use crate::util::naming::DumpFormat;
use crate::util::retention::Retention;

const DEFAULT_DUMP_PROGRAM: &str = "pg_dump";
const DEFAULT_DUMP_TIMEOUT_SECS: u64 = 2 * 60 * 60;

/// Everything a backup run needs to know.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Database to dump. The dump step fails without it.
    pub database_url: Option<ConnectionString>,
    /// Directory of the local backups.
    pub backup_dir: PathBuf,
    /// Service-account credential used for uploads.
    pub credential_file: PathBuf,
    /// Root folder of the remote taxonomy. Without it, uploads have no parent folder.
    pub root_folder_id: Option<String>,
    pub retention: Retention,
    pub taxonomy: TaxonomyConfig,
    pub dump: DumpConfig,
}

impl JobConfig {
    pub fn new(cli: Cli, file: FileConfig) -> Self {
        Self {
            database_url: cli.database_url.and_then(ConnectionString::new),
            backup_dir: cli.backup_dir,
            credential_file: cli.service_account_file,
            root_folder_id: cli.folder_id.filter(|id| !id.trim().is_empty()),
            retention: Retention::new(cli.retention_days),
            taxonomy: file.taxonomy,
            dump: file.dump,
        }
    }
}

/// Settings read from the optional TOML configuration file.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub dump: DumpConfig,
    pub taxonomy: TaxonomyConfig,
}

/// How the dump tool is invoked.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    /// Dump executable, looked up in `PATH` if relative.
    pub program: PathBuf,
    /// Extra arguments placed before the connection string.
    pub args: Vec<String>,
    pub format: DumpFormat,
    /// Seconds after which a running dump is killed.
    pub timeout_secs: u64,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_DUMP_PROGRAM),
            args: Vec::new(),
            format: DumpFormat::default(),
            timeout_secs: DEFAULT_DUMP_TIMEOUT_SECS,
        }
    }
}

impl DumpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Display, Error, From)]
/// Errors on loading the configuration file.
pub enum ConfigError {
    /// The file exists but can't be read.
    #[display("reading {} failed: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    /// The file isn't valid TOML for a [FileConfig].
    #[display("parsing the config file failed: {_0}")]
    #[from]
    Parse(toml::de::Error),
}

impl FileConfig {
    /// Reads the config at `path`.
    ///
    /// A missing file is created with the default configuration, which is returned.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(config_str) => Ok(toml::from_str(&config_str)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!(
                    "Writing default config to {} because it doesn't exist yet",
                    path.display()
                );
                let default_config = Self::default();
                match toml::to_string_pretty(&default_config) {
                    Ok(config_str) => {
                        if let Err(e) = std::fs::write(path, config_str) {
                            log::warn!("Writing default config to {} failed {e}", path.display());
                        }
                    }
                    Err(e) => log::warn!("Serializing the default config failed: {e}"),
                }

                Ok(default_config)
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
