//! Backend modules producing database dumps.
//!
//! Currently the following backends are implemented:
//!
//! - [PgDump]: Plain or compressed dump of a PostgreSQL database using `pg_dump`.

pub mod postgres;

pub use postgres::PgDump;

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::{Duration, SystemTime};

use derive_more::{Display, Error, From};

const REDACTED: &str = "[redacted]";

/// Generic dump backend.
pub trait Dumper {
    /// Dumps the database behind `connection` into the new file `out_path`.
    ///
    /// On error no file is left at `out_path`.
    fn dump(&self, connection: &ConnectionString, out_path: &Path) -> Result<(), DumpError>;
}

/// Database connection string.
///
/// May contain credentials, so neither [Debug] nor [Display](fmt::Display) reveal it.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString(String);

impl ConnectionString {
    /// Returns [None] for a blank connection string.
    pub fn new(connection: impl Into<String>) -> Option<Self> {
        let connection = connection.into();
        if connection.trim().is_empty() {
            None
        } else {
            Some(Self(connection))
        }
    }

    /// The plain connection string, to be handed to the dump tool only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Replaces every occurrence of the connection string in `text`.
    pub fn redact<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if text.contains(self.expose()) {
            Cow::Owned(text.replace(self.expose(), REDACTED))
        } else {
            Cow::Borrowed(text)
        }
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionString").field(&REDACTED).finish()
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

#[derive(Debug, Display, Error, From)]
/// Errors on creating a database dump.
pub enum DumpError {
    /// No connection string configured.
    #[display("database connection string is not set")]
    MissingConnectionString,
    /// The directory of the dump file doesn't exist.
    #[display("backup directory {} does not exist", _0.display())]
    MissingDirectory(#[error(ignore)] PathBuf),
    /// The dump tool couldn't be started.
    #[display("failed to start {}: {source}", program.display())]
    Spawn { program: PathBuf, source: io::Error },
    /// The dump tool exited unsuccessfully.
    #[display("dump process exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
    /// The dump tool didn't finish in time and was killed.
    #[display("dump process did not finish within {_0:?}")]
    TimedOut(#[error(ignore)] Duration),
    /// Writing the dump file failed.
    #[display("writing the dump failed: {_0}")]
    #[from]
    Io(io::Error),
}

/// A local backup file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub path: PathBuf,
    /// Creation time, or modification time where the filesystem doesn't track creation.
    pub created: SystemTime,
    pub size: u64,
}

impl BackupFile {
    pub fn from_path(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let metadata = path.metadata()?;
        let created = metadata.created().or_else(|_| metadata.modified())?;

        Ok(Self {
            path,
            created,
            size: metadata.len(),
        })
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }
}
