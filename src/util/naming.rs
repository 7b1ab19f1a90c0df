//! Naming scheme of local backup files: `db_backup_YYYY_MM_DD_HHMMSS.sql[.gz]`.

use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDateTime;

const BACKUP_PREFIX: &str = "db_backup_";
const TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H%M%S";

static BACKUP_NAME: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^db_backup_\d{4}_\d{2}_\d{2}_\d{6}\.sql(\.gz)?$").unwrap()
});

/// On-disk format of a dump.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpFormat {
    /// Plain SQL as emitted by the dump tool.
    #[default]
    Plain,
    /// Gzip compressed SQL.
    Gzip,
}

impl DumpFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Plain => "sql",
            Self::Gzip => "sql.gz",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Plain => "application/sql",
            Self::Gzip => "application/gzip",
        }
    }

    /// Format of a backup file judging by its name.
    pub fn of_file_name(name: &str) -> Self {
        if name.ends_with(".gz") {
            Self::Gzip
        } else {
            Self::Plain
        }
    }
}

/// File name of a backup taken at `timestamp`.
pub fn backup_file_name(timestamp: NaiveDateTime, format: DumpFormat) -> String {
    format!(
        "{BACKUP_PREFIX}{}.{}",
        timestamp.format(TIMESTAMP_FORMAT),
        format.extension()
    )
}

pub fn is_backup_file_name(name: &str) -> bool {
    BACKUP_NAME.is_match(name)
}

/// Returns if the last component of `path` follows the backup naming scheme.
pub fn is_backup_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(is_backup_file_name)
}
