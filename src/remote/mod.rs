//! Remote storage of backups.
//!
//! The job talks to storage through the [RemoteStore] trait. [DriveStore] implements it
//! against the Google Drive v3 API, [MemoryStore] keeps everything in memory.

pub mod auth;
pub mod drive;
pub mod memory;
pub mod taxonomy;
pub mod uploader;

pub use drive::DriveStore;
pub use memory::MemoryStore;
pub use taxonomy::Taxonomy;
pub use uploader::Uploader;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_more::{Display, Error, From};

/// Timeout of token and metadata requests; upload bodies run unbounded.
pub(crate) const API_TIMEOUT: Duration = Duration::from_secs(60);

/// A folder in remote storage, identified by name and parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFolder {
    pub id: String,
    pub name: String,
    pub parent_id: String,
}

/// An uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
}

/// Folder-and-file hierarchy storage.
pub trait RemoteStore {
    /// Looks up a non-trashed folder `name` directly below `parent_id`.
    fn find_folder(&self, name: &str, parent_id: &str) -> Result<Option<RemoteFolder>, RemoteError>;

    /// Creates the folder `name` below `parent_id`, even if one exists already.
    fn create_folder(&self, name: &str, parent_id: &str) -> Result<RemoteFolder, RemoteError>;

    /// Uploads the local file at `path` as `name` into `parent_id`, or the root without.
    fn upload_file(
        &self,
        path: &Path,
        name: &str,
        mime_type: &str,
        parent_id: Option<&str>,
    ) -> Result<RemoteFile, RemoteError>;

    /// Returns the folder `name` below `parent_id`, creating it if it doesn't exist.
    ///
    /// Concurrent callers may both create the folder.
    fn ensure_folder(&self, name: &str, parent_id: &str) -> Result<RemoteFolder, RemoteError> {
        if let Some(folder) = self.find_folder(name, parent_id)? {
            log::debug!(target: "remote", "Found folder '{name}' (ID: {})", folder.id);
            return Ok(folder);
        }

        let folder = self.create_folder(name, parent_id)?;
        log::info!(target: "remote", "Created folder '{name}' (ID: {})", folder.id);
        Ok(folder)
    }
}

impl<S: RemoteStore + ?Sized> RemoteStore for &S {
    fn find_folder(&self, name: &str, parent_id: &str) -> Result<Option<RemoteFolder>, RemoteError> {
        (**self).find_folder(name, parent_id)
    }

    fn create_folder(&self, name: &str, parent_id: &str) -> Result<RemoteFolder, RemoteError> {
        (**self).create_folder(name, parent_id)
    }

    fn upload_file(
        &self,
        path: &Path,
        name: &str,
        mime_type: &str,
        parent_id: Option<&str>,
    ) -> Result<RemoteFile, RemoteError> {
        (**self).upload_file(path, name, mime_type, parent_id)
    }
}

#[derive(Debug, Display, Error, From)]
/// Errors on talking to remote storage.
pub enum RemoteError {
    /// The service-account credential can't be read.
    #[display("reading the credential file {} failed: {source}", path.display())]
    Credentials { path: PathBuf, source: io::Error },
    /// The service-account credential isn't valid JSON of the expected shape.
    #[display("credential file is malformed: {_0}")]
    #[from]
    MalformedCredentials(serde_json::Error),
    /// Signing the token request failed, usually due to a bad private key.
    #[display("signing the token request failed: {_0}")]
    #[from]
    Signing(jsonwebtoken::errors::Error),
    /// The request didn't complete.
    #[display("request failed: {_0}")]
    #[from]
    Http(reqwest::Error),
    /// The storage API rejected the request.
    #[display("storage API responded with {status}: {message}")]
    Api { status: u16, message: String },
    /// A response lacks an expected part.
    #[display("response lacks {_0}")]
    MissingField(#[error(ignore)] &'static str),
    /// The local file to upload can't be read.
    #[display("reading {} failed: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    /// The store refuses every request.
    #[display("storage unavailable: {_0}")]
    Unavailable(#[error(ignore)] String),
}
