//! [RemoteStore] backed by the Google Drive v3 REST API.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Body, Client, Response};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};

use super::auth::{Authenticator, ServiceAccount, DRIVE_SCOPE};
use super::{RemoteError, RemoteFile, RemoteFolder, RemoteStore, API_TIMEOUT};

const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Google Drive, authenticated as a service account.
#[derive(Debug)]
pub struct DriveStore {
    client: Client,
    auth: Authenticator,
}

impl DriveStore {
    pub fn new(account: ServiceAccount) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(None::<Duration>).build()?;
        let auth = Authenticator::new(account, DRIVE_SCOPE);

        Ok(Self { client, auth })
    }

    /// Sets up a [DriveStore] with the credential at `credential_file`.
    ///
    /// Returns [None] if the credential is absent or unusable, in which case
    /// uploads are skipped.
    pub fn connect(credential_file: &Path) -> Option<Self> {
        if !credential_file.exists() {
            log::warn!(
                target: "remote::drive",
                "Google Drive service account file not found at {}. Skipping upload.",
                credential_file.display()
            );
            return None;
        }

        match ServiceAccount::from_file(credential_file).and_then(Self::new) {
            Ok(store) => Some(store),
            Err(e) => {
                log::error!(target: "remote::drive", "Loading the Google Drive credential failed: {e}. Skipping upload.");
                None
            }
        }
    }
}

/// Turns unsuccessful responses into [RemoteError::Api].
pub(super) fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().unwrap_or_default();
    Err(RemoteError::Api {
        status: status.as_u16(),
        message: message.trim().to_string(),
    })
}

/// Drive search query for a non-trashed folder `name` directly below `parent_id`.
fn folder_query(name: &str, parent_id: &str) -> String {
    format!(
        "mimeType='{FOLDER_MIME_TYPE}' and name='{}' and '{}' in parents and trashed=false",
        escape_query(name),
        escape_query(parent_id)
    )
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[derive(Debug, serde::Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, serde::Deserialize)]
struct DriveFile {
    id: String,
    name: Option<String>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct NewFile<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parents: Vec<&'a str>,
}

impl RemoteStore for DriveStore {
    fn find_folder(&self, name: &str, parent_id: &str) -> Result<Option<RemoteFolder>, RemoteError> {
        let token = self.auth.token(&self.client)?;
        let query = folder_query(name, parent_id);
        log::trace!(target: "remote::drive", "Searching folders: {query}");

        let response = self
            .client
            .get(FILES_URL)
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id, name)"),
                ("spaces", "drive"),
            ])
            .timeout(API_TIMEOUT)
            .send()?;
        let list: FileList = check_status(response)?.json()?;

        Ok(list.files.into_iter().next().map(|file| RemoteFolder {
            id: file.id,
            name: file.name.unwrap_or_else(|| name.to_string()),
            parent_id: parent_id.to_string(),
        }))
    }

    fn create_folder(&self, name: &str, parent_id: &str) -> Result<RemoteFolder, RemoteError> {
        let token = self.auth.token(&self.client)?;
        let metadata = NewFile {
            name,
            mime_type: Some(FOLDER_MIME_TYPE),
            parents: vec![parent_id],
        };

        let response = self
            .client
            .post(FILES_URL)
            .bearer_auth(token)
            .query(&[("fields", "id, name")])
            .json(&metadata)
            .timeout(API_TIMEOUT)
            .send()?;
        let created: DriveFile = check_status(response)?.json()?;

        Ok(RemoteFolder {
            id: created.id,
            name: name.to_string(),
            parent_id: parent_id.to_string(),
        })
    }

    fn upload_file(
        &self,
        path: &Path,
        name: &str,
        mime_type: &str,
        parent_id: Option<&str>,
    ) -> Result<RemoteFile, RemoteError> {
        let read_error = |source| RemoteError::Read {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(read_error)?;
        let size = file.metadata().map_err(read_error)?.len();

        let token = self.auth.token(&self.client)?;
        let metadata = NewFile {
            name,
            mime_type: None,
            parents: parent_id.into_iter().collect(),
        };

        // open a resumable session, then stream the file into it
        let response = self
            .client
            .post(UPLOAD_URL)
            .bearer_auth(&token)
            .query(&[("uploadType", "resumable"), ("fields", "id, name")])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", size)
            .json(&metadata)
            .timeout(API_TIMEOUT)
            .send()?;
        let response = check_status(response)?;
        let session_uri = response
            .headers()
            .get(LOCATION)
            .and_then(|location| location.to_str().ok())
            .ok_or(RemoteError::MissingField("upload session location"))?
            .to_string();
        log::debug!(target: "remote::drive", "Opened upload session for {name} ({size} bytes)");

        let response = self
            .client
            .put(session_uri)
            .bearer_auth(&token)
            .header(CONTENT_TYPE, mime_type)
            .header(CONTENT_LENGTH, size)
            .body(Body::sized(file, size))
            .send()?;
        let uploaded: DriveFile = check_status(response)?.json()?;

        Ok(RemoteFile {
            id: uploaded.id,
            name: uploaded.name.unwrap_or_else(|| name.to_string()),
            parent_id: parent_id.map(str::to_string),
        })
    }
}
