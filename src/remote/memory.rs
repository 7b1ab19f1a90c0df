//! [RemoteStore] keeping folders and files in memory.

use std::cell::RefCell;
use std::path::Path;

use super::{RemoteError, RemoteFile, RemoteFolder, RemoteStore};

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    folders: Vec<RemoteFolder>,
    files: Vec<(RemoteFile, Vec<u8>)>,
}

impl State {
    fn generate_id(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!("{kind}-{}", self.next_id)
    }
}

/// Storage without network access.
///
/// An [unavailable](Self::unavailable) store fails every request, like a remote
/// store that can't be reached.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RefCell<State>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// All folders in creation order.
    pub fn folders(&self) -> Vec<RemoteFolder> {
        self.state.borrow().folders.clone()
    }

    /// All uploaded files in upload order.
    pub fn files(&self) -> Vec<RemoteFile> {
        self.state
            .borrow()
            .files
            .iter()
            .map(|(file, _)| file.clone())
            .collect()
    }

    /// Content of the uploaded file `id`.
    pub fn content(&self, id: &str) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .files
            .iter()
            .find(|(file, _)| file.id == id)
            .map(|(_, content)| content.clone())
    }

    fn check_available(&self) -> Result<(), RemoteError> {
        if self.unavailable {
            Err(RemoteError::Unavailable("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl RemoteStore for MemoryStore {
    fn find_folder(&self, name: &str, parent_id: &str) -> Result<Option<RemoteFolder>, RemoteError> {
        self.check_available()?;
        Ok(self
            .state
            .borrow()
            .folders
            .iter()
            .find(|folder| folder.name == name && folder.parent_id == parent_id)
            .cloned())
    }

    fn create_folder(&self, name: &str, parent_id: &str) -> Result<RemoteFolder, RemoteError> {
        self.check_available()?;
        let mut state = self.state.borrow_mut();
        let folder = RemoteFolder {
            id: state.generate_id("folder"),
            name: name.to_string(),
            parent_id: parent_id.to_string(),
        };
        state.folders.push(folder.clone());
        Ok(folder)
    }

    fn upload_file(
        &self,
        path: &Path,
        name: &str,
        _mime_type: &str,
        parent_id: Option<&str>,
    ) -> Result<RemoteFile, RemoteError> {
        self.check_available()?;
        let content = std::fs::read(path).map_err(|source| RemoteError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut state = self.state.borrow_mut();
        let file = RemoteFile {
            id: state.generate_id("file"),
            name: name.to_string(),
            parent_id: parent_id.map(str::to_string),
        };
        state.files.push((file.clone(), content));
        Ok(file)
    }
}
