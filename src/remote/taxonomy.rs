//! Fixed folder structure below a root folder.

use std::collections::BTreeMap;

use super::RemoteStore;

const DEFAULT_FOLDERS: [&str; 4] = ["00_Admin", "01_Funds", "02_Portfolio", "99_Backups"];
const DEFAULT_BACKUPS_FOLDER: &str = "99_Backups";

/// Names of the folders expected below the root folder.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TaxonomyConfig {
    /// Folders ensured directly below the root, in order.
    pub folders: Vec<String>,
    /// Folder receiving the uploads. Always ensured.
    pub backups_folder: String,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            folders: DEFAULT_FOLDERS.map(String::from).to_vec(),
            backups_folder: DEFAULT_BACKUPS_FOLDER.to_string(),
        }
    }
}

/// Folder name to remote id.
pub type FolderIds = BTreeMap<String, String>;

/// Ensures the configured folders exist below a root folder.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    root_id: String,
    folders: Vec<String>,
}

impl Taxonomy {
    pub fn new(root_id: impl Into<String>, config: &TaxonomyConfig) -> Self {
        let mut folders: Vec<String> = Vec::with_capacity(config.folders.len() + 1);
        for name in config.folders.iter().chain([&config.backups_folder]) {
            if !folders.contains(name) {
                folders.push(name.clone());
            }
        }

        Self {
            root_id: root_id.into(),
            folders,
        }
    }

    pub fn folders(&self) -> &[String] {
        &self.folders
    }

    /// Finds or creates every folder, returning the ids of those that could be resolved.
    ///
    /// A folder that fails is logged and left out; the others are still processed.
    pub fn ensure<S: RemoteStore + ?Sized>(&self, store: &S) -> FolderIds {
        log::info!(target: "remote::taxonomy", "Verifying folder taxonomy...");

        let mut ids = FolderIds::new();
        for name in &self.folders {
            match store.ensure_folder(name, &self.root_id) {
                Ok(folder) => {
                    ids.insert(name.clone(), folder.id);
                }
                Err(e) => {
                    log::error!(target: "remote::taxonomy", "Ensuring folder '{name}' failed: {e}");
                }
            }
        }

        ids
    }
}
