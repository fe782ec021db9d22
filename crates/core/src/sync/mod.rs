pub mod drive;

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::domain::{is_image_name, SyncReport};
use crate::error::{Error, Result};

/// An entry inside a remote folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
    pub is_folder: bool,
}

/// Remote folder-tree storage.
pub trait RemoteStore {
    /// Id of a folder named `name` anywhere in the store, if one exists.
    fn find_folder(&mut self, name: &str) -> Result<Option<String>>;

    fn list_children(&mut self, parent_id: &str) -> Result<Vec<RemoteEntry>>;

    /// Create a folder and return its id.
    fn create_folder(&mut self, name: &str, parent_id: &str) -> Result<String>;

    /// Upload a file under its local filename and return the new id.
    fn upload_file(&mut self, local: &Path, parent_id: &str) -> Result<String>;
}

/// Mirror `<local_root>/<source>/<image>` into `<folder_name>/<source>/<image>`.
///
/// A remote file counts as present when a file of the same name exists in the
/// matching remote folder; contents are never compared. If `folder_name`
/// cannot be found remotely the whole pass is skipped.
pub fn mirror(
    store: &mut dyn RemoteStore,
    local_root: &Path,
    folder_name: &str,
) -> Result<SyncReport> {
    if !local_root.is_dir() {
        return Err(Error::SourceNotFound(local_root.to_path_buf()));
    }

    let mut report = SyncReport::default();
    let Some(parent_id) = store.find_folder(folder_name)? else {
        warn!(folder = folder_name, "Remote parent folder not found; skipping sync");
        return Ok(report);
    };
    report.parent_found = true;
    debug!(folder = folder_name, id = %parent_id, "Found remote parent folder");

    let existing_folders = store.list_children(&parent_id)?;

    for source_dir in list_sorted(local_root, |p| p.is_dir())? {
        let Some(source) = source_dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let folder_id = match existing_folders
            .iter()
            .find(|e| e.is_folder && e.name == source)
        {
            Some(entry) => {
                debug!(source, "Found existing remote subfolder");
                entry.id.clone()
            }
            None => {
                let id = store.create_folder(source, &parent_id)?;
                info!(source, "Created remote subfolder");
                report.folders_created += 1;
                id
            }
        };

        let remote_names: HashSet<String> = store
            .list_children(&folder_id)?
            .into_iter()
            .map(|e| e.name)
            .collect();

        for file in list_sorted(&source_dir, |p| p.is_file())? {
            let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !is_image_name(name) {
                continue;
            }
            if remote_names.contains(name) {
                debug!(source, file = name, "Skipped (already exists)");
                report.skipped += 1;
                continue;
            }
            store.upload_file(&file, &folder_id)?;
            info!(source, file = name, "Uploaded");
            report.uploaded += 1;
        }
    }

    info!(
        uploaded = report.uploaded,
        skipped = report.skipped,
        folders_created = report.folders_created,
        "Sync complete"
    );
    Ok(report)
}

fn list_sorted(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<std::path::PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let path = entry?.into_path();
        if keep(&path) {
            paths.push(path);
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    /// In-memory store: folder id → entries.
    #[derive(Default)]
    struct MemoryStore {
        roots: HashMap<String, String>,
        children: HashMap<String, Vec<RemoteEntry>>,
        uploads: usize,
        next_id: usize,
    }

    impl MemoryStore {
        fn with_root(name: &str) -> Self {
            let mut store = Self::default();
            store.roots.insert(name.to_string(), "root".to_string());
            store
        }

        fn alloc(&mut self) -> String {
            self.next_id += 1;
            format!("id{}", self.next_id)
        }
    }

    impl RemoteStore for MemoryStore {
        fn find_folder(&mut self, name: &str) -> Result<Option<String>> {
            Ok(self.roots.get(name).cloned())
        }

        fn list_children(&mut self, parent_id: &str) -> Result<Vec<RemoteEntry>> {
            Ok(self.children.get(parent_id).cloned().unwrap_or_default())
        }

        fn create_folder(&mut self, name: &str, parent_id: &str) -> Result<String> {
            let id = self.alloc();
            self.children
                .entry(parent_id.to_string())
                .or_default()
                .push(RemoteEntry {
                    id: id.clone(),
                    name: name.to_string(),
                    is_folder: true,
                });
            Ok(id)
        }

        fn upload_file(&mut self, local: &Path, parent_id: &str) -> Result<String> {
            let id = self.alloc();
            let name = local.file_name().unwrap().to_string_lossy().to_string();
            self.children
                .entry(parent_id.to_string())
                .or_default()
                .push(RemoteEntry {
                    id: id.clone(),
                    name,
                    is_folder: false,
                });
            self.uploads += 1;
            Ok(id)
        }
    }

    fn local_tree() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        for (source, files) in [
            ("kitchen", vec!["20240101_080000.jpg", "20240101_090000.png", "notes.txt"]),
            ("nursery", vec!["20240301_070000.jpg"]),
        ] {
            let dir = tmp.path().join(source);
            fs::create_dir_all(&dir).unwrap();
            for f in files {
                fs::write(dir.join(f), b"x").unwrap();
            }
        }
        fs::write(tmp.path().join("stray.jpg"), b"x").unwrap();
        tmp
    }

    #[test]
    fn test_mirror_creates_folders_and_uploads_images() {
        let tmp = local_tree();
        let mut store = MemoryStore::with_root("BabyCarePhotos");

        let report = mirror(&mut store, tmp.path(), "BabyCarePhotos").unwrap();

        assert!(report.parent_found);
        assert_eq!(report.folders_created, 2);
        assert_eq!(report.uploaded, 3);
        assert_eq!(report.skipped, 0);
        assert_eq!(store.uploads, 3);
    }

    #[test]
    fn test_second_mirror_uploads_nothing() {
        let tmp = local_tree();
        let mut store = MemoryStore::with_root("BabyCarePhotos");
        mirror(&mut store, tmp.path(), "BabyCarePhotos").unwrap();

        let report = mirror(&mut store, tmp.path(), "BabyCarePhotos").unwrap();

        assert_eq!(report.uploaded, 0);
        assert_eq!(report.folders_created, 0);
        assert_eq!(report.skipped, 3);
        assert_eq!(store.uploads, 3);
    }

    #[test]
    fn test_new_local_file_is_uploaded_on_next_pass() {
        let tmp = local_tree();
        let mut store = MemoryStore::with_root("BabyCarePhotos");
        mirror(&mut store, tmp.path(), "BabyCarePhotos").unwrap();

        fs::write(tmp.path().join("nursery/20240301_071000.jpg"), b"y").unwrap();
        let report = mirror(&mut store, tmp.path(), "BabyCarePhotos").unwrap();

        assert_eq!(report.uploaded, 1);
    }

    #[test]
    fn test_missing_parent_folder_skips_sync() {
        let tmp = local_tree();
        let mut store = MemoryStore::default();

        let report = mirror(&mut store, tmp.path(), "BabyCarePhotos").unwrap();

        assert!(!report.parent_found);
        assert_eq!(report.uploaded, 0);
        assert_eq!(store.uploads, 0);
        assert!(store.children.is_empty());
    }

    #[test]
    fn test_missing_local_root_is_error() {
        let mut store = MemoryStore::with_root("x");
        assert!(mirror(&mut store, Path::new("/nonexistent/root"), "x").is_err());
    }
}
