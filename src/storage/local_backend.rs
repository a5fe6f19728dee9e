use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use crate::error::{BackupError, Result};
use crate::storage::StorageBackend;

/// Storage backend for a local directory using `std::fs` directly.
///
/// Useful as a staging target and for exercising the full pipeline in
/// tests without a remote object store.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a backend rooted at the given directory path.
    pub fn new(root: &str) -> Result<Self> {
        let root_path = PathBuf::from(root);
        // Canonicalize if the path already exists for clearer errors and
        // correct strip_prefix behavior with symlinked roots.
        let root = if root_path.exists() {
            fs::canonicalize(&root_path)?
        } else {
            root_path
        };
        Ok(Self { root })
    }

    /// Reject storage keys that could escape the backend root.
    fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(BackupError::Other("unsafe storage key: empty".into()));
        }
        if key.starts_with('/') || key.starts_with('\\') {
            return Err(BackupError::Other(format!(
                "unsafe storage key: absolute path '{key}'"
            )));
        }
        if key.contains('\\') {
            return Err(BackupError::Other(format!(
                "unsafe storage key: contains backslash '{key}'"
            )));
        }
        for component in Path::new(key).components() {
            if component == Component::ParentDir {
                return Err(BackupError::Other(format!(
                    "unsafe storage key: parent traversal '{key}'"
                )));
            }
        }
        Ok(())
    }

    /// Resolve a `/`-separated storage key to a filesystem path under the root.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        Self::validate_key(key)?;
        Ok(self.root.join(key))
    }

    /// Stream to a temp file in the target directory, then atomically
    /// rename into place so readers never see a partial object.
    fn atomic_write(&self, path: &Path, reader: &mut dyn Read) -> Result<()> {
        let dir = path.parent().unwrap_or(&self.root);
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::copy(reader, &mut tmp)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Recursively list all files under `dir`, adding their paths relative
    /// to `self.root` as `/`-separated keys.
    fn list_recursive(&self, dir: &Path, keys: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.list_recursive(&entry.path(), keys)?;
            } else if file_type.is_file() {
                if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                    let key = rel
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    keys.push(key);
                }
            }
        }
        Ok(())
    }
}

impl StorageBackend for LocalBackend {
    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        // String-prefix match over all keys, same contract as the remote
        // backends: "backups/dai" matches "backups/daily/..." even though
        // no directory of that name exists.
        if !prefix.is_empty() {
            Self::validate_key(prefix)?;
        }
        match fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => {
                let mut keys = Vec::new();
                self.list_recursive(&self.root, &mut keys)?;
                keys.retain(|k| k.starts_with(prefix));
                Ok(keys)
            }
            Ok(_) => Ok(Vec::new()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn put_stream(&self, key: &str, reader: &mut dyn Read, _len: u64) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.atomic_write(&path, reader)
    }

    fn delete_batch(&self, keys: &[String]) -> Result<()> {
        let mut failed: Vec<String> = Vec::new();
        for key in keys {
            let path = match self.resolve(key) {
                Ok(p) => p,
                Err(_) => {
                    failed.push(key.clone());
                    continue;
                }
            };
            match fs::remove_file(&path) {
                Ok(()) => {}
                // Already gone counts as deleted.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(_) => failed.push(key.clone()),
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(BackupError::Other(format!(
                "failed to delete {} of {} keys: {}",
                failed.len(),
                keys.len(),
                failed.join(", ")
            )))
        }
    }
}
