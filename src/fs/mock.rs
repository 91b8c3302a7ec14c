// src/fs/mock.rs

use super::FileSystem;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { mode: u32 },
    Dir,
}

/// In-memory filesystem for validation tests.
///
/// Paths are taken literally; tests are expected to use absolute paths.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    binaries: Arc<Mutex<HashSet<String>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.add_dir("/");
        fs
    }

    /// Add a regular, readable, non-executable file.
    pub fn add_file(&self, path: impl AsRef<Path>) -> &Self {
        self.add_file_with_mode(path, 0o644)
    }

    /// Add a file with the executable bits set.
    pub fn add_executable(&self, path: impl AsRef<Path>) -> &Self {
        self.add_file_with_mode(path, 0o755)
    }

    pub fn add_file_with_mode(&self, path: impl AsRef<Path>, mode: u32) -> &Self {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(path.to_path_buf(), MockEntry::File { mode });
        self
    }

    /// Add a directory and all of its ancestors.
    pub fn add_dir(&self, path: impl AsRef<Path>) -> &Self {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for ancestor in path.as_ref().ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            entries
                .entry(ancestor.to_path_buf())
                .or_insert(MockEntry::Dir);
        }
        self
    }

    /// Make `name` resolvable through [`FileSystem::find_binary`].
    pub fn add_binary(&self, name: &str) -> &Self {
        self.binaries.lock().unwrap_or_else(PoisonError::into_inner).insert(name.to_string());
        self
    }
}

impl FileSystem for MockFileSystem {
    fn check_readable(&self, path: &Path) -> io::Result<()> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(path) {
            Some(MockEntry::File { mode }) if mode & 0o444 != 0 => Ok(()),
            Some(MockEntry::File { .. }) => Err(io::Error::from(io::ErrorKind::PermissionDenied)),
            Some(MockEntry::Dir) => Err(io::Error::other(format!("is a directory: {path:?}"))),
            None => Err(io::Error::from(io::ErrorKind::NotFound)),
        }
    }

    fn is_file(&self, path: &Path) -> bool {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(entries.get(path), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(entries.get(path), Some(MockEntry::Dir))
    }

    fn is_executable(&self, path: &Path) -> bool {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(entries.get(path), Some(MockEntry::File { mode }) if mode & 0o111 != 0)
    }

    fn find_binary(&self, name: &str) -> Option<PathBuf> {
        if self.binaries.lock().unwrap_or_else(PoisonError::into_inner).contains(name) {
            return Some(PathBuf::from("/usr/bin").join(name));
        }
        let path = Path::new(name);
        self.is_file(path).then(|| path.to_path_buf())
    }
}
