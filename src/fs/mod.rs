// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub mod mock;

/// The filesystem queries configuration validation depends on.
pub trait FileSystem: Send + Sync + Debug {
    /// Succeeds if `path` can be opened for reading.
    fn check_readable(&self, path: &Path) -> io::Result<()>;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    /// True if any execute bit is set on `path`.
    fn is_executable(&self, path: &Path) -> bool;

    /// Locate a binary by name on `PATH`, or accept it if it is already a path
    /// to an existing file.
    fn find_binary(&self, name: &str) -> Option<PathBuf>;
}

/// Implementation that uses `std::fs` and the `which` crate.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn check_readable(&self, path: &Path) -> io::Result<()> {
        fs::File::open(path).map(|_| ())
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_executable(&self, path: &Path) -> bool {
        use std::os::unix::fs::PermissionsExt;

        fs::metadata(path)
            .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    fn find_binary(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }
}
