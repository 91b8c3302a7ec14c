// src/watch/paths.rs

//! Watch-set computation.

use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::errors::{Result, SentinelleError};

/// Build the set of paths to watch for `entry`.
///
/// - Always starts with the entry file's directory.
/// - Every path is made absolute against the current directory, with `.`
///   and `..` folded away.
/// - Duplicates are dropped, keeping the first occurrence.
/// - The filesystem root is never watched; the entry file is watched in its
///   place.
pub fn compute_watch_set(entry: &Path, extra: &[String]) -> Result<Vec<PathBuf>> {
    let entry = resolve_path(entry).map_err(|e| {
        SentinelleError::Config(format!("invalid entry path \"{}\": {e}", entry.display()))
    })?;
    let entry_dir = entry
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| entry.clone());

    let mut candidates = vec![entry_dir];
    for raw in extra {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let abs = resolve_path(raw).map_err(|e| {
            SentinelleError::Config(format!("invalid watch path \"{raw}\": {e}"))
        })?;
        candidates.push(abs);
    }

    let mut watches: Vec<PathBuf> = Vec::with_capacity(candidates.len());
    for path in candidates {
        let path = if is_filesystem_root(&path) {
            warn!(
                entry = %entry.display(),
                "refusing to recursively watch \"/\"; watching entry file instead"
            );
            entry.clone()
        } else {
            path
        };

        if !watches.contains(&path) {
            watches.push(path);
        }
    }

    Ok(watches)
}

/// Make `path` absolute and fold `.` and `..` lexically.
///
/// Symlinks are not followed, so `a/link/..` becomes `a`. `..` at the root
/// stays at the root.
pub fn resolve_path(path: impl AsRef<Path>) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;

    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    Ok(resolved)
}

pub fn is_filesystem_root(path: &Path) -> bool {
    path.has_root() && path.parent().is_none()
}
