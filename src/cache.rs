//! Rendered-page cache invalidation.
//!
//! The renderer (out of scope here) keeps finished pages as files in a
//! cache directory. The pipeline's only interaction with it is the purge
//! after a run that added new items, so stale pages never outlive fresh
//! content. Purge failures are logged, never fatal.

use std::path::{Path, PathBuf};

/// Handle to the on-disk page cache.
#[derive(Debug, Clone)]
pub struct PageCache {
    dir: PathBuf,
}

impl PageCache {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Remove every cached page file, returning how many were deleted.
    ///
    /// Only regular files directly in the cache directory are touched; a
    /// missing directory means an empty cache.
    pub fn purge(&self) -> usize {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %self.dir.display(), "cache directory does not exist");
                return 0;
            }
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "cannot read cache directory");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "failed to remove cached page");
                }
            }
        }

        tracing::info!(removed, dir = %self.dir.display(), "page cache purged");
        removed
    }
}
