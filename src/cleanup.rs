use log::debug;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// Scratch paths (downloads, staging trees) removed when the guard drops.
///
/// Every pipeline step registers what it creates under `tmp/`, so an early
/// return through `?` leaves nothing behind. Paths that must survive are
/// taken back with [`ScratchGuard::keep`].
pub struct ScratchGuard<'a, R: Runtime> {
    runtime: &'a R,
    paths: Vec<PathBuf>,
}

impl<'a, R: Runtime> ScratchGuard<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self {
            runtime,
            paths: Vec::new(),
        }
    }

    /// Register a path for removal and hand it back.
    pub fn add(&mut self, path: PathBuf) -> PathBuf {
        if !self.paths.contains(&path) {
            self.paths.push(path.clone());
        }
        path
    }

    /// Stop tracking `path`; it will not be removed.
    pub fn keep(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn remove(&self, path: &Path) {
        debug!("Cleaning up: {:?}", path);
        let result = if self.runtime.is_symlink(path) {
            self.runtime.remove_symlink(path)
        } else if self.runtime.is_dir(path) {
            self.runtime.remove_dir_all(path)
        } else if self.runtime.exists(path) {
            self.runtime.remove_file(path)
        } else {
            Ok(())
        };
        if let Err(e) = result {
            debug!("Failed to clean up {:?}: {:#}", path, e);
        }
    }
}

impl<R: Runtime> Drop for ScratchGuard<'_, R> {
    fn drop(&mut self) {
        // Last registered first, so nested paths go before their parents.
        for path in self.paths.iter().rev() {
            self.remove(path);
        }
    }
}
