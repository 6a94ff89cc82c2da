//! Cleanup action - drop superseded kegs and scratch files.

use std::path::PathBuf;

use anyhow::Result;
use log::{debug, warn};

use crate::cellar::Cellar;
use crate::fsutil::dir_size;
use crate::linker::Linker;
use crate::paths::Paths;
use crate::runtime::Runtime;

/// Something cleanup would remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupItem {
    /// `name version` for kegs, the path for scratch entries.
    pub label: String,
    pub path: PathBuf,
    pub size: u64,
}

pub struct CleanupAction<'a, R: Runtime> {
    runtime: &'a R,
    paths: &'a Paths,
    cellar: Cellar<'a, R>,
    linker: Linker<'a, R>,
}

impl<'a, R: Runtime> CleanupAction<'a, R> {
    pub fn new(runtime: &'a R, paths: &'a Paths) -> Self {
        Self {
            runtime,
            paths,
            cellar: Cellar::new(runtime, &paths.cellar),
            linker: Linker::new(runtime, paths),
        }
    }

    /// Everything removable: every keg except the one each formula keeps,
    /// then every entry of `tmp/`.
    ///
    /// A formula keeps the version `opt/` points at, or its highest sorted
    /// version when unlinked. `targets` limits the keg scan to those names.
    #[tracing::instrument(skip(self))]
    pub fn plan(&self, targets: &[String]) -> Result<Vec<CleanupItem>> {
        let mut items = Vec::new();

        for keg in self.cellar.list()? {
            if !targets.is_empty() && !targets.contains(&keg.name) {
                continue;
            }
            let versions = self.cellar.installed_versions(&keg.name)?;
            let keep = self
                .linker
                .linked_version(&keg.name)
                .filter(|v| versions.contains(v))
                .or_else(|| versions.last().cloned());
            for version in versions {
                if keep.as_ref() == Some(&version) {
                    continue;
                }
                let path = self.cellar.keg_path(&keg.name, &version);
                items.push(CleanupItem {
                    label: format!("{} {}", keg.name, version),
                    size: dir_size(self.runtime, &path),
                    path,
                });
            }
        }

        if let Ok(entries) = self.runtime.read_dir(&self.paths.tmp) {
            for path in entries {
                items.push(CleanupItem {
                    label: path.display().to_string(),
                    size: dir_size(self.runtime, &path),
                    path,
                });
            }
        }

        Ok(items)
    }

    /// Remove one planned item.
    pub fn remove(&self, item: &CleanupItem) -> Result<()> {
        debug!("Removing {:?}", item.path);
        let result = if self.runtime.is_dir(&item.path) && !self.runtime.is_symlink(&item.path) {
            self.runtime.remove_dir_all(&item.path)
        } else {
            self.runtime.remove_file(&item.path)
        };
        if let Err(e) = &result {
            warn!("Could not remove {}: {:#}", item.path.display(), e);
        }
        result
    }
}
