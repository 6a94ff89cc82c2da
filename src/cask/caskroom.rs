use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use super::CaskError;
use crate::runtime::Runtime;
use crate::validation::{is_valid_name, validate_name, validate_version};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledCask {
    pub name: String,
    pub version: String,
}

/// Records of installed casks: an empty `Caskroom/<name>/<version>/` directory each.
pub struct Caskroom<'a, R: Runtime> {
    runtime: &'a R,
    root: PathBuf,
}

impl<'a, R: Runtime> Caskroom<'a, R> {
    pub fn new(runtime: &'a R, root: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            root: root.into(),
        }
    }

    pub fn is_installed(&self, name: &str) -> bool {
        is_valid_name(name) && self.runtime.is_dir(&self.root.join(name))
    }

    pub fn installed_version(&self, name: &str) -> Result<String> {
        validate_name(name)?;
        let entries = self
            .runtime
            .read_dir(&self.root.join(name))
            .map_err(|_| CaskError::NotInstalled(name.to_string()))?;
        entries
            .into_iter()
            .find(|p| self.runtime.is_dir(p))
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .with_context(|| format!("cask {:?} has no installed version", name))
    }

    #[tracing::instrument(skip(self))]
    pub fn record(&self, name: &str, version: &str) -> Result<()> {
        validate_name(name)?;
        validate_version(version)?;
        let dir = self.root.join(name).join(version);
        self.runtime
            .create_dir_all(&dir)
            .with_context(|| format!("record cask installation at {}", dir.display()))
    }

    #[tracing::instrument(skip(self))]
    pub fn remove(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let dir = self.root.join(name);
        if !self.runtime.exists(&dir) {
            return Err(CaskError::NotInstalled(name.to_string()).into());
        }
        self.runtime.remove_dir_all(&dir)
    }

    /// Installed casks sorted by name.
    pub fn list(&self) -> Result<Vec<InstalledCask>> {
        if !self.runtime.is_dir(&self.root) {
            return Ok(Vec::new());
        }
        let mut casks = Vec::new();
        for dir in self.runtime.read_dir(&self.root)? {
            if !self.runtime.is_dir(&dir) {
                continue;
            }
            let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if let Ok(version) = self.installed_version(&name) {
                casks.push(InstalledCask { name, version });
            }
        }
        casks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(casks)
    }
}
