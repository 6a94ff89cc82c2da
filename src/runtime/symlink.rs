use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use super::RealRuntime;
use super::path::normalize_path;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn symlink_impl(&self, original: &Path, link: &Path) -> Result<()> {
        symlink(original, link)
            .with_context(|| format!("symlink {} -> {}", link.display(), original.display()))
    }

    pub(crate) fn read_link_impl(&self, path: &Path) -> Result<PathBuf> {
        fs::read_link(path).with_context(|| format!("read link {}", path.display()))
    }

    /// The link's target made absolute against the link's directory and
    /// normalized lexically. Only one level of indirection is followed.
    pub(crate) fn resolve_link_impl(&self, path: &Path) -> Result<PathBuf> {
        let target = self.read_link_impl(path)?;
        if target.is_absolute() {
            return Ok(normalize_path(&target));
        }
        let parent = path
            .parent()
            .with_context(|| format!("link {} has no parent directory", path.display()))?;
        Ok(normalize_path(&parent.join(target)))
    }

    pub(crate) fn canonicalize_impl(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).with_context(|| format!("canonicalize {}", path.display()))
    }

    pub(crate) fn is_symlink_impl(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_symlink_impl(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("remove link {}", path.display()))
    }
}
