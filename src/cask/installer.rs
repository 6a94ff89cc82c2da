use anyhow::{Context, Result, bail};
use log::debug;
use std::path::{Path, PathBuf};

use super::CaskError;
use crate::fsutil::copy_tree;
use crate::runtime::{Runtime, is_path_under};
use crate::validation::validate_name;

/// Places cask artifacts: `.app` bundles into the application directory,
/// executables from those bundles into `bin/`.
pub struct AppInstaller<'a, R: Runtime> {
    runtime: &'a R,
    app_dir: PathBuf,
    bin_dir: PathBuf,
}

impl<'a, R: Runtime> AppInstaller<'a, R> {
    pub fn new(runtime: &'a R, app_dir: impl Into<PathBuf>, bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            app_dir: app_dir.into(),
            bin_dir: bin_dir.into(),
        }
    }

    /// Copy `app_name` from `stage_dir` into the application directory,
    /// replacing an existing bundle of the same name.
    #[tracing::instrument(skip(self))]
    pub fn install_app(&self, stage_dir: &Path, app_name: &str) -> Result<PathBuf> {
        check_app_name(app_name)?;

        let src = self.find_app(stage_dir, app_name)?;
        let real_src = self
            .runtime
            .canonicalize(&src)
            .with_context(|| format!("resolve {}", app_name))?;
        let real_stage = self.runtime.canonicalize(stage_dir)?;
        if !is_path_under(&real_src, &real_stage) {
            bail!(
                "app {} resolves outside staging directory: {}",
                app_name,
                real_src.display()
            );
        }

        let dest = self.app_dir.join(app_name);
        if self.runtime.exists(&dest) || self.runtime.is_symlink(&dest) {
            debug!("Replacing existing {:?}", dest);
            if self.runtime.is_symlink(&dest) {
                self.runtime.remove_symlink(&dest)
            } else {
                self.runtime.remove_dir_all(&dest)
            }
            .with_context(|| format!("remove existing {}", app_name))?;
        }

        copy_tree(self.runtime, &real_src, &dest)
            .with_context(|| format!("copy {} to {}", app_name, self.app_dir.display()))?;
        Ok(dest)
    }

    /// Remove an installed bundle. A missing bundle is not an error.
    #[tracing::instrument(skip(self))]
    pub fn uninstall_app(&self, app_name: &str) -> Result<()> {
        check_app_name(app_name)?;
        let dest = self.app_dir.join(app_name);
        if !self.runtime.exists(&dest) {
            return Ok(());
        }
        self.runtime.remove_dir_all(&dest)
    }

    /// Locate `bin_name` inside the installed bundles' `Contents/MacOS` or `Contents/Resources`.
    pub fn find_binary(&self, apps: &[String], bin_name: &str) -> Option<PathBuf> {
        apps.iter()
            .flat_map(|app| {
                let contents = self.app_dir.join(app).join("Contents");
                [
                    contents.join("MacOS").join(bin_name),
                    contents.join("Resources").join(bin_name),
                ]
            })
            .find(|candidate| self.runtime.exists(candidate))
    }

    /// Point `bin/<name>` at `target`, replacing a previous link into the
    /// application directory. Links owned by formulae or anything else are
    /// left alone and reported as a conflict.
    #[tracing::instrument(skip(self))]
    pub fn link_bin(&self, name: &str, target: &Path) -> Result<PathBuf> {
        validate_name(name)?;
        let link = self.bin_dir.join(name);
        if self.runtime.is_symlink(&link) {
            let current = self.runtime.resolve_link(&link)?;
            if !is_path_under(&current, &self.app_dir) {
                return Err(CaskError::BinConflict {
                    path: link,
                    target: current,
                }
                .into());
            }
            self.runtime.remove_symlink(&link)?;
        } else if self.runtime.exists(&link) {
            bail!("{} already exists and is not a symlink", link.display());
        }
        self.runtime.create_dir_all(&self.bin_dir)?;
        self.runtime
            .symlink(target, &link)
            .with_context(|| format!("symlink {} -> {}", link.display(), target.display()))?;
        Ok(link)
    }

    /// Remove `bin/<name>` if it is a link into the application directory.
    #[tracing::instrument(skip(self))]
    pub fn unlink_bin(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let link = self.bin_dir.join(name);
        if !self.runtime.is_symlink(&link) {
            return Ok(());
        }
        let target = self.runtime.resolve_link(&link)?;
        if !is_path_under(&target, &self.app_dir) {
            debug!("Leaving {:?}: points at {:?}", link, target);
            return Ok(());
        }
        self.runtime.remove_symlink(&link)
    }

    /// The bundle at the staging root, else one level down.
    fn find_app(&self, stage_dir: &Path, app_name: &str) -> Result<PathBuf> {
        let direct = stage_dir.join(app_name);
        if self.runtime.is_dir(&direct) {
            return Ok(direct);
        }
        for entry in self.runtime.read_dir(stage_dir)? {
            if !self.runtime.is_dir(&entry) {
                continue;
            }
            let nested = entry.join(app_name);
            if self.runtime.is_dir(&nested) {
                return Ok(nested);
            }
        }
        bail!("could not find {} in extracted archive", app_name)
    }
}

fn check_app_name(app_name: &str) -> Result<()> {
    if !app_name.ends_with(".app") {
        bail!("artifact {:?} is not a .app bundle", app_name);
    }
    if Path::new(app_name).file_name().is_none_or(|n| n != app_name) {
        bail!("invalid app name: {:?}", app_name);
    }
    Ok(())
}
