//! Projecting kegs into the shared `bin/`, `lib/` and `include/` directories.
//!
//! `opt/<name>` always points at the active keg and is the only record of
//! which version is linked. Fan-out links are owned by whichever package's
//! `Cellar/<name>/` contains their resolved target, so no separate database
//! is kept.
//!
//! Linking first plans every action, failing on the first conflict, and only
//! then applies the plan. A dry run returns the plan untouched.

use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cellar::Cellar;
use crate::paths::Paths;
use crate::runtime::{Runtime, is_path_under, normalize_path, relative_symlink_path};
use crate::validation::{is_valid_name, validate_name, validate_version};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    ForeignLink,
    NotSymlink,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::ForeignLink => write!(f, "already linked by another formula"),
            ConflictKind::NotSymlink => write!(f, "already exists and is not a symlink"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("cannot link {entry}: {} {kind} (use --overwrite to force)", .path.display())]
    Conflict {
        entry: String,
        path: PathBuf,
        kind: ConflictKind,
    },
    #[error("keg not found: {}", .0.display())]
    KegNotFound(PathBuf),
    #[error("keg {} resolves outside cellar: {}", .keg.display(), .resolved.display())]
    OutsideCellar { keg: PathBuf, resolved: PathBuf },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LinkOptions {
    /// Only create `opt/<name>`.
    pub keg_only: bool,
    /// Replace links owned by other packages and plain files.
    pub overwrite: bool,
    /// Plan without touching the filesystem.
    pub dry_run: bool,
    /// Fan out even when `keg_only` is set.
    pub force: bool,
}

/// One step of a link or unlink plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    Link { link: PathBuf, target: PathBuf },
    Overwrite { path: PathBuf, current: Option<PathBuf> },
    Unlink { link: PathBuf, target: PathBuf },
}

impl fmt::Display for LinkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkAction::Link { link, target } => {
                write!(f, "Would link: {} -> {}", link.display(), target.display())
            }
            LinkAction::Overwrite {
                path,
                current: Some(current),
            } => write!(
                f,
                "Would overwrite: {} (currently -> {})",
                path.display(),
                current.display()
            ),
            LinkAction::Overwrite { path, current: None } => {
                write!(f, "Would overwrite: {} (regular file)", path.display())
            }
            LinkAction::Unlink { link, target } => {
                write!(f, "Would unlink: {} -> {}", link.display(), target.display())
            }
        }
    }
}

pub struct Linker<'a, R: Runtime> {
    runtime: &'a R,
    paths: &'a Paths,
}

impl<'a, R: Runtime> Linker<'a, R> {
    pub fn new(runtime: &'a R, paths: &'a Paths) -> Self {
        Self { runtime, paths }
    }

    pub fn link(&self, name: &str, version: &str, keg_only: bool) -> Result<()> {
        let options = LinkOptions {
            keg_only,
            ..LinkOptions::default()
        };
        self.link_with(name, version, &options).map(|_| ())
    }

    /// Link `Cellar/<name>/<version>`, returning the actions taken (or planned).
    #[tracing::instrument(skip(self))]
    pub fn link_with(
        &self,
        name: &str,
        version: &str,
        options: &LinkOptions,
    ) -> Result<Vec<LinkAction>> {
        validate_name(name)?;
        validate_version(version)?;

        let keg = self.paths.cellar.join(name).join(version);
        self.check_keg(&keg)?;

        let mut plan = Vec::new();
        let opt_link = self.paths.opt.join(name);
        if self.runtime.is_symlink(&opt_link) {
            plan.push(LinkAction::Unlink {
                target: self.runtime.resolve_link(&opt_link)?,
                link: opt_link.clone(),
            });
        } else if self.runtime.exists(&opt_link) {
            plan.push(LinkAction::Overwrite {
                path: opt_link.clone(),
                current: None,
            });
        }
        plan.push(LinkAction::Link {
            link: opt_link,
            target: keg.clone(),
        });

        if !options.keg_only || options.force {
            for (subdir, dest_dir) in self.paths.link_dirs() {
                self.plan_dir(&keg.join(subdir), dest_dir, name, options, &mut plan)?;
            }
        }

        if options.dry_run {
            return Ok(plan);
        }
        self.apply(&plan)?;
        info!("Linked {} {}", name, version);
        Ok(plan)
    }

    pub fn unlink(&self, name: &str) -> Result<()> {
        self.unlink_with(name, false).map(|_| ())
    }

    /// Remove `opt/<name>` and every shared link resolving into `Cellar/<name>/`.
    ///
    /// Missing links are not an error.
    #[tracing::instrument(skip(self))]
    pub fn unlink_with(&self, name: &str, dry_run: bool) -> Result<Vec<LinkAction>> {
        validate_name(name)?;

        let mut plan = Vec::new();
        let opt_link = self.paths.opt.join(name);
        if self.runtime.is_symlink(&opt_link)
            && let Ok(target) = self.runtime.resolve_link(&opt_link)
        {
            plan.push(LinkAction::Unlink {
                link: opt_link,
                target,
            });
        }

        for (_, dir) in self.paths.link_dirs() {
            let Ok(entries) = self.runtime.read_dir(dir) else {
                continue;
            };
            for entry in entries {
                if !self.runtime.is_symlink(&entry) {
                    continue;
                }
                let Ok(target) = self.runtime.resolve_link(&entry) else {
                    continue;
                };
                if self.owns(name, &target) {
                    plan.push(LinkAction::Unlink {
                        link: entry,
                        target,
                    });
                }
            }
        }

        if !dry_run {
            self.apply(&plan)?;
        }
        Ok(plan)
    }

    pub fn is_linked(&self, name: &str) -> bool {
        is_valid_name(name) && self.runtime.read_link(&self.paths.opt.join(name)).is_ok()
    }

    /// Version recorded by `opt/<name>`, if linked.
    pub fn linked_version(&self, name: &str) -> Option<String> {
        if !is_valid_name(name) {
            return None;
        }
        let target = self.runtime.read_link(&self.paths.opt.join(name)).ok()?;
        target
            .file_name()
            .map(|v| v.to_string_lossy().into_owned())
    }

    /// The version to act on: the one `opt/<name>` points at while its keg
    /// is still installed, else the first installed version.
    pub fn active_version(&self, cellar: &Cellar<'_, R>, name: &str) -> Result<String> {
        match self.linked_version(name) {
            Some(active) if cellar.installed_versions(name)?.contains(&active) => Ok(active),
            _ => cellar.installed_version(name),
        }
    }

    /// The keg must exist and, with symlinks resolved, sit inside the real cellar.
    fn check_keg(&self, keg: &Path) -> Result<()> {
        let real_keg = self
            .runtime
            .canonicalize(keg)
            .map_err(|_| LinkError::KegNotFound(keg.to_path_buf()))?;
        let real_cellar = self
            .runtime
            .canonicalize(&self.paths.cellar)
            .context("cellar path invalid")?;
        if real_keg == real_cellar || !real_keg.starts_with(&real_cellar) {
            return Err(LinkError::OutsideCellar {
                keg: keg.to_path_buf(),
                resolved: real_keg,
            }
            .into());
        }
        Ok(())
    }

    fn plan_dir(
        &self,
        src_dir: &Path,
        dest_dir: &Path,
        name: &str,
        options: &LinkOptions,
        plan: &mut Vec<LinkAction>,
    ) -> Result<()> {
        if !self.runtime.is_dir(src_dir) {
            return Ok(());
        }
        let entries = self
            .runtime
            .read_dir(src_dir)
            .with_context(|| format!("read {}", src_dir.display()))?;

        for src in entries {
            let Some(file_name) = src.file_name() else {
                continue;
            };
            let dest = dest_dir.join(file_name);

            if self.runtime.is_symlink(&dest) {
                let current = self.runtime.resolve_link(&dest)?;
                if self.owns(name, &current) {
                    plan.push(LinkAction::Unlink {
                        link: dest.clone(),
                        target: current,
                    });
                } else if options.overwrite {
                    plan.push(LinkAction::Overwrite {
                        path: dest.clone(),
                        current: Some(current),
                    });
                } else {
                    return Err(conflict(file_name, dest, ConflictKind::ForeignLink));
                }
            } else if self.runtime.exists(&dest) {
                if !options.overwrite {
                    return Err(conflict(file_name, dest, ConflictKind::NotSymlink));
                }
                plan.push(LinkAction::Overwrite {
                    path: dest.clone(),
                    current: None,
                });
            }

            plan.push(LinkAction::Link {
                link: dest,
                target: src,
            });
        }
        Ok(())
    }

    fn apply(&self, plan: &[LinkAction]) -> Result<()> {
        for action in plan {
            match action {
                LinkAction::Unlink { link, .. } => {
                    debug!("Removing link {:?}", link);
                    self.runtime
                        .remove_symlink(link)
                        .with_context(|| format!("remove {}", link.display()))?;
                }
                LinkAction::Overwrite { path, current } => {
                    debug!("Overwriting {:?}", path);
                    let removed = if current.is_some() || self.runtime.is_symlink(path) {
                        self.runtime.remove_symlink(path)
                    } else if self.runtime.is_dir(path) {
                        self.runtime.remove_dir_all(path)
                    } else {
                        self.runtime.remove_file(path)
                    };
                    removed.with_context(|| format!("remove {}", path.display()))?;
                }
                LinkAction::Link { link, target } => {
                    let Some(parent) = link.parent() else {
                        bail!("invalid link path {}", link.display());
                    };
                    self.runtime.create_dir_all(parent)?;
                    let relative =
                        relative_symlink_path(link, target).unwrap_or_else(|| target.clone());
                    debug!("Linking {:?} -> {:?}", link, relative);
                    self.runtime.symlink(&relative, link).with_context(|| {
                        format!("symlink {} -> {}", link.display(), target.display())
                    })?;
                }
            }
        }
        Ok(())
    }

    /// A link belongs to `name` when it resolves strictly inside `Cellar/<name>/`.
    fn owns(&self, name: &str, resolved: &Path) -> bool {
        let formula_dir = normalize_path(&self.paths.cellar.join(name));
        let resolved = normalize_path(resolved);
        resolved != formula_dir && is_path_under(&resolved, &formula_dir)
    }
}

fn conflict(entry: &std::ffi::OsStr, path: PathBuf, kind: ConflictKind) -> anyhow::Error {
    LinkError::Conflict {
        entry: entry.to_string_lossy().into_owned(),
        path,
        kind,
    }
    .into()
}
