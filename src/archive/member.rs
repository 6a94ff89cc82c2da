//! Per-member safety rules shared by the tar and zip extractors.
//!
//! Archives are untrusted. Every member goes through [`MemberWriter`], which
//! drops anything that would land outside the destination, refuses symlinks
//! whose target leaves it, caps file sizes and normalizes permission bits.

use anyhow::{Context, Result, bail};
use log::debug;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use crate::fsutil::remove_escaping_links;
use crate::runtime::{Runtime, is_path_under, normalize_path};

/// Upper bound on the extracted size of a single member.
pub const MAX_EXTRACT_SIZE: u64 = 512 << 20;

const SETUID: u32 = 0o4000;
const SETGID: u32 = 0o2000;
const STICKY: u32 = 0o1000;
const WORLD_WRITE: u32 = 0o002;

/// Normalize permission bits taken from an archive or a staged file.
///
/// Setuid, setgid, sticky and world-write are cleared. A zero mode becomes
/// 0644 for files and 0755 for directories, and directories always keep
/// owner rwx so their contents stay reachable.
pub fn sanitize_mode(mode: u32, is_dir: bool) -> u32 {
    let mode = mode & 0o7777 & !(SETUID | SETGID | STICKY | WORLD_WRITE);
    match (mode, is_dir) {
        (0, true) => 0o755,
        (0, false) => 0o644,
        (m, true) => m | 0o700,
        (m, false) => m,
    }
}

/// Drop `strip` leading `/`-separated segments from a member name.
///
/// Returns `None` when nothing is left, which means the member is skipped.
pub fn strip_path(name: &str, strip: usize) -> Option<String> {
    let name = name.replace('\\', "/");
    let rest = if strip == 0 {
        name
    } else {
        let parts: Vec<&str> = name.splitn(strip + 1, '/').collect();
        if parts.len() <= strip {
            return None;
        }
        parts[strip].to_string()
    };
    if rest.is_empty() { None } else { Some(rest) }
}

/// Where `name` lands under `dest`, or `None` if it would escape.
pub fn member_target(dest: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    if relative.has_root()
        || relative
            .components()
            .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
    {
        return None;
    }
    let target = normalize_path(&dest.join(relative));
    if is_path_under(&target, dest) {
        Some(target)
    } else {
        None
    }
}

/// Materializes members under one destination directory.
pub struct MemberWriter<'a, R: Runtime> {
    runtime: &'a R,
    dest: PathBuf,
    real_dest: PathBuf,
    limit: u64,
}

impl<'a, R: Runtime> MemberWriter<'a, R> {
    /// Create `dest` if needed and pin its canonical location.
    pub fn new(runtime: &'a R, dest: &Path) -> Result<Self> {
        runtime
            .create_dir_all(dest)
            .with_context(|| format!("create dest dir {}", dest.display()))?;
        let dest = normalize_path(dest);
        let real_dest = runtime
            .canonicalize(&dest)
            .unwrap_or_else(|_| dest.clone());
        Ok(Self {
            runtime,
            dest,
            real_dest,
            limit: MAX_EXTRACT_SIZE,
        })
    }

    #[cfg(test)]
    fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn directory(&self, name: &str, mode: u32) -> Result<()> {
        let Some(target) = self.target(name) else {
            return Ok(());
        };
        if !self.prepare_parent(&target)? {
            return Ok(());
        }
        self.runtime
            .create_dir_all(&target)
            .with_context(|| format!("create directory {}", target.display()))?;
        if !self.resolves_inside(&target) {
            debug!("Directory member {:?} resolves outside destination", name);
            return Ok(());
        }
        self.runtime
            .set_permissions(&target, sanitize_mode(mode, true))
    }

    /// Write a regular file. Content beyond the size limit is an error.
    pub fn file(&self, name: &str, mode: u32, reader: &mut dyn Read) -> Result<()> {
        let Some(target) = self.target(name) else {
            return Ok(());
        };
        if target == self.dest || !self.prepare_parent(&target)? {
            return Ok(());
        }
        if self.runtime.is_symlink(&target) {
            self.runtime.remove_symlink(&target)?;
        } else if self.runtime.is_dir(&target) {
            debug!("Skipping file member {:?}: a directory is in the way", name);
            return Ok(());
        }

        let mut writer = self
            .runtime
            .create_file(&target)
            .with_context(|| format!("create {}", target.display()))?;
        let copied = std::io::copy(&mut reader.take(self.limit + 1), &mut writer)
            .with_context(|| format!("extract {}", target.display()))?;
        drop(writer);
        if copied > self.limit {
            self.runtime.remove_file(&target)?;
            bail!(
                "archive member {} exceeds the extraction limit of {} bytes",
                name,
                self.limit
            );
        }

        self.runtime
            .set_permissions(&target, sanitize_mode(mode, false))
    }

    /// Create a symlink member if its target stays inside the destination.
    pub fn symlink(&self, name: &str, link_target: &str) -> Result<()> {
        let Some(target) = self.target(name) else {
            return Ok(());
        };
        if target == self.dest || link_target.is_empty() || !self.prepare_parent(&target)? {
            return Ok(());
        }

        let link_path = Path::new(link_target);
        if link_path.has_root() {
            debug!("Skipping symlink {:?} -> {:?}: absolute target", name, link_target);
            return Ok(());
        }
        let Some(parent) = target.parent() else {
            return Ok(());
        };
        let Ok(real_parent) = self.runtime.canonicalize(parent) else {
            return Ok(());
        };
        match resolve_beneath(self.runtime, &real_parent, link_path) {
            Some(resolved) if is_path_under(&resolved, &self.real_dest) => {}
            _ => {
                debug!("Skipping symlink {:?} -> {:?}: escapes destination", name, link_target);
                return Ok(());
            }
        }

        if self.runtime.is_symlink(&target) || self.runtime.is_file(&target) {
            self.runtime.remove_file(&target)?;
        } else if self.runtime.is_dir(&target) {
            debug!("Skipping symlink {:?}: a directory is in the way", name);
            return Ok(());
        }
        self.runtime
            .symlink(link_path, &target)
            .with_context(|| format!("create symlink {}", target.display()))
    }

    /// Re-check every materialized symlink once all members are written.
    ///
    /// A link is checked when it is created, but members that arrive later
    /// can change what its path walks through (`evil -> b/x/../..` followed
    /// by `b -> .`). Anything no longer resolving inside the destination is
    /// removed.
    pub fn finish(self) -> Result<()> {
        let removed = remove_escaping_links(self.runtime, &self.dest)?;
        if removed > 0 {
            debug!("Removed {} symlink(s) resolving outside {:?}", removed, self.dest);
        }
        Ok(())
    }

    fn target(&self, name: &str) -> Option<PathBuf> {
        let target = member_target(&self.dest, name);
        if target.is_none() {
            debug!("Skipping member {:?}: escapes destination", name);
        }
        target
    }

    /// Create the member's parent directory; `false` if it resolves outside.
    fn prepare_parent(&self, target: &Path) -> Result<bool> {
        let Some(parent) = target.parent() else {
            return Ok(false);
        };
        self.runtime
            .create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
        Ok(self.parent_is_inside(target))
    }

    fn parent_is_inside(&self, target: &Path) -> bool {
        target
            .parent()
            .is_some_and(|parent| self.resolves_inside(parent))
    }

    fn resolves_inside(&self, path: &Path) -> bool {
        self.runtime
            .canonicalize(path)
            .is_ok_and(|real| is_path_under(&real, &self.real_dest))
    }
}

/// Walk `relative` from the real directory `base`, following every existing
/// symlink on the way. Components that do not exist yet are taken literally.
/// Returns `None` for absolute input or a dangling link in the middle.
pub fn resolve_beneath<R: Runtime>(runtime: &R, base: &Path, relative: &Path) -> Option<PathBuf> {
    let mut current = base.to_path_buf();
    for component in relative.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                current.pop();
            }
            Component::Normal(part) => {
                current.push(part);
                if runtime.is_symlink(&current) {
                    current = runtime.canonicalize(&current).ok()?;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(current)
}
