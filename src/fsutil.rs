//! Tree copy and size helpers.

use anyhow::{Context, Result};
use log::debug;
use std::path::Path;

use crate::archive::sanitize_mode;
use crate::runtime::{Runtime, is_path_under, normalize_path};

/// Recursively copy `src` into `dst`.
///
/// Permission bits are sanitized on the way. Symlinks are recreated with
/// their original target text, but only when that target stays inside
/// `dst`; escaping links are dropped. Once the whole tree is in place, links
/// are checked again through the real filesystem, since a link copied early
/// can be retargeted by one copied later.
#[tracing::instrument(skip(runtime))]
pub fn copy_tree<R: Runtime>(runtime: &R, src: &Path, dst: &Path) -> Result<()> {
    let root = normalize_path(dst);
    runtime
        .create_dir_all(dst)
        .with_context(|| format!("create {}", dst.display()))?;
    let mode = runtime.file_mode(src).unwrap_or(0);
    runtime.set_permissions(dst, sanitize_mode(mode, true))?;
    copy_dir_contents(runtime, src, dst, &root)?;
    remove_escaping_links(runtime, dst)?;
    Ok(())
}

/// Remove every symlink under `root` that does not fully resolve to a path
/// inside `root`. Dangling links are removed too. Passes repeat until one
/// removes nothing, because dropping a link can leave others dangling.
///
/// Returns how many links were removed.
pub fn remove_escaping_links<R: Runtime>(runtime: &R, root: &Path) -> Result<usize> {
    let real_root = runtime
        .canonicalize(root)
        .with_context(|| format!("resolve {}", root.display()))?;
    let mut total = 0;
    loop {
        let removed = sweep_links(runtime, root, &real_root)?;
        if removed == 0 {
            return Ok(total);
        }
        total += removed;
    }
}

fn sweep_links<R: Runtime>(runtime: &R, dir: &Path, real_root: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in runtime.read_dir(dir)? {
        if runtime.is_symlink(&entry) {
            let inside = runtime
                .canonicalize(&entry)
                .is_ok_and(|real| is_path_under(&real, real_root));
            if !inside {
                debug!("Removing symlink {:?}: does not resolve inside {:?}", entry, real_root);
                runtime.remove_symlink(&entry)?;
                removed += 1;
            }
        } else if runtime.is_dir(&entry) {
            removed += sweep_links(runtime, &entry, real_root)?;
        }
    }
    Ok(removed)
}

fn copy_dir_contents<R: Runtime>(runtime: &R, src: &Path, dst: &Path, root: &Path) -> Result<()> {
    for entry in runtime.read_dir(src)? {
        let Some(file_name) = entry.file_name() else {
            continue;
        };
        let target = dst.join(file_name);

        if runtime.is_symlink(&entry) {
            let link = runtime.read_link(&entry)?;
            let resolved = match target.parent() {
                Some(parent) if link.is_relative() => normalize_path(&parent.join(&link)),
                _ => normalize_path(&link),
            };
            if !is_path_under(&resolved, root) {
                debug!("Skipping symlink {:?} -> {:?}: escapes {:?}", entry, link, root);
                continue;
            }
            runtime
                .symlink(&link, &target)
                .with_context(|| format!("create symlink {}", target.display()))?;
        } else if runtime.is_dir(&entry) {
            let mode = runtime.file_mode(&entry)?;
            runtime
                .create_dir_all(&target)
                .with_context(|| format!("create {}", target.display()))?;
            runtime.set_permissions(&target, sanitize_mode(mode, true))?;
            copy_dir_contents(runtime, &entry, &target, root)?;
        } else {
            let mode = runtime.file_mode(&entry)?;
            runtime
                .copy(&entry, &target)
                .with_context(|| format!("copy {} to {}", entry.display(), target.display()))?;
            runtime.set_permissions(&target, sanitize_mode(mode, false))?;
        }
    }
    Ok(())
}

/// Total size in bytes of everything under `path`, without following symlinks.
pub fn dir_size<R: Runtime>(runtime: &R, path: &Path) -> u64 {
    if runtime.is_symlink(path) || !runtime.is_dir(path) {
        return runtime.file_size(path).unwrap_or(0);
    }
    runtime
        .read_dir(path)
        .map(|entries| entries.iter().map(|e| dir_size(runtime, e)).sum())
        .unwrap_or(0)
}

/// Human-readable byte count: `512 B`, `1.5 KB`, `20.0 MB`, `1.2 GB`.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1 << 10;
    const MB: u64 = 1 << 20;
    const GB: u64 = 1 << 30;
    match bytes {
        b if b >= GB => format!("{:.1} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.1} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.1} KB", b as f64 / KB as f64),
        b => format!("{} B", b),
    }
}
