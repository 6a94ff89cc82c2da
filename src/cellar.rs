//! The package store ("Cellar").
//!
//! Every installed version lives in its own keg at `Cellar/<name>/<version>/`.
//! Several kegs of one package may coexist; which one is active is recorded
//! by the linker's `opt/<name>` pointer, not here.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::fsutil::copy_tree;
use crate::runtime::Runtime;
use crate::validation::{is_valid_name, validate_name, validate_version};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("formula {0:?} is not installed")]
    NotInstalled(String),
    #[error("formula {0:?} has no installed version")]
    NoVersions(String),
}

/// One keg as reported by [`Cellar::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledKeg {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
}

pub struct Cellar<'a, R: Runtime> {
    runtime: &'a R,
    root: PathBuf,
}

impl<'a, R: Runtime> Cellar<'a, R> {
    pub fn new(runtime: &'a R, root: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `Cellar/<name>`
    pub fn formula_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// `Cellar/<name>/<version>`
    pub fn keg_path(&self, name: &str, version: &str) -> PathBuf {
        self.formula_dir(name).join(version)
    }

    /// Copy `staging_dir` into a fresh keg, replacing any keg at the same path.
    ///
    /// A failed copy leaves no partial keg behind.
    #[tracing::instrument(skip(self))]
    pub fn install_keg(&self, name: &str, version: &str, staging_dir: &Path) -> Result<PathBuf> {
        validate_name(name)?;
        validate_version(version)?;

        let keg = self.keg_path(name, version);
        let parent = self.formula_dir(name);
        self.runtime
            .create_dir_all(&parent)
            .with_context(|| format!("create cellar dir {}", parent.display()))?;

        if self.runtime.exists(&keg) || self.runtime.is_symlink(&keg) {
            debug!("Replacing existing keg {:?}", keg);
            self.remove_path(&keg)?;
        }

        if let Err(e) = copy_tree(self.runtime, staging_dir, &keg) {
            if let Err(cleanup_err) = self.remove_path(&keg) {
                warn!("Failed to remove partial keg {}: {:#}", keg.display(), cleanup_err);
            }
            return Err(e).context("install to cellar");
        }

        Ok(keg)
    }

    /// Remove every keg of `name`.
    #[tracing::instrument(skip(self))]
    pub fn uninstall(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let dir = self.formula_dir(name);
        if !self.runtime.is_dir(&dir) {
            return Err(StoreError::NotInstalled(name.to_string()).into());
        }
        self.runtime
            .remove_dir_all(&dir)
            .with_context(|| format!("remove {}", dir.display()))
    }

    /// Remove a single keg, and the formula directory if it becomes empty.
    #[tracing::instrument(skip(self))]
    pub fn remove_keg(&self, name: &str, version: &str) -> Result<()> {
        validate_name(name)?;
        validate_version(version)?;
        let keg = self.keg_path(name, version);
        if !self.runtime.is_dir(&keg) {
            return Err(StoreError::NotInstalled(format!("{} {}", name, version)).into());
        }
        self.runtime
            .remove_dir_all(&keg)
            .with_context(|| format!("remove {}", keg.display()))?;

        let dir = self.formula_dir(name);
        if self.runtime.read_dir(&dir).is_ok_and(|rest| rest.is_empty()) {
            self.runtime.remove_dir_all(&dir)?;
        }
        Ok(())
    }

    pub fn is_installed(&self, name: &str) -> bool {
        is_valid_name(name) && self.runtime.is_dir(&self.formula_dir(name))
    }

    /// First version directory in sorted order.
    pub fn installed_version(&self, name: &str) -> Result<String> {
        self.installed_versions(name)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NoVersions(name.to_string()).into())
    }

    /// All version directories, sorted ascending.
    pub fn installed_versions(&self, name: &str) -> Result<Vec<String>> {
        validate_name(name)?;
        let dir = self.formula_dir(name);
        if !self.runtime.is_dir(&dir) {
            return Err(StoreError::NotInstalled(name.to_string()).into());
        }
        let mut versions: Vec<String> = self
            .runtime
            .read_dir(&dir)?
            .into_iter()
            .filter(|p| self.runtime.is_dir(p) && !self.runtime.is_symlink(p))
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        versions.sort();
        Ok(versions)
    }

    /// Every installed formula with its first version, sorted by name.
    #[tracing::instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<InstalledKeg>> {
        if !self.runtime.is_dir(&self.root) {
            return Ok(Vec::new());
        }
        let mut kegs = Vec::new();
        for dir in self.runtime.read_dir(&self.root).context("read cellar")? {
            if !self.runtime.is_dir(&dir) {
                continue;
            }
            let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let Ok(version) = self.installed_version(&name) else {
                continue;
            };
            kegs.push(InstalledKeg {
                path: self.keg_path(&name, &version),
                name,
                version,
            });
        }
        kegs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(kegs)
    }

    fn remove_path(&self, path: &Path) -> Result<()> {
        if self.runtime.is_symlink(path) {
            self.runtime.remove_symlink(path)
        } else {
            self.runtime.remove_dir_all(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn staging(dir: &TempDir) -> PathBuf {
        let stage = dir.path().join("stage");
        fs::create_dir_all(stage.join("bin")).unwrap();
        fs::write(stage.join("bin/mybin"), "#!/bin/sh\necho hello\n").unwrap();
        stage
    }

    #[test]
    fn test_keg_path() {
        let runtime = MockRuntime::new();
        let cellar = Cellar::new(&runtime, "/opt/grew/Cellar");
        assert_eq!(
            cellar.keg_path("jq", "1.7.1"),
            PathBuf::from("/opt/grew/Cellar/jq/1.7.1")
        );
    }

    #[test]
    fn test_install_keg() {
        let dir = tempdir().unwrap();
        let stage = staging(&dir);
        let runtime = RealRuntime;
        let cellar = Cellar::new(&runtime, dir.path().join("Cellar"));

        let keg = cellar.install_keg("mypkg", "1.0.0", &stage).unwrap();

        assert_eq!(keg, dir.path().join("Cellar/mypkg/1.0.0"));
        assert!(keg.join("bin/mybin").is_file());
        assert!(cellar.is_installed("mypkg"));
    }

    #[test]
    fn test_install_keg_replaces_existing() {
        let dir = tempdir().unwrap();
        let stage = staging(&dir);
        let runtime = RealRuntime;
        let cellar = Cellar::new(&runtime, dir.path().join("Cellar"));

        let keg = cellar.keg_path("mypkg", "1.0.0");
        fs::create_dir_all(&keg).unwrap();
        fs::write(keg.join("stale"), "old").unwrap();

        cellar.install_keg("mypkg", "1.0.0", &stage).unwrap();
        assert!(!keg.join("stale").exists());
        assert!(keg.join("bin/mybin").exists());
    }

    #[test]
    fn test_install_keg_rejects_bad_tokens() {
        // Strict mock: validation must happen before any filesystem access.
        let runtime = MockRuntime::new();
        let cellar = Cellar::new(&runtime, "/opt/grew/Cellar");
        assert!(cellar.install_keg("../evil", "1.0", Path::new("/stage")).is_err());
        assert!(cellar.install_keg("ok", "../../1.0", Path::new("/stage")).is_err());
    }

    #[test]
    fn test_install_keg_failure_removes_partial() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let cellar = Cellar::new(&runtime, dir.path().join("Cellar"));

        let result = cellar.install_keg("mypkg", "1.0.0", &dir.path().join("no-such-stage"));
        assert!(result.is_err());
        assert!(!cellar.keg_path("mypkg", "1.0.0").exists());
    }

    #[test]
    fn test_uninstall() {
        let dir = tempdir().unwrap();
        let stage = staging(&dir);
        let runtime = RealRuntime;
        let cellar = Cellar::new(&runtime, dir.path().join("Cellar"));
        cellar.install_keg("mypkg", "1.0.0", &stage).unwrap();
        cellar.install_keg("mypkg", "2.0.0", &stage).unwrap();

        cellar.uninstall("mypkg").unwrap();
        assert!(!cellar.is_installed("mypkg"));
        assert!(!dir.path().join("Cellar/mypkg").exists());
    }

    #[test]
    fn test_uninstall_not_installed() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let cellar = Cellar::new(&runtime, dir.path().join("Cellar"));

        let err = cellar.uninstall("ghost").unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::NotInstalled("ghost".to_string()))
        );
        assert_eq!(err.to_string(), "formula \"ghost\" is not installed");
    }

    #[test]
    fn test_installed_versions_sorted() {
        let mut runtime = MockRuntime::new();
        let dir = PathBuf::from("/c/jq");
        runtime.expect_is_dir().returning(|_| true);
        runtime.expect_is_symlink().returning(|_| false);
        runtime
            .expect_read_dir()
            .with(eq(dir.clone()))
            .returning(|d| Ok(vec![d.join("1.7.1"), d.join("1.10"), d.join("1.6")]));

        let cellar = Cellar::new(&runtime, "/c");
        assert_eq!(
            cellar.installed_versions("jq").unwrap(),
            vec!["1.10", "1.6", "1.7.1"]
        );
        assert_eq!(cellar.installed_version("jq").unwrap(), "1.10");
    }

    #[test]
    fn test_installed_version_none() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let cellar = Cellar::new(&runtime, dir.path().join("Cellar"));
        fs::create_dir_all(dir.path().join("Cellar/empty")).unwrap();

        let err = cellar.installed_version("empty").unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::NoVersions("empty".to_string()))
        );
    }

    #[test]
    fn test_remove_keg_keeps_other_versions() {
        let dir = tempdir().unwrap();
        let stage = staging(&dir);
        let runtime = RealRuntime;
        let cellar = Cellar::new(&runtime, dir.path().join("Cellar"));
        cellar.install_keg("mypkg", "1.0.0", &stage).unwrap();
        cellar.install_keg("mypkg", "2.0.0", &stage).unwrap();

        cellar.remove_keg("mypkg", "1.0.0").unwrap();
        assert_eq!(cellar.installed_versions("mypkg").unwrap(), vec!["2.0.0"]);

        cellar.remove_keg("mypkg", "2.0.0").unwrap();
        assert!(!cellar.is_installed("mypkg"));
    }

    #[test]
    fn test_list_sorted_and_skips_empty() {
        let dir = tempdir().unwrap();
        let stage = staging(&dir);
        let runtime = RealRuntime;
        let cellar = Cellar::new(&runtime, dir.path().join("Cellar"));
        cellar.install_keg("zsh", "5.9", &stage).unwrap();
        cellar.install_keg("bat", "0.24.0", &stage).unwrap();
        fs::create_dir_all(dir.path().join("Cellar/hollow")).unwrap();

        let kegs = cellar.list().unwrap();
        let names: Vec<_> = kegs.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["bat", "zsh"]);
        assert_eq!(kegs[0].version, "0.24.0");
        assert_eq!(kegs[0].path, dir.path().join("Cellar/bat/0.24.0"));
    }

    #[test]
    fn test_list_missing_cellar() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let cellar = Cellar::new(&runtime, dir.path().join("nope"));
        assert!(cellar.list().unwrap().is_empty());
    }
}
