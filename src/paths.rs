//! Prefix layout.
//!
//! A [`Paths`] value is built once per invocation and handed to every
//! component; nothing reads the prefix from ambient state.

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// Environment variable overriding the prefix root.
pub const PREFIX_ENV: &str = "GREW_PREFIX";
/// Environment variable overriding where `.app` bundles are installed.
pub const APPDIR_ENV: &str = "GREW_APPDIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub root: PathBuf,
    pub cellar: PathBuf,
    pub opt: PathBuf,
    pub bin: PathBuf,
    pub lib: PathBuf,
    pub include: PathBuf,
    pub taps: PathBuf,
    pub caskroom: PathBuf,
    pub app_dir: PathBuf,
    pub tmp: PathBuf,
}

impl Paths {
    /// Lay out every directory under `root`.
    pub fn from_root(root: impl Into<PathBuf>, app_dir: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            cellar: root.join("Cellar"),
            opt: root.join("opt"),
            bin: root.join("bin"),
            lib: root.join("lib"),
            include: root.join("include"),
            taps: root.join("Taps"),
            caskroom: root.join("Caskroom"),
            tmp: root.join("tmp"),
            app_dir: app_dir.into(),
            root,
        }
    }

    /// Resolve the prefix for this invocation.
    ///
    /// Root: explicit override, then `GREW_PREFIX`, then `~/.grew`.
    /// Application directory: `GREW_APPDIR`, then `~/Applications`.
    #[tracing::instrument(skip(runtime))]
    pub fn resolve<R: Runtime>(runtime: &R, prefix: Option<PathBuf>) -> Result<Self> {
        let home = runtime.home_dir();

        let root = match prefix {
            Some(path) => path,
            None => match non_empty_env(runtime, PREFIX_ENV) {
                Some(path) => PathBuf::from(path),
                None => home
                    .as_ref()
                    .context("Could not find home directory; set GREW_PREFIX")?
                    .join(".grew"),
            },
        };

        let app_dir = match non_empty_env(runtime, APPDIR_ENV) {
            Some(path) => PathBuf::from(path),
            None => home
                .as_ref()
                .map(|h| h.join("Applications"))
                .unwrap_or_else(|| root.join("Applications")),
        };

        debug!("Using prefix {:?}, application dir {:?}", root, app_dir);
        Ok(Self::from_root(root, app_dir))
    }

    /// Shared directories that receive fan-out links, paired with their keg subdirectory name.
    pub fn link_dirs(&self) -> [(&'static str, &Path); 3] {
        [
            ("bin", self.bin.as_path()),
            ("lib", self.lib.as_path()),
            ("include", self.include.as_path()),
        ]
    }

    /// Create every directory under the prefix.
    ///
    /// The application directory lives outside it and is created by the
    /// first cask install.
    #[tracing::instrument(skip(self, runtime))]
    pub fn init<R: Runtime>(&self, runtime: &R) -> Result<()> {
        for dir in [
            &self.root,
            &self.cellar,
            &self.opt,
            &self.bin,
            &self.lib,
            &self.include,
            &self.taps,
            &self.caskroom,
            &self.tmp,
        ] {
            runtime
                .create_dir_all(dir)
                .with_context(|| format!("create directory {}", dir.display()))?;
        }
        Ok(())
    }
}

fn non_empty_env<R: Runtime>(runtime: &R, key: &str) -> Option<String> {
    runtime.env_var(key).ok().filter(|v| !v.is_empty())
}
