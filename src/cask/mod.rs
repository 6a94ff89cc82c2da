//! Application-bundle packages ("casks").
//!
//! # Structure
//!
//! - `caskroom` - Install records under `Caskroom/<name>/<version>/`
//! - `installer` - Copying `.app` bundles and linking their binaries

mod caskroom;
mod installer;

pub use caskroom::{Caskroom, InstalledCask};
pub use installer::AppInstaller;

use anyhow::{Context, Result, bail};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::formula::{CASK_TAP, platform_key, sorted_keys};
use crate::runtime::Runtime;
use crate::validation::{self, is_valid_name, is_valid_version, validate_name};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaskError {
    #[error("cask not found: {0}")]
    NotFound(String),
    #[error("cask {0:?} is not installed")]
    NotInstalled(String),
    #[error("{} already links to {}, which no cask owns", path.display(), target.display())]
    BinConflict { path: PathBuf, target: PathBuf },
}

/// What to take from the unpacked archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
    /// `.app` bundles copied into the application directory.
    #[serde(default)]
    pub app: Vec<String>,
    /// Executables inside those bundles, linked into `bin/`.
    #[serde(default)]
    pub bin: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cask {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub url: BTreeMap<String, String>,
    #[serde(default)]
    pub sha256: BTreeMap<String, String>,
    #[serde(default)]
    pub artifacts: Artifacts,
}

impl Cask {
    pub fn parse(data: &str) -> Result<Self> {
        let cask: Cask =
            serde_yaml::from_str(data).map_err(|e| anyhow::anyhow!("parse cask YAML: {}", e))?;
        cask.validate()?;
        Ok(cask)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            bail!("cask missing required field: name");
        }
        if !is_valid_name(&self.name) {
            bail!("cask name {:?} contains invalid characters", self.name);
        }
        if self.version.is_empty() {
            bail!("cask {:?} missing required field: version", self.name);
        }
        if !is_valid_version(&self.version) {
            bail!(
                "cask {:?}: version {:?} contains invalid characters",
                self.name,
                self.version
            );
        }
        if self.url.is_empty() {
            bail!("cask {:?} missing required field: url", self.name);
        }
        for (platform, url) in &self.url {
            if !url.starts_with("https://") {
                bail!("cask {:?}: URL for {} must use HTTPS: {}", self.name, platform, url);
            }
        }
        if self.artifacts.app.is_empty() && self.artifacts.bin.is_empty() {
            bail!(
                "cask {:?}: must declare at least one artifact (app or bin)",
                self.name
            );
        }
        for app in &self.artifacts.app {
            if !app.ends_with(".app") {
                bail!("cask {:?}: app artifact {:?} must end with .app", self.name, app);
            }
        }
        Ok(())
    }

    /// Download URL for the running host.
    pub fn url(&self) -> Result<&str> {
        let platform = platform_key();
        let Some(url) = self.url.get(&platform) else {
            bail!(
                "cask {:?} does not support platform {}; available: {}",
                self.name,
                platform,
                sorted_keys(&self.url)
            );
        };
        if !url.starts_with("https://") {
            bail!(
                "cask {:?}: refusing to download over insecure HTTP: {}",
                self.name,
                url
            );
        }
        Ok(url)
    }

    /// Expected SHA-256 for the running host.
    pub fn sha256(&self) -> Result<&str> {
        let platform = platform_key();
        let Some(digest) = self.sha256.get(&platform) else {
            bail!("cask {:?} has no SHA256 for platform {}", self.name, platform);
        };
        validation::validate_sha256(digest).map_err(|e| {
            anyhow::anyhow!("cask {:?}: invalid SHA256 for {}: {}", self.name, platform, e)
        })?;
        Ok(digest)
    }
}

/// Cask definitions at `<taps>/cask/<name>.yaml`.
pub struct CaskCatalog<'a, R: Runtime> {
    runtime: &'a R,
    dir: PathBuf,
}

impl<'a, R: Runtime> CaskCatalog<'a, R> {
    pub fn new(runtime: &'a R, taps_dir: &Path) -> Self {
        Self {
            runtime,
            dir: taps_dir.join(CASK_TAP),
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn load_by_name(&self, name: &str) -> Result<Cask> {
        validate_name(name)?;
        let path = self.dir.join(format!("{}.yaml", name));
        if !self.runtime.is_file(&path) {
            return Err(CaskError::NotFound(name.to_string()).into());
        }
        let cask = self.load_file(&path)?;
        if cask.name != name {
            bail!(
                "{} declares name {:?}, expected {:?}",
                path.display(),
                cask.name,
                name
            );
        }
        Ok(cask)
    }

    /// Every parseable cask; broken definitions are skipped.
    #[tracing::instrument(skip(self))]
    pub fn load_all(&self) -> Result<Vec<Cask>> {
        if !self.runtime.is_dir(&self.dir) {
            return Ok(Vec::new());
        }
        let mut casks = Vec::new();
        for path in self.runtime.read_dir(&self.dir).context("read cask tap")? {
            if path.extension().is_none_or(|ext| ext != "yaml") {
                continue;
            }
            match self.load_file(&path) {
                Ok(cask) => casks.push(cask),
                Err(e) => debug!("Skipping cask {:?}: {:#}", path, e),
            }
        }
        Ok(casks)
    }

    fn load_file(&self, path: &Path) -> Result<Cask> {
        let data = self
            .runtime
            .read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        Cask::parse(&data).with_context(|| format!("parse {}", path.display()))
    }
}
