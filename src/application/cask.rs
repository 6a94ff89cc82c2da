//! Cask use cases - install, uninstall and search application bundles.

use anyhow::{Context, Result};
use log::{debug, info, warn};

use super::search::matches;
use crate::archive;
use crate::cask::{AppInstaller, Cask, CaskCatalog, CaskError, Caskroom, InstalledCask};
use crate::cleanup::ScratchGuard;
use crate::download::{Fetcher, artifact_file_name, fetch_verified};
use crate::formula::InstallSpec;
use crate::paths::Paths;
use crate::runtime::Runtime;

pub struct CaskAction<'a, R: Runtime> {
    runtime: &'a R,
    paths: &'a Paths,
    catalog: CaskCatalog<'a, R>,
    caskroom: Caskroom<'a, R>,
    apps: AppInstaller<'a, R>,
}

impl<'a, R: Runtime> CaskAction<'a, R> {
    pub fn new(runtime: &'a R, paths: &'a Paths) -> Self {
        Self {
            runtime,
            paths,
            catalog: CaskCatalog::new(runtime, &paths.taps),
            caskroom: Caskroom::new(runtime, &paths.caskroom),
            apps: AppInstaller::new(runtime, &paths.app_dir, &paths.bin),
        }
    }

    /// Fetch, verify and unpack a cask, copy its bundles and link its binaries.
    ///
    /// Returns `false` when the cask was already installed.
    #[tracing::instrument(skip(self, fetcher))]
    pub async fn install<F: Fetcher>(&self, fetcher: &F, name: &str) -> Result<bool> {
        let cask = self.catalog.load_by_name(name)?;
        if self.caskroom.is_installed(name) {
            println!(
                "==> {} {} is already installed, skipping",
                cask.name, cask.version
            );
            return Ok(false);
        }

        println!("==> Installing cask {} {}", cask.name, cask.version);
        let url = cask.url()?;
        let sha256 = cask.sha256()?;
        info!("URL: {}", url);

        let mut scratch = ScratchGuard::new(self.runtime);
        scratch.add(
            self.paths
                .tmp
                .join(artifact_file_name(&cask.name, &cask.version, url)),
        );
        let artifact = fetch_verified(
            self.runtime,
            fetcher,
            &self.paths.tmp,
            &cask.name,
            &cask.version,
            url,
            sha256,
        )
        .await?;
        println!("==> SHA256 verified");

        let stage = scratch.add(
            self.paths
                .tmp
                .join(format!("{}-{}-cask-stage", cask.name, cask.version)),
        );
        if self.runtime.exists(&stage) {
            self.runtime.remove_dir_all(&stage)?;
        }
        archive::extract(self.runtime, &artifact, &stage, &InstallSpec::archive(0))
            .with_context(|| format!("extract {}", cask.name))?;

        for app in &cask.artifacts.app {
            let dest = self
                .apps
                .install_app(&stage, app)
                .with_context(|| format!("install {}", app))?;
            println!("==> Installed {} to {}", app, self.paths.app_dir.display());
            debug!("Bundle at {}", dest.display());
        }
        self.link_binaries(&cask);

        self.caskroom.record(&cask.name, &cask.version)?;
        println!("==> {} {} installed", cask.name, cask.version);
        Ok(true)
    }

    fn link_binaries(&self, cask: &Cask) {
        for bin in &cask.artifacts.bin {
            let Some(target) = self.apps.find_binary(&cask.artifacts.app, bin) else {
                warn!("Binary {} not found in {} app bundles", bin, cask.name);
                continue;
            };
            match self.apps.link_bin(bin, &target) {
                Ok(link) => info!("Linked {} -> {}", link.display(), target.display()),
                Err(e) => warn!("Could not link {}: {:#}", bin, e),
            }
        }
    }

    /// Remove a cask's bundles, its `bin/` links and its Caskroom record.
    ///
    /// Bundles and links come from the current definition when it can still
    /// be loaded; otherwise only the record is removed.
    #[tracing::instrument(skip(self))]
    pub fn uninstall(&self, name: &str) -> Result<()> {
        if !self.caskroom.is_installed(name) {
            return Err(CaskError::NotInstalled(name.to_string()).into());
        }
        match self.catalog.load_by_name(name) {
            Ok(cask) => {
                for app in &cask.artifacts.app {
                    println!("==> Removing {}...", app);
                    self.apps
                        .uninstall_app(app)
                        .with_context(|| format!("remove {}", app))?;
                }
                for bin in &cask.artifacts.bin {
                    self.apps
                        .unlink_bin(bin)
                        .with_context(|| format!("unlink {}", bin))?;
                }
            }
            Err(e) => warn!("Cask definition for {} unavailable, removing record only: {:#}", name, e),
        }
        self.caskroom.remove(name)?;
        println!("==> {} uninstalled", name);
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<InstalledCask>> {
        self.caskroom.list()
    }

    /// Casks whose name or description contains `query`, ignoring case.
    pub fn search(&self, query: &str) -> Result<Vec<Cask>> {
        let query = query.to_lowercase();
        let mut found: Vec<Cask> = self
            .catalog
            .load_all()?
            .into_iter()
            .filter(|c| matches(&query, &c.name, &c.description))
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.caskroom.is_installed(name)
    }
}
