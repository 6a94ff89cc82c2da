//! Install use case - resolve, fetch, verify, extract, store, link.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use log::{debug, info};

use crate::archive;
use crate::cellar::Cellar;
use crate::cleanup::ScratchGuard;
use crate::download::{Fetcher, artifact_file_name, fetch_verified};
use crate::formula::{Catalog, Formula, platform_key};
use crate::linker::Linker;
use crate::paths::Paths;
use crate::resolver::Resolver;
use crate::runtime::Runtime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    AlreadyInstalled,
    Linked,
    KegOnly,
}

/// Install, reinstall and upgrade pipelines.
///
/// Every step runs to completion before the next one starts; the first
/// failure aborts the pipeline with the step and formula name in the error.
pub struct Installer<'a, R: Runtime, C: Catalog, F: Fetcher> {
    pub(super) runtime: &'a R,
    pub(super) paths: &'a Paths,
    pub(super) catalog: &'a C,
    pub(super) fetcher: &'a F,
    pub(super) cellar: Cellar<'a, R>,
    pub(super) linker: Linker<'a, R>,
}

impl<'a, R: Runtime, C: Catalog, F: Fetcher> Installer<'a, R, C, F> {
    pub fn new(runtime: &'a R, paths: &'a Paths, catalog: &'a C, fetcher: &'a F) -> Self {
        Self {
            runtime,
            paths,
            catalog,
            fetcher,
            cellar: Cellar::new(runtime, &paths.cellar),
            linker: Linker::new(runtime, paths),
        }
    }

    /// Install `name` and everything it depends on, dependencies first.
    #[tracing::instrument(skip(self))]
    pub async fn install(&self, name: &str) -> Result<Vec<InstallOutcome>> {
        let order = Resolver::new(self.catalog).resolve(name)?;
        if order.len() > 1 {
            let names: Vec<&str> = order.iter().map(|f| f.name.as_str()).collect();
            info!("Install order: {}", names.join(", "));
        }

        let mut outcomes = Vec::with_capacity(order.len());
        for formula in &order {
            outcomes.push(self.install_formula(formula).await?);
        }
        Ok(outcomes)
    }

    /// Install one formula without looking at its dependencies.
    pub async fn install_formula(&self, formula: &Formula) -> Result<InstallOutcome> {
        if self.cellar.is_installed(&formula.name) {
            println!(
                "==> {} {} is already installed, skipping",
                formula.name, formula.version
            );
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        println!("==> Installing {} {}", formula.name, formula.version);
        let keg = self.build_keg(formula).await?;
        self.linker
            .link(&formula.name, &formula.version, formula.keg_only)
            .with_context(|| format!("link {}", formula.name))?;
        debug!("Linked opt/{} -> {}", formula.name, keg.display());

        Ok(self.report_installed(formula))
    }

    /// Reinstall an installed formula from the current catalog definition.
    #[tracing::instrument(skip(self))]
    pub async fn reinstall(&self, name: &str) -> Result<InstallOutcome> {
        if !self.cellar.is_installed(name) {
            bail!("formula {:?} is not installed (use 'grew install' instead)", name);
        }
        let formula = self.catalog.load_by_name(name)?;
        println!("==> Reinstalling {} {}", formula.name, formula.version);

        self.linker
            .unlink(name)
            .with_context(|| format!("unlink {}", name))?;
        self.cellar
            .uninstall(name)
            .context("remove old installation")?;

        self.install_formula(&formula).await
    }

    /// Download, verify and extract `formula` into a new keg, without linking.
    ///
    /// The download and the staging tree are removed whatever happens.
    pub(super) async fn build_keg(&self, formula: &Formula) -> Result<PathBuf> {
        debug!(
            "platform: {}, install type: {:?}, keg_only: {}",
            platform_key(),
            formula.install.kind,
            formula.keg_only
        );
        let url = formula.url()?;
        let sha256 = formula.sha256()?;
        info!("URL: {}", url);

        let mut scratch = ScratchGuard::new(self.runtime);
        scratch.add(
            self.paths
                .tmp
                .join(artifact_file_name(&formula.name, &formula.version, url)),
        );
        let artifact = fetch_verified(
            self.runtime,
            self.fetcher,
            &self.paths.tmp,
            &formula.name,
            &formula.version,
            url,
            sha256,
        )
        .await?;
        println!("==> SHA256 verified");

        let stage = scratch.add(
            self.paths
                .tmp
                .join(format!("{}-{}-stage", formula.name, formula.version)),
        );
        if self.runtime.exists(&stage) {
            self.runtime.remove_dir_all(&stage)?;
        }
        archive::extract(self.runtime, &artifact, &stage, &formula.install)
            .with_context(|| format!("extract {}", formula.name))?;

        let keg = self
            .cellar
            .install_keg(&formula.name, &formula.version, &stage)
            .with_context(|| format!("cellar install {}", formula.name))?;
        info!("Installed to cellar: {}", keg.display());
        Ok(keg)
    }

    pub(super) fn report_installed(&self, formula: &Formula) -> InstallOutcome {
        if formula.keg_only {
            println!(
                "==> {} {} installed (keg-only, not linked)",
                formula.name, formula.version
            );
            InstallOutcome::KegOnly
        } else {
            println!("==> {} {} installed and linked", formula.name, formula.version);
            InstallOutcome::Linked
        }
    }
}
