//! Upgrade use case - find outdated formulae and move them to the catalog version.

use anyhow::{Context, Result};
use log::{debug, info, warn};

use super::install::Installer;
use crate::cellar::StoreError;
use crate::download::Fetcher;
use crate::formula::{Catalog, Formula};
use crate::resolver::Resolver;
use crate::runtime::Runtime;

/// An installed formula whose active version differs from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outdated {
    pub name: String,
    pub installed: String,
    pub latest: Formula,
}

impl<R: Runtime, C: Catalog, F: Fetcher> Installer<'_, R, C, F> {
    /// The version `opt/<name>` points at, else the first installed one.
    pub fn active_version(&self, name: &str) -> Result<String> {
        match self.linker.linked_version(name) {
            Some(version) => Ok(version),
            None => self.cellar.installed_version(name),
        }
    }

    /// Installed formulae whose catalog version differs, sorted by name.
    ///
    /// Formulae no longer in any tap are skipped.
    #[tracing::instrument(skip(self))]
    pub fn outdated(&self) -> Result<Vec<Outdated>> {
        let mut outdated = Vec::new();
        for keg in self.cellar.list()? {
            let installed = self.active_version(&keg.name)?;
            match self.catalog.load_by_name(&keg.name) {
                Ok(latest) if latest.version != installed => outdated.push(Outdated {
                    name: keg.name,
                    installed,
                    latest,
                }),
                Ok(_) => {}
                Err(e) => debug!("Skipping {}: not in any tap ({:#})", keg.name, e),
            }
        }
        Ok(outdated)
    }

    /// Upgrade `names`, or every outdated formula when `names` is empty.
    ///
    /// Returns how many formulae were upgraded.
    #[tracing::instrument(skip(self))]
    pub async fn upgrade(&self, names: &[String]) -> Result<usize> {
        let targets = if names.is_empty() {
            self.outdated()?
        } else {
            let mut targets = Vec::new();
            for name in names {
                if !self.cellar.is_installed(name) {
                    return Err(StoreError::NotInstalled(name.clone()).into());
                }
                let latest = self.catalog.load_by_name(name)?;
                let installed = self.active_version(name)?;
                if installed == latest.version {
                    println!("==> {} {} already up-to-date", name, installed);
                    continue;
                }
                targets.push(Outdated {
                    name: name.clone(),
                    installed,
                    latest,
                });
            }
            targets
        };

        if targets.is_empty() {
            println!("All packages are up-to-date.");
            return Ok(0);
        }

        for target in &targets {
            self.upgrade_one(target).await?;
        }
        Ok(targets.len())
    }

    /// Build the new keg, swap the links over, then drop the old keg.
    ///
    /// If linking the new keg fails the old one is linked again and the new
    /// keg is removed.
    async fn upgrade_one(&self, target: &Outdated) -> Result<()> {
        let name = target.name.as_str();
        let latest = &target.latest;
        println!(
            "==> Upgrading {} {} -> {}",
            name, target.installed, latest.version
        );

        let order = Resolver::new(self.catalog).resolve(name)?;
        for dependency in order.iter().filter(|f| f.name != name) {
            self.install_formula(dependency).await?;
        }

        self.build_keg(latest).await?;

        self.linker
            .unlink(name)
            .with_context(|| format!("unlink {}", name))?;
        if let Err(e) = self.linker.link(name, &latest.version, latest.keg_only) {
            warn!("Linking {} {} failed, restoring {}", name, latest.version, target.installed);
            if let Err(restore) = self.linker.link(name, &target.installed, latest.keg_only) {
                warn!("Could not relink {} {}: {:#}", name, target.installed, restore);
            }
            if let Err(remove) = self.cellar.remove_keg(name, &latest.version) {
                warn!("Could not remove new keg {} {}: {:#}", name, latest.version, remove);
            }
            return Err(e).with_context(|| format!("link {}", name));
        }

        match self.cellar.remove_keg(name, &target.installed) {
            Ok(()) => info!("Removed old keg {} {}", name, target.installed),
            Err(e) => warn!("Could not remove old keg {} {}: {:#}", name, target.installed, e),
        }

        self.report_installed(latest);
        Ok(())
    }
}
