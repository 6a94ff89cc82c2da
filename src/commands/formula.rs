//! `install`, `uninstall`, `reinstall`, `upgrade` and `outdated`.

use anyhow::Result;
use log::debug;

use super::config::Config;
use crate::{
    application::{CaskAction, Installer, Outdated, RemoveAction},
    cellar::{Cellar, StoreError},
    download::Fetcher,
    formula::Catalog,
    runtime::Runtime,
};

#[tracing::instrument(skip(config))]
pub async fn install<R: Runtime>(config: &Config<R>, names: &[String], cask: bool) -> Result<()> {
    let fetcher = config.fetcher()?;
    install_with(config, &config.catalog(), &fetcher, names, cask).await
}

pub(crate) async fn install_with<R: Runtime, C: Catalog, F: Fetcher>(
    config: &Config<R>,
    catalog: &C,
    fetcher: &F,
    names: &[String],
    cask: bool,
) -> Result<()> {
    if cask {
        let action = CaskAction::new(&config.runtime, &config.paths);
        for name in names {
            action.install(fetcher, name).await?;
        }
        return Ok(());
    }

    let installer = Installer::new(&config.runtime, &config.paths, catalog, fetcher);
    for name in names {
        let outcomes = installer.install(name).await?;
        debug!("{}: {:?}", name, outcomes);
    }
    Ok(())
}

#[tracing::instrument(skip(config))]
pub fn uninstall<R: Runtime>(config: &Config<R>, name: &str, cask: bool) -> Result<()> {
    if cask {
        return CaskAction::new(&config.runtime, &config.paths).uninstall(name);
    }

    let action = RemoveAction::new(&config.runtime, &config.paths);
    if !action.is_installed(name) {
        return Err(StoreError::NotInstalled(name.to_string()).into());
    }
    println!("==> Unlinking {}...", name);
    println!("==> Removing {}...", name);
    action.uninstall(name)?;
    println!("==> {} uninstalled", name);
    Ok(())
}

#[tracing::instrument(skip(config))]
pub async fn reinstall<R: Runtime>(config: &Config<R>, name: &str) -> Result<()> {
    let fetcher = config.fetcher()?;
    let catalog = config.catalog();
    Installer::new(&config.runtime, &config.paths, &catalog, &fetcher)
        .reinstall(name)
        .await?;
    Ok(())
}

#[tracing::instrument(skip(config))]
pub async fn upgrade<R: Runtime>(config: &Config<R>, names: &[String]) -> Result<()> {
    let fetcher = config.fetcher()?;
    let catalog = config.catalog();
    let upgraded = Installer::new(&config.runtime, &config.paths, &catalog, &fetcher)
        .upgrade(names)
        .await?;
    debug!("Upgraded {} formulae", upgraded);
    Ok(())
}

#[tracing::instrument(skip(config))]
pub fn outdated<R: Runtime>(config: &Config<R>) -> Result<()> {
    let cellar = Cellar::new(&config.runtime, &config.paths.cellar);
    if cellar.list()?.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }

    let fetcher = config.fetcher()?;
    let catalog = config.catalog();
    let outdated = Installer::new(&config.runtime, &config.paths, &catalog, &fetcher).outdated()?;
    if outdated.is_empty() {
        println!("All packages are up-to-date.");
    }
    for line in outdated_lines(&outdated) {
        println!("{}", line);
    }
    Ok(())
}

fn outdated_lines(outdated: &[Outdated]) -> Vec<String> {
    outdated
        .iter()
        .map(|o| format!("{:<20} {} -> {}", o.name, o.installed, o.latest.version))
        .collect()
}
