//! Read-only commands: `list`, `search` and `deps`.

use anyhow::{Context, Result};
use log::debug;

use super::config::Config;
use crate::{
    application::{CaskAction, flat_dependencies, search_formulae, tree_lines},
    cellar::Cellar,
    formula::Catalog,
    runtime::Runtime,
};

/// List installed formulae (or casks) as `name version` columns or JSON.
#[tracing::instrument(skip(config))]
pub fn list<R: Runtime>(config: &Config<R>, cask: bool, json: bool) -> Result<()> {
    let lines = if cask {
        let casks = CaskAction::new(&config.runtime, &config.paths).list()?;
        if json {
            println!("{}", serde_json::to_string_pretty(&casks).context("serialize casks")?);
            return Ok(());
        }
        if casks.is_empty() {
            println!("No casks installed.");
            return Ok(());
        }
        casks
            .iter()
            .map(|c| format!("{:<20} {}", c.name, c.version))
            .collect::<Vec<_>>()
    } else {
        let kegs = Cellar::new(&config.runtime, &config.paths.cellar).list()?;
        if json {
            println!("{}", serde_json::to_string_pretty(&kegs).context("serialize packages")?);
            return Ok(());
        }
        if kegs.is_empty() {
            println!("No packages installed.");
            return Ok(());
        }
        kegs.iter()
            .map(|k| format!("{:<20} {}", k.name, k.version))
            .collect()
    };

    debug!("Listing {} entries", lines.len());
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

/// Search the catalog, marking installed entries with `*`.
#[tracing::instrument(skip(config))]
pub fn search<R: Runtime>(config: &Config<R>, query: &str, cask: bool) -> Result<()> {
    let lines = if cask {
        let action = CaskAction::new(&config.runtime, &config.paths);
        action
            .search(query)?
            .into_iter()
            .map(|c| search_line(action.is_installed(&c.name), &c.name, &c.description))
            .collect()
    } else {
        search_lines(config, &config.catalog(), query)?
    };

    if lines.is_empty() {
        let kind = if cask { "casks" } else { "formulas" };
        println!("No {} found matching {:?}", kind, query.to_lowercase());
    }
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

fn search_lines<R: Runtime, C: Catalog>(
    config: &Config<R>,
    catalog: &C,
    query: &str,
) -> Result<Vec<String>> {
    let cellar = Cellar::new(&config.runtime, &config.paths.cellar);
    Ok(search_formulae(catalog, query)?
        .into_iter()
        .map(|f| search_line(cellar.is_installed(&f.name), &f.name, &f.description))
        .collect())
}

fn search_line(installed: bool, name: &str, description: &str) -> String {
    let marker = if installed { "*" } else { " " };
    format!("{} {:<20} {}", marker, name, description)
}

/// Print the dependencies of `name`, flat and sorted or as a tree.
#[tracing::instrument(skip(config))]
pub fn deps<R: Runtime>(config: &Config<R>, name: &str, tree: bool) -> Result<()> {
    let catalog = config.catalog();
    let lines = if tree {
        tree_lines(&catalog, name)?
    } else {
        flat_dependencies(&catalog, name)?
    };
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}
