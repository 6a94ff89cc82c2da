use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::Formula;
use crate::runtime::Runtime;
use crate::validation::validate_name;

/// Tap directory that holds cask definitions rather than formulae.
pub const CASK_TAP: &str = "cask";

const DEFINITION_EXT: &str = "yaml";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("formula {0:?} not found in any tap")]
    NotFound(String),
}

/// Lookup of formula definitions by name.
#[cfg_attr(test, mockall::automock)]
pub trait Catalog: Send + Sync {
    /// Load a single formula. Fails with [`CatalogError::NotFound`] when no tap has it.
    fn load_by_name(&self, name: &str) -> Result<Formula>;

    /// Load every parseable formula. Unparseable definitions are skipped.
    fn load_all(&self) -> Result<Vec<Formula>>;
}

/// Catalog backed by YAML files at `<taps>/<tap>/<name>.yaml`.
///
/// Taps are searched in sorted order and the first match wins.
pub struct TapCatalog<'a, R: Runtime> {
    runtime: &'a R,
    taps_dir: PathBuf,
}

impl<'a, R: Runtime> TapCatalog<'a, R> {
    pub fn new(runtime: &'a R, taps_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            taps_dir: taps_dir.into(),
        }
    }

    fn formula_taps(&self) -> Result<Vec<PathBuf>> {
        if !self.runtime.is_dir(&self.taps_dir) {
            return Ok(Vec::new());
        }
        let taps = self
            .runtime
            .read_dir(&self.taps_dir)
            .with_context(|| format!("read taps directory {}", self.taps_dir.display()))?
            .into_iter()
            .filter(|p| self.runtime.is_dir(p))
            .filter(|p| p.file_name().is_some_and(|n| n != CASK_TAP))
            .collect();
        Ok(taps)
    }

    fn load_file(&self, path: &Path) -> Result<Formula> {
        let data = self
            .runtime
            .read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        Formula::parse(&data).with_context(|| format!("parse {}", path.display()))
    }
}

impl<R: Runtime> Catalog for TapCatalog<'_, R> {
    #[tracing::instrument(skip(self))]
    fn load_by_name(&self, name: &str) -> Result<Formula> {
        validate_name(name)?;
        let file_name = format!("{}.{}", name, DEFINITION_EXT);

        for tap in self.formula_taps()? {
            let path = tap.join(&file_name);
            if !self.runtime.is_file(&path) {
                continue;
            }
            debug!("Loading formula {} from {:?}", name, path);
            let formula = self.load_file(&path)?;
            if formula.name != name {
                anyhow::bail!(
                    "{} declares name {:?}, expected {:?}",
                    path.display(),
                    formula.name,
                    name
                );
            }
            return Ok(formula);
        }

        Err(CatalogError::NotFound(name.to_string()).into())
    }

    #[tracing::instrument(skip(self))]
    fn load_all(&self) -> Result<Vec<Formula>> {
        let mut formulae = Vec::new();
        for tap in self.formula_taps()? {
            for path in self.runtime.read_dir(&tap)? {
                if path.extension().is_none_or(|ext| ext != DEFINITION_EXT) {
                    continue;
                }
                match self.load_file(&path) {
                    Ok(formula) => formulae.push(formula),
                    Err(e) => debug!("Skipping {:?}: {:#}", path, e),
                }
            }
        }
        Ok(formulae)
    }
}
