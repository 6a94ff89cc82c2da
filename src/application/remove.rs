//! Remove action - unlink and delete every keg of a formula.

use anyhow::{Context, Result};
use log::debug;

use crate::cellar::{Cellar, StoreError};
use crate::linker::Linker;
use crate::paths::Paths;
use crate::runtime::Runtime;

pub struct RemoveAction<'a, R: Runtime> {
    cellar: Cellar<'a, R>,
    linker: Linker<'a, R>,
}

impl<'a, R: Runtime> RemoveAction<'a, R> {
    pub fn new(runtime: &'a R, paths: &'a Paths) -> Self {
        Self {
            cellar: Cellar::new(runtime, &paths.cellar),
            linker: Linker::new(runtime, paths),
        }
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.cellar.is_installed(name)
    }

    /// Remove the links first, then the kegs.
    ///
    /// Links that are already gone are not an error.
    #[tracing::instrument(skip(self))]
    pub fn uninstall(&self, name: &str) -> Result<()> {
        if !self.cellar.is_installed(name) {
            return Err(StoreError::NotInstalled(name.to_string()).into());
        }
        let removed = self
            .linker
            .unlink_with(name, false)
            .with_context(|| format!("unlink {}", name))?;
        debug!("Removed {} links for {}", removed.len(), name);
        self.cellar.uninstall(name)
    }
}
