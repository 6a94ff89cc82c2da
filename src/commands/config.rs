use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use crate::{
    download::HttpsFetcher,
    formula::TapCatalog,
    http::HttpClient,
    paths::Paths,
    runtime::Runtime,
};

/// Everything one invocation needs: the runtime and the resolved prefix.
pub struct Config<R: Runtime> {
    pub runtime: R,
    pub paths: Paths,
}

impl<R: Runtime> Config<R> {
    /// Resolve the prefix and make sure its directories exist.
    pub fn new(runtime: R, prefix: Option<PathBuf>) -> Result<Self> {
        let paths = Paths::resolve(&runtime, prefix)?;
        debug!("Using prefix {:?}", paths.root);
        paths.init(&runtime)?;
        Ok(Self { runtime, paths })
    }

    pub fn catalog(&self) -> TapCatalog<'_, R> {
        TapCatalog::new(&self.runtime, &self.paths.taps)
    }

    pub fn fetcher(&self) -> Result<HttpsFetcher<'_, R>> {
        Ok(HttpsFetcher::new(&self.runtime, HttpClient::with_default_agent()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use tempfile::tempdir;

    #[test]
    fn test_config_creates_prefix() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("prefix");

        let config = Config::new(RealRuntime, Some(root.clone())).unwrap();

        assert_eq!(config.paths.root, root);
        assert!(root.join("Cellar").is_dir());
        assert!(root.join("tmp").is_dir());
        assert!(config.fetcher().is_ok());
    }
}
