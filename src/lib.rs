pub mod application;
pub mod archive;
pub mod cask;
pub mod cellar;
pub mod cleanup;
pub mod commands;
pub mod download;
pub mod formula;
pub mod fsutil;
pub mod http;
pub mod linker;
pub mod paths;
pub mod resolver;
pub mod runtime;
pub mod validation;

/// Test fixtures shared by unit tests.
#[cfg(test)]
pub mod test_utils {
    use crate::download::Fetcher;
    use crate::formula::{Formula, InstallSpec, InstallType, MockCatalog, platform_key};
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use sha2::{Digest, Sha256};
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Home directory handed out by mocked runtimes: `/home/user`.
    pub fn test_home() -> PathBuf {
        PathBuf::from("/home/user")
    }

    /// Default prefix under [`test_home`]: `/home/user/.grew`.
    pub fn test_root() -> PathBuf {
        test_home().join(".grew")
    }

    /// A valid archive formula for the host platform.
    pub fn formula(name: &str, version: &str, deps: &[&str]) -> Formula {
        let platform = platform_key();
        Formula {
            name: name.to_string(),
            version: version.to_string(),
            description: format!("{name} test formula"),
            homepage: "https://example.com".to_string(),
            license: "MIT".to_string(),
            url: BTreeMap::from([(
                platform.clone(),
                format!("https://example.com/{name}-{version}.tar.gz"),
            )]),
            sha256: BTreeMap::from([(platform, "0".repeat(64))]),
            install: InstallSpec {
                kind: InstallType::Archive,
                binary_name: None,
                strip_components: 0,
            },
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            keg_only: false,
        }
    }

    /// A catalog answering from a fixed set of formulae.
    pub fn mock_catalog(formulae: Vec<Formula>) -> MockCatalog {
        let by_name: BTreeMap<String, Formula> = formulae
            .into_iter()
            .map(|f| (f.name.clone(), f))
            .collect();
        let all: Vec<Formula> = by_name.values().cloned().collect();

        let mut catalog = MockCatalog::new();
        catalog.expect_load_by_name().returning(move |name| {
            by_name
                .get(name)
                .cloned()
                .ok_or_else(|| crate::formula::CatalogError::NotFound(name.to_string()).into())
        });
        catalog
            .expect_load_all()
            .returning(move || Ok(all.clone()));
        catalog
    }

    /// A `.tar.gz` holding `files` as executable regular files.
    pub fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
        let mut tar = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(name).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            tar.append(&header, content.as_bytes()).unwrap();
        }
        tar.into_inner().unwrap().finish().unwrap()
    }

    pub fn sha256_hex(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    /// Serves artifacts from memory and records every URL requested.
    #[derive(Default)]
    pub struct FixtureFetcher {
        artifacts: BTreeMap<String, Vec<u8>>,
        pub fetched: Mutex<Vec<String>>,
    }

    impl FixtureFetcher {
        /// Serve `files` as the host-platform archive of `formula`, pointing
        /// its url and digest at the new artifact.
        pub fn publish(&mut self, formula: &mut Formula, files: &[(&str, &str)]) {
            let data = tar_gz(files);
            let url = format!("https://example.com/{}-{}.tar.gz", formula.name, formula.version);
            formula.url = BTreeMap::from([(platform_key(), url.clone())]);
            formula.sha256 = BTreeMap::from([(platform_key(), sha256_hex(&data))]);
            self.artifacts.insert(url, data);
        }

        pub fn serve(&mut self, url: &str, data: Vec<u8>) {
            self.artifacts.insert(url.to_string(), data);
        }

        pub fn fetch_count(&self) -> usize {
            self.fetched.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Fetcher for FixtureFetcher {
        async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
            self.fetched.lock().unwrap().push(url.to_string());
            let data = self
                .artifacts
                .get(url)
                .ok_or_else(|| anyhow!("404 for {}", url))?;
            std::fs::write(dest, data)?;
            Ok(data.len() as u64)
        }
    }
}
