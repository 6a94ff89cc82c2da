//! Formula definitions and the catalog they are loaded from.

mod catalog;

pub use catalog::{CASK_TAP, Catalog, CatalogError, TapCatalog};

#[cfg(test)]
pub use catalog::MockCatalog;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::validation::{self, is_valid_name, is_valid_version};

/// How the downloaded artifact becomes a keg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallType {
    /// The artifact is the executable itself.
    Binary,
    /// The artifact is a `.tar.gz`/`.tgz` or `.zip` archive.
    Archive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallSpec {
    #[serde(rename = "type")]
    pub kind: InstallType,
    /// Executable name. For `binary` installs this names `bin/<binary_name>`;
    /// for `archive` installs a file of this name at the archive root is moved into `bin/`.
    #[serde(default)]
    pub binary_name: Option<String>,
    /// Leading path segments dropped from every archive member.
    #[serde(default)]
    pub strip_components: usize,
}

impl InstallSpec {
    pub fn archive(strip_components: usize) -> Self {
        Self {
            kind: InstallType::Archive,
            binary_name: None,
            strip_components,
        }
    }
}

/// An immutable package definition as supplied by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub license: String,
    /// Download URL per platform key.
    #[serde(default)]
    pub url: BTreeMap<String, String>,
    /// Hex SHA-256 per platform key.
    #[serde(default)]
    pub sha256: BTreeMap<String, String>,
    pub install: InstallSpec,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub keg_only: bool,
}

/// Platform key for the running host, e.g. `darwin_arm64` or `linux_amd64`.
pub fn platform_key() -> String {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    };
    format!("{}_{}", os, arch)
}

/// Comma-separated keys in sorted order.
pub(crate) fn sorted_keys(map: &BTreeMap<String, String>) -> String {
    map.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
}

impl Formula {
    /// Parse and validate a YAML formula definition.
    pub fn parse(data: &str) -> Result<Self> {
        let formula: Formula = serde_yaml::from_str(data)
            .map_err(|e| anyhow::anyhow!("parse formula YAML: {}", e))?;
        formula.validate()?;
        Ok(formula)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            bail!("formula missing required field: name");
        }
        if !is_valid_name(&self.name) {
            bail!("formula name {:?} contains invalid characters", self.name);
        }
        if self.version.is_empty() {
            bail!("formula {:?} missing required field: version", self.name);
        }
        if !is_valid_version(&self.version) {
            bail!(
                "formula {:?}: version {:?} contains invalid characters",
                self.name,
                self.version
            );
        }
        if self.url.is_empty() {
            bail!("formula {:?} missing required field: url", self.name);
        }
        for (platform, url) in &self.url {
            if !url.starts_with("https://") {
                bail!(
                    "formula {:?}: URL for {} must use HTTPS: {}",
                    self.name,
                    platform,
                    url
                );
            }
        }
        if let Some(binary) = &self.install.binary_name
            && (binary.is_empty() || binary.contains(['/', '\\']) || binary == "." || binary == "..")
        {
            bail!(
                "formula {:?}: install.binary_name {:?} must be a plain file name",
                self.name,
                binary
            );
        }
        for dep in &self.dependencies {
            if !is_valid_name(dep) {
                bail!(
                    "formula {:?}: dependency {:?} contains invalid characters",
                    self.name,
                    dep
                );
            }
        }
        Ok(())
    }

    /// Download URL for the running host.
    pub fn url(&self) -> Result<&str> {
        self.url_for(&platform_key())
    }

    pub fn url_for(&self, platform: &str) -> Result<&str> {
        let Some(url) = self.url.get(platform) else {
            bail!(
                "formula {:?} does not support platform {}; available: {}",
                self.name,
                platform,
                sorted_keys(&self.url)
            );
        };
        if !url.starts_with("https://") {
            bail!(
                "formula {:?}: refusing to download over insecure HTTP: {}",
                self.name,
                url
            );
        }
        Ok(url)
    }

    /// Expected SHA-256 for the running host.
    pub fn sha256(&self) -> Result<&str> {
        self.sha256_for(&platform_key())
    }

    pub fn sha256_for(&self, platform: &str) -> Result<&str> {
        let Some(digest) = self.sha256.get(platform) else {
            bail!(
                "formula {:?} has no SHA256 for platform {}",
                self.name,
                platform
            );
        };
        validation::validate_sha256(digest).map_err(|e| {
            anyhow::anyhow!(
                "formula {:?}: invalid SHA256 for {}: {}",
                self.name,
                platform,
                e
            )
        })?;
        Ok(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JQ: &str = r#"
name: jq
version: "1.7.1"
description: Lightweight JSON processor
homepage: https://jqlang.github.io/jq/
license: MIT
url:
  linux_amd64: https://example.com/jq-linux-amd64
  darwin_arm64: https://example.com/jq-macos-arm64
sha256:
  linux_amd64: 5942c9b0934e510ee61eb3e30273f1b3fe2590df93933a93d7c58b81d19c8ff5
  darwin_arm64: 0bbe619e663e0de2c550be2fe0d240d076799d6f8a652b70fa04aea8a8362e8a
install:
  type: binary
  binary_name: jq
dependencies:
  - oniguruma
"#;

    #[test]
    fn test_parse_formula() {
        let f = Formula::parse(JQ).unwrap();
        assert_eq!(f.name, "jq");
        assert_eq!(f.version, "1.7.1");
        assert_eq!(f.install.kind, InstallType::Binary);
        assert_eq!(f.install.binary_name.as_deref(), Some("jq"));
        assert_eq!(f.install.strip_components, 0);
        assert_eq!(f.dependencies, vec!["oniguruma".to_string()]);
        assert!(!f.keg_only);
    }

    #[test]
    fn test_url_for_unknown_platform_lists_sorted() {
        let f = Formula::parse(JQ).unwrap();
        let err = f.url_for("windows_amd64").unwrap_err().to_string();
        assert!(err.contains("does not support platform windows_amd64"));
        assert!(err.contains("available: darwin_arm64, linux_amd64"));
    }

    #[test]
    fn test_sha256_for() {
        let f = Formula::parse(JQ).unwrap();
        assert_eq!(
            f.sha256_for("linux_amd64").unwrap(),
            "5942c9b0934e510ee61eb3e30273f1b3fe2590df93933a93d7c58b81d19c8ff5"
        );
        assert!(f.sha256_for("plan9_386").is_err());
    }

    #[test]
    fn test_malformed_sha256_rejected() {
        let mut f = Formula::parse(JQ).unwrap();
        f.sha256
            .insert("linux_amd64".to_string(), "deadbeef".to_string());
        let err = f.sha256_for("linux_amd64").unwrap_err().to_string();
        assert!(err.contains("invalid SHA256"));
    }

    #[test]
    fn test_plain_http_rejected() {
        let data = JQ.replace(
            "https://example.com/jq-linux-amd64",
            "http://example.com/jq-linux-amd64",
        );
        let err = Formula::parse(&data).unwrap_err().to_string();
        assert!(err.contains("must use HTTPS"));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let data = JQ.replace("name: jq", "name: ../jq");
        assert!(Formula::parse(&data).is_err());
    }

    #[test]
    fn test_invalid_version_rejected() {
        let data = JQ.replace("version: \"1.7.1\"", "version: \"../../1\"");
        assert!(Formula::parse(&data).is_err());
    }

    #[test]
    fn test_invalid_dependency_rejected() {
        let data = JQ.replace("- oniguruma", "- Oniguruma/evil");
        let err = Formula::parse(&data).unwrap_err().to_string();
        assert!(err.contains("dependency"));
    }

    #[test]
    fn test_unknown_install_type_rejected() {
        let data = JQ.replace("type: binary", "type: script");
        assert!(Formula::parse(&data).is_err());
    }

    #[test]
    fn test_binary_name_with_separator_rejected() {
        let data = JQ.replace("binary_name: jq", "binary_name: ../jq");
        assert!(Formula::parse(&data).is_err());
    }

    #[test]
    fn test_platform_key_shape() {
        let key = platform_key();
        let (os, arch) = key.split_once('_').unwrap();
        assert!(!os.is_empty());
        assert!(!arch.is_empty());
        assert_ne!(os, "macos");
    }
}
