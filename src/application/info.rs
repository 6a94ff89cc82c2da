//! `info` - catalog metadata for one formula or cask plus its local state.

use anyhow::Result;
use log::info;

use crate::cask::{CaskCatalog, Caskroom};
use crate::cellar::Cellar;
use crate::formula::Catalog;
use crate::linker::Linker;
use crate::paths::Paths;
use crate::runtime::Runtime;

/// Describe formula `name`: header, homepage, license, install state,
/// dependencies and the platforms it ships for.
pub fn formula_info<R: Runtime, C: Catalog>(
    runtime: &R,
    paths: &Paths,
    catalog: &C,
    name: &str,
) -> Result<Vec<String>> {
    let formula = catalog.load_by_name(name)?;
    let cellar = Cellar::new(runtime, &paths.cellar);
    let linker = Linker::new(runtime, paths);

    let mut lines = header(
        &formula.name,
        &formula.description,
        &formula.version,
        &formula.homepage,
        &formula.license,
    );
    if cellar.is_installed(&formula.name) {
        let version = linker.active_version(&cellar, &formula.name)?;
        let state = if linker.is_linked(&formula.name) {
            "linked"
        } else {
            "not linked"
        };
        lines.push(format!("Installed: {} ({})", version, state));
        info!("Cellar: {}", cellar.keg_path(&formula.name, &version).display());
    } else {
        lines.push("Installed: no".to_string());
    }
    if formula.keg_only {
        lines.push("Keg-only: yes".to_string());
    }
    if !formula.dependencies.is_empty() {
        lines.push(format!("Dependencies: {}", formula.dependencies.join(", ")));
    }
    lines.push(platforms(formula.url.keys()));
    Ok(lines)
}

/// Describe cask `name`: header, homepage, license, install state, artifacts
/// and platforms.
pub fn cask_info<R: Runtime>(runtime: &R, paths: &Paths, name: &str) -> Result<Vec<String>> {
    let cask = CaskCatalog::new(runtime, &paths.taps).load_by_name(name)?;
    let caskroom = Caskroom::new(runtime, &paths.caskroom);

    let mut lines = header(
        &cask.name,
        &cask.description,
        &format!("{} (cask)", cask.version),
        &cask.homepage,
        &cask.license,
    );
    if caskroom.is_installed(&cask.name) {
        lines.push(format!("Installed: {}", caskroom.installed_version(&cask.name)?));
    } else {
        lines.push("Installed: no".to_string());
    }
    if !cask.artifacts.app.is_empty() {
        lines.push(format!("Apps: {}", cask.artifacts.app.join(", ")));
    }
    if !cask.artifacts.bin.is_empty() {
        lines.push(format!("Binaries: {}", cask.artifacts.bin.join(", ")));
    }
    lines.push(platforms(cask.url.keys()));
    Ok(lines)
}

fn header(name: &str, description: &str, version: &str, homepage: &str, license: &str) -> Vec<String> {
    vec![
        format!("{}: {} {}", name, description, version),
        format!("Homepage: {}", homepage),
        format!("License:  {}", license),
    ]
}

fn platforms<'k>(keys: impl Iterator<Item = &'k String>) -> String {
    let keys: Vec<&str> = keys.map(String::as_str).collect();
    format!("Platforms: {}", keys.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use crate::test_utils::{formula, mock_catalog};
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn prefix() -> (TempDir, Paths) {
        let dir = tempdir().unwrap();
        let paths = Paths::from_root(dir.path().join("prefix"), dir.path().join("Applications"));
        paths.init(&RealRuntime).unwrap();
        (dir, paths)
    }

    #[test]
    fn test_formula_info_not_installed() {
        let (_dir, paths) = prefix();
        let mut openssl = formula("openssl", "3.3.0", &["zlib", "ca-certs"]);
        openssl.keg_only = true;
        let catalog = mock_catalog(vec![openssl]);

        let lines = formula_info(&RealRuntime, &paths, &catalog, "openssl").unwrap();
        assert_eq!(
            lines,
            vec![
                "openssl: openssl test formula 3.3.0".to_string(),
                "Homepage: https://example.com".to_string(),
                "License:  MIT".to_string(),
                "Installed: no".to_string(),
                "Keg-only: yes".to_string(),
                "Dependencies: zlib, ca-certs".to_string(),
                format!("Platforms: {}", crate::formula::platform_key()),
            ]
        );
    }

    #[test]
    fn test_formula_info_reports_active_version() {
        let (_dir, paths) = prefix();
        for version in ["1.6", "1.7.1"] {
            fs::create_dir_all(paths.cellar.join("jq").join(version).join("bin")).unwrap();
        }
        let catalog = mock_catalog(vec![formula("jq", "1.7.1", &[])]);

        let lines = formula_info(&RealRuntime, &paths, &catalog, "jq").unwrap();
        assert_eq!(lines[3], "Installed: 1.6 (not linked)");

        Linker::new(&RealRuntime, &paths).link("jq", "1.7.1", false).unwrap();
        let lines = formula_info(&RealRuntime, &paths, &catalog, "jq").unwrap();
        assert_eq!(lines[3], "Installed: 1.7.1 (linked)");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_formula_info_unknown() {
        let (_dir, paths) = prefix();
        let catalog = mock_catalog(vec![]);
        assert!(formula_info(&RealRuntime, &paths, &catalog, "ghost").is_err());
    }

    #[test]
    fn test_cask_info() {
        let (_dir, paths) = prefix();
        let platform = crate::formula::platform_key();
        let cask_dir = paths.taps.join("cask");
        fs::create_dir_all(&cask_dir).unwrap();
        fs::write(
            cask_dir.join("viewer.yaml"),
            format!(
                "name: viewer\nversion: \"2.1\"\ndescription: Image viewer\n\
                 homepage: https://viewer.test\nlicense: BSD-2-Clause\n\
                 url:\n  {platform}: https://viewer.test/viewer.zip\n\
                 sha256:\n  {platform}: {digest}\n\
                 artifacts:\n  app:\n    - Viewer.app\n  bin:\n    - viewer\n",
                digest = "a".repeat(64)
            ),
        )
        .unwrap();

        let lines = cask_info(&RealRuntime, &paths, "viewer").unwrap();
        assert_eq!(
            lines,
            vec![
                "viewer: Image viewer 2.1 (cask)".to_string(),
                "Homepage: https://viewer.test".to_string(),
                "License:  BSD-2-Clause".to_string(),
                "Installed: no".to_string(),
                "Apps: Viewer.app".to_string(),
                "Binaries: viewer".to_string(),
                format!("Platforms: {platform}"),
            ]
        );

        Caskroom::new(&RealRuntime, &paths.caskroom)
            .record("viewer", "2.1")
            .unwrap();
        let lines = cask_info(&RealRuntime, &paths, "viewer").unwrap();
        assert_eq!(lines[3], "Installed: 2.1");
    }
}
