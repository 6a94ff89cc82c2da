use anyhow::Result;
use log::{debug, info};

use super::config::Config;
use crate::{
    cellar::{Cellar, StoreError},
    formula::Catalog,
    linker::{LinkAction, LinkOptions, Linker},
    runtime::Runtime,
};

/// Link the installed keg of `name` into the prefix.
///
/// The version `opt/<name>` already points at is relinked when its keg is
/// still present; otherwise the first installed version is linked.
///
/// `keg_only` on `options` is ignored; it comes from the catalog definition
/// when one is available.
#[tracing::instrument(skip(config))]
pub fn link<R: Runtime>(config: &Config<R>, name: &str, options: LinkOptions) -> Result<()> {
    link_with(config, &config.catalog(), name, options)
}

pub(crate) fn link_with<R: Runtime, C: Catalog>(
    config: &Config<R>,
    catalog: &C,
    name: &str,
    options: LinkOptions,
) -> Result<()> {
    let cellar = Cellar::new(&config.runtime, &config.paths.cellar);
    if !cellar.is_installed(name) {
        return Err(StoreError::NotInstalled(name.to_string()).into());
    }
    let linker = Linker::new(&config.runtime, &config.paths);
    let version = linker.active_version(&cellar, name)?;

    let keg_only = match catalog.load_by_name(name) {
        Ok(formula) => formula.keg_only,
        Err(e) => {
            debug!("No definition for {}: {:#}", name, e);
            false
        }
    };
    if keg_only && !options.force {
        println!("Warning: {} is keg-only. Use --force to link anyway.", name);
    }

    info!("Keg: {}", cellar.keg_path(name, &version).display());
    let options = LinkOptions { keg_only, ..options };
    let actions = linker.link_with(name, &version, &options)?;

    if options.dry_run {
        print_actions(&actions);
    } else {
        println!("==> {} {} linked", name, version);
    }
    Ok(())
}

#[tracing::instrument(skip(config))]
pub fn unlink<R: Runtime>(config: &Config<R>, name: &str, dry_run: bool) -> Result<()> {
    let cellar = Cellar::new(&config.runtime, &config.paths.cellar);
    if !cellar.is_installed(name) {
        return Err(StoreError::NotInstalled(name.to_string()).into());
    }

    let actions = Linker::new(&config.runtime, &config.paths).unlink_with(name, dry_run)?;
    if dry_run {
        print_actions(&actions);
        info!("(dry run, no changes made)");
    } else {
        info!("Removed {} links", actions.len());
        println!("==> {} unlinked", name);
    }
    Ok(())
}

fn print_actions(actions: &[LinkAction]) {
    for action in actions {
        println!("{}", action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use crate::test_utils::{formula, mock_catalog};
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn config_with_keg() -> (TempDir, Config<RealRuntime>) {
        let dir = tempdir().unwrap();
        let config = Config::new(RealRuntime, Some(dir.path().join("prefix"))).unwrap();
        let bin = config.paths.cellar.join("openssl/3.3.0/bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("openssl"), "ssl").unwrap();
        (dir, config)
    }

    #[test]
    fn test_link_and_unlink() {
        let (_dir, config) = config_with_keg();
        let catalog = mock_catalog(vec![]);

        link_with(&config, &catalog, "openssl", LinkOptions::default()).unwrap();
        assert_eq!(
            fs::read_to_string(config.paths.bin.join("openssl")).unwrap(),
            "ssl"
        );

        unlink(&config, "openssl", false).unwrap();
        assert!(fs::symlink_metadata(config.paths.bin.join("openssl")).is_err());
        assert!(fs::symlink_metadata(config.paths.opt.join("openssl")).is_err());
    }

    #[test]
    fn test_link_keg_only_from_catalog() {
        let (_dir, config) = config_with_keg();
        let mut openssl = formula("openssl", "3.3.0", &[]);
        openssl.keg_only = true;
        let catalog = mock_catalog(vec![openssl]);

        link_with(&config, &catalog, "openssl", LinkOptions::default()).unwrap();
        assert!(config.paths.opt.join("openssl").exists());
        assert!(fs::symlink_metadata(config.paths.bin.join("openssl")).is_err());

        let forced = LinkOptions {
            force: true,
            ..LinkOptions::default()
        };
        link_with(&config, &catalog, "openssl", forced).unwrap();
        assert!(config.paths.bin.join("openssl").exists());
    }

    #[test]
    fn test_link_dry_run_changes_nothing() {
        let (_dir, config) = config_with_keg();
        let catalog = mock_catalog(vec![]);
        let options = LinkOptions {
            dry_run: true,
            ..LinkOptions::default()
        };

        link_with(&config, &catalog, "openssl", options).unwrap();
        assert!(fs::symlink_metadata(config.paths.opt.join("openssl")).is_err());
    }

    #[test]
    fn test_link_keeps_active_version() {
        let (_dir, config) = config_with_keg();
        let newer = config.paths.cellar.join("openssl/3.4.0/bin");
        fs::create_dir_all(&newer).unwrap();
        fs::write(newer.join("openssl"), "ssl 3.4").unwrap();
        let catalog = mock_catalog(vec![]);
        Linker::new(&config.runtime, &config.paths)
            .link("openssl", "3.4.0", false)
            .unwrap();
        let opt_before = fs::read_link(config.paths.opt.join("openssl")).unwrap();

        link_with(&config, &catalog, "openssl", LinkOptions::default()).unwrap();

        assert_eq!(fs::read_link(config.paths.opt.join("openssl")).unwrap(), opt_before);
        assert_eq!(
            fs::read_to_string(config.paths.bin.join("openssl")).unwrap(),
            "ssl 3.4"
        );
    }

    #[test]
    fn test_link_falls_back_when_active_keg_is_gone() {
        let (_dir, config) = config_with_keg();
        let catalog = mock_catalog(vec![]);
        fs::create_dir_all(&config.paths.opt).unwrap();
        std::os::unix::fs::symlink("../Cellar/openssl/9.9.9", config.paths.opt.join("openssl"))
            .unwrap();

        link_with(&config, &catalog, "openssl", LinkOptions::default()).unwrap();

        assert_eq!(
            fs::read_link(config.paths.opt.join("openssl")).unwrap(),
            std::path::Path::new("../Cellar/openssl/3.3.0")
        );
    }

    #[test]
    fn test_link_not_installed() {
        let (_dir, config) = config_with_keg();
        let catalog = mock_catalog(vec![]);
        let err = link_with(&config, &catalog, "jq", LinkOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "formula \"jq\" is not installed");
        assert!(unlink(&config, "jq", false).is_err());
    }
}
