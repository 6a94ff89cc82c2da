use anyhow::Result;

use super::config::Config;
use crate::{
    application::{cask_info, formula_info},
    runtime::Runtime,
};

/// Show what the catalog says about `name` and whether it is installed.
#[tracing::instrument(skip(config))]
pub fn info<R: Runtime>(config: &Config<R>, name: &str, cask: bool) -> Result<()> {
    let lines = if cask {
        cask_info(&config.runtime, &config.paths, name)?
    } else {
        formula_info(&config.runtime, &config.paths, &config.catalog(), name)?
    };
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}
