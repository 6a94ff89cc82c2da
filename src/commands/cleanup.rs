use anyhow::Result;

use super::config::Config;
use crate::{application::CleanupAction, fsutil::format_size, runtime::Runtime};

/// Remove superseded kegs and scratch files, or report them with `dry_run`.
///
/// Returns the number of bytes freed (or that would be freed).
#[tracing::instrument(skip(config))]
pub fn cleanup<R: Runtime>(config: &Config<R>, targets: &[String], dry_run: bool) -> Result<u64> {
    let action = CleanupAction::new(&config.runtime, &config.paths);
    let items = action.plan(targets)?;
    if items.is_empty() {
        println!("Already clean, nothing to do.");
        return Ok(0);
    }

    let mut total = 0;
    for item in &items {
        if dry_run {
            println!("Would remove: {} ({})", item.label, format_size(item.size));
            total += item.size;
        } else if action.remove(item).is_ok() {
            println!("Removing: {} ({})", item.label, format_size(item.size));
            total += item.size;
        }
    }

    if dry_run {
        println!("==> Would free {}", format_size(total));
    } else {
        println!("==> Freed {}", format_size(total));
    }
    Ok(total)
}
