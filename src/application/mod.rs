//! Application layer - use cases that coordinate the catalog, the fetcher,
//! the cellar and the linker.
//!
//! The CLI layer (`commands`) builds these from a resolved prefix and prints
//! their results; long-running pipelines print their own `==>` progress lines.

mod cask;
mod cleanup;
mod deps;
mod info;
mod install;
mod remove;
mod search;
mod upgrade;

pub use cask::CaskAction;
pub use cleanup::{CleanupAction, CleanupItem};
pub use deps::{flat_dependencies, tree_lines};
pub use info::{cask_info, formula_info};
pub use install::{InstallOutcome, Installer};
pub use remove::RemoveAction;
pub use search::search_formulae;
pub use upgrade::Outdated;
