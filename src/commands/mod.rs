//! CLI commands. Each builds the use case it needs from a [`Config`] and
//! prints the result.

pub mod config;
mod cleanup;
mod formula;
mod info;
mod link;
mod list;

pub use cleanup::cleanup;
pub use config::Config;
pub use formula::{install, outdated, reinstall, uninstall, upgrade};
pub use info::info;
pub use link::{link, unlink};
pub use list::{deps, list, search};
