use anyhow::Result;
use clap::Parser;
use grew::commands::{self, Config};
use grew::linker::LinkOptions;
use std::path::PathBuf;

/// grew - a small Homebrew-style package manager
///
/// Installs prebuilt formulae from local taps into a prefix, one versioned
/// keg per release, and links the active version into bin/, lib/ and include/.
///
/// Examples:
///   grew install jq          # Install jq and its dependencies
///   grew deps --tree jq      # Show what jq depends on
///   grew install --cask foo  # Install an application bundle
#[derive(Parser, Debug)]
#[command(author, version = env!("GREW_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Prefix directory (defaults to ~/.grew)
    #[arg(long, env = "GREW_PREFIX", value_name = "PATH", global = true)]
    prefix: Option<PathBuf>,

    /// Show progress details
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Show debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install formulae (or casks) and their dependencies
    Install(InstallArgs),

    /// Remove a formula (or cask) and its links
    #[command(alias = "remove")]
    Uninstall(UninstallArgs),

    /// Remove and install a formula again from its current definition
    Reinstall(NameArg),

    /// Upgrade the named formulae, or every outdated one
    Upgrade(UpgradeArgs),

    /// List installed formulae whose catalog version differs
    Outdated,

    /// Link an installed formula into the prefix
    Link(LinkArgs),

    /// Remove a formula's links from the prefix
    Unlink(UnlinkArgs),

    /// List installed formulae (or casks)
    List(ListArgs),

    /// Search formulae (or casks) by name or description
    Search(SearchArgs),

    /// Remove old kegs and temporary files
    Cleanup(CleanupArgs),

    /// Show a formula's dependencies
    Deps(DepsArgs),

    /// Show details and install state of a formula (or cask)
    Info(InfoArgs),
}

#[derive(clap::Args, Debug)]
struct InstallArgs {
    /// Install casks instead of formulae
    #[arg(long)]
    cask: bool,

    #[arg(value_name = "NAME", required = true)]
    names: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct UninstallArgs {
    #[arg(long)]
    cask: bool,

    #[arg(value_name = "NAME")]
    name: String,
}

#[derive(clap::Args, Debug)]
struct NameArg {
    #[arg(value_name = "NAME")]
    name: String,
}

#[derive(clap::Args, Debug)]
struct UpgradeArgs {
    #[arg(value_name = "NAME")]
    names: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct LinkArgs {
    /// Replace conflicting files and links owned by other formulae
    #[arg(long)]
    overwrite: bool,

    /// Show what would be linked without changing anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Link keg-only formulae too
    #[arg(long)]
    force: bool,

    #[arg(value_name = "NAME")]
    name: String,
}

#[derive(clap::Args, Debug)]
struct UnlinkArgs {
    /// Show what would be removed without changing anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    #[arg(value_name = "NAME")]
    name: String,
}

#[derive(clap::Args, Debug)]
struct ListArgs {
    #[arg(long)]
    cask: bool,

    /// Print JSON instead of columns
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct SearchArgs {
    #[arg(long)]
    cask: bool,

    #[arg(value_name = "QUERY")]
    query: String,
}

#[derive(clap::Args, Debug)]
struct CleanupArgs {
    /// Show what would be removed without changing anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Only clean these formulae's kegs
    #[arg(value_name = "NAME")]
    names: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct DepsArgs {
    /// Render the dependency tree
    #[arg(long)]
    tree: bool,

    #[arg(value_name = "NAME")]
    name: String,
}

#[derive(clap::Args, Debug)]
struct InfoArgs {
    #[arg(long)]
    cask: bool,

    #[arg(value_name = "NAME")]
    name: String,
}

fn log_filter(cli: &Cli) -> &'static str {
    if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(&cli)))
        .init();

    let config = Config::new(grew::runtime::RealRuntime, cli.prefix)?;

    match cli.command {
        Commands::Install(args) => commands::install(&config, &args.names, args.cask).await?,
        Commands::Uninstall(args) => commands::uninstall(&config, &args.name, args.cask)?,
        Commands::Reinstall(args) => commands::reinstall(&config, &args.name).await?,
        Commands::Upgrade(args) => commands::upgrade(&config, &args.names).await?,
        Commands::Outdated => commands::outdated(&config)?,
        Commands::Link(args) => {
            let options = LinkOptions {
                overwrite: args.overwrite,
                dry_run: args.dry_run,
                force: args.force,
                ..LinkOptions::default()
            };
            commands::link(&config, &args.name, options)?
        }
        Commands::Unlink(args) => commands::unlink(&config, &args.name, args.dry_run)?,
        Commands::List(args) => commands::list(&config, args.cask, args.json)?,
        Commands::Search(args) => commands::search(&config, &args.query, args.cask)?,
        Commands::Cleanup(args) => {
            commands::cleanup(&config, &args.names, args.dry_run)?;
        }
        Commands::Deps(args) => commands::deps(&config, &args.name, args.tree)?,
        Commands::Info(args) => commands::info(&config, &args.name, args.cask)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_install_parsing() {
        let cli = Cli::try_parse_from(["grew", "install", "jq", "fd"]).unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.names, vec!["jq", "fd"]);
                assert!(!args.cask);
            }
            _ => panic!("Expected Install command"),
        }
    }

    #[test]
    fn test_cli_install_requires_name() {
        assert!(Cli::try_parse_from(["grew", "install"]).is_err());
    }

    #[test]
    fn test_cli_global_prefix_parsing() {
        let cli = Cli::try_parse_from(["grew", "list", "--prefix", "/tmp/p", "--cask"]).unwrap();
        assert_eq!(cli.prefix, Some(PathBuf::from("/tmp/p")));
        match cli.command {
            Commands::List(args) => assert!(args.cask && !args.json),
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_cli_link_flags() {
        let cli = Cli::try_parse_from(["grew", "link", "-n", "--overwrite", "jq"]).unwrap();
        match cli.command {
            Commands::Link(args) => {
                assert!(args.dry_run && args.overwrite && !args.force);
                assert_eq!(args.name, "jq");
            }
            _ => panic!("Expected Link command"),
        }
    }

    #[test]
    fn test_cli_cleanup_targets() {
        let cli = Cli::try_parse_from(["grew", "cleanup", "--dry-run", "jq", "fd"]).unwrap();
        match cli.command {
            Commands::Cleanup(args) => {
                assert!(args.dry_run);
                assert_eq!(args.names, vec!["jq", "fd"]);
            }
            _ => panic!("Expected Cleanup command"),
        }
    }

    #[test]
    fn test_cli_info_cask() {
        let cli = Cli::try_parse_from(["grew", "info", "--cask", "viewer"]).unwrap();
        match cli.command {
            Commands::Info(args) => {
                assert!(args.cask);
                assert_eq!(args.name, "viewer");
            }
            _ => panic!("Expected Info command"),
        }
    }

    #[test]
    fn test_log_filter() {
        let cli = Cli::try_parse_from(["grew", "-v", "outdated"]).unwrap();
        assert_eq!(log_filter(&cli), "info");
        let cli = Cli::try_parse_from(["grew", "--debug", "outdated"]).unwrap();
        assert_eq!(log_filter(&cli), "debug");
        let cli = Cli::try_parse_from(["grew", "outdated"]).unwrap();
        assert_eq!(log_filter(&cli), "warn");
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["grew", "jq"]).is_err());
    }
}
