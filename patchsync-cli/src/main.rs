//! PatchSync CLI - Command-line interface
//!
//! Mirrors the remote patch feeds listed in the configuration file.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use patchsync::config::{config_file_path, ConfigFile};
use patchsync::logging::{init_logging, LogSettings, LoggingGuard};

use commands::config::ConfigCommands;
use commands::sync::SyncArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "patchsync")]
#[command(version, about = "Mirror remote patch feeds into local directories", long_about = None)]
struct Cli {
    /// Configuration file (default: $PATCHSYNC_CONFIG or the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download new patches for every configured source
    Sync(SyncArgs),

    /// Check output directories and remote reachability
    Check,

    /// Show the last applied patch of each source
    Status,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(config_file_path);

    // Config inspection works without a loadable file or logging.
    let command = match cli.command {
        Commands::Config { command } => return commands::config::run(command, &config_path),
        command => command,
    };

    let config = ConfigFile::load_from(&config_path)?;
    let _guard = setup_logging(&config, cli.verbose)?;

    match command {
        Commands::Sync(args) => commands::sync::run(args, &config),
        Commands::Check => commands::check::run(&config),
        Commands::Status => commands::status::run(&config),
        Commands::Config { .. } => Ok(()),
    }
}

fn setup_logging(config: &ConfigFile, verbose: bool) -> Result<LoggingGuard, CliError> {
    let level = if verbose {
        "debug"
    } else {
        config.settings.log_level.as_str()
    };

    let mut settings = LogSettings::new(level);
    if let Some(dir) = &config.settings.log_dir {
        settings = settings.with_log_dir(dir);
    }

    Ok(init_logging(&settings)?)
}
