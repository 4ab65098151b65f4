//! Configuration inspection commands.

use std::path::Path;

use clap::Subcommand;
use patchsync::config::ConfigFile;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the parsed configuration
    Show,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(path),
        ConfigCommands::Show => run_show(path),
    }
}

/// Show the configuration file path.
fn run_path(path: &Path) -> Result<(), CliError> {
    println!("{}", path.display());
    Ok(())
}

/// Show the parsed configuration.
fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;
    let settings = &config.settings;

    println!("[general]");
    println!("  retry_attempts = {}", settings.retry_attempts);
    println!("  timeout_secs = {}", settings.timeout.as_secs());
    println!("  log_level = {}", settings.log_level);
    match &settings.log_dir {
        Some(dir) => println!("  log_dir = {}", dir.display()),
        None => println!("  log_dir = (not set)"),
    }

    for source in &config.sources {
        println!();
        println!("[source.{}]", source.name);
        println!("  output_dir = {}", source.output_dir.display());
        println!("  patch_list = {}", source.index_url);
        println!("  patch_dir = {}", source.patch_base_url);
        println!(
            "  checksum_list = {}",
            source.manifest_url.as_deref().unwrap_or("(not set)")
        );
        println!("  state_file = {}", source.state_file);
    }

    Ok(())
}
