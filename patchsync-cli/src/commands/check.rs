//! The `check` command: preflight every source without syncing.

use console::style;
use patchsync::config::{preflight, ConfigFile};
use patchsync::fetch::HttpFetcher;

use crate::error::CliError;

/// Run the check command.
pub fn run(config: &ConfigFile) -> Result<(), CliError> {
    let fetcher = HttpFetcher::with_timeout(config.settings.timeout)?;
    let mut failed = 0;

    for source in &config.sources {
        match preflight(source, &fetcher) {
            Ok(()) => println!("{} {}", style("[OK]").green().bold(), source.name),
            Err(e) => {
                failed += 1;
                println!(
                    "{}",
                    style(format!("[Error]:{}: {}", source.name, e)).red().bold()
                );
            }
        }
    }

    if failed > 0 {
        return Err(CliError::SourcesFailed {
            failed,
            total: config.sources.len(),
        });
    }
    Ok(())
}
