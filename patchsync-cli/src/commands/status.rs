//! The `status` command: show where each source will resume.

use patchsync::config::ConfigFile;
use patchsync::state::load_state;

use crate::error::CliError;

/// Run the status command.
pub fn run(config: &ConfigFile) -> Result<(), CliError> {
    println!("Source Status");
    println!("=============");
    println!();

    let mut unreadable = 0;

    for source in &config.sources {
        let path = source.state_path();
        match load_state(&path) {
            Ok(0) if !path.exists() => {
                println!("  {:<16} never synced", source.name);
            }
            Ok(id) => {
                println!("  {:<16} last applied patch {}", source.name, id);
            }
            Err(e) => {
                unreadable += 1;
                println!("  {:<16} {}", source.name, e);
            }
        }
        println!("  {:<16} {}", "", path.display());
    }

    if unreadable > 0 {
        return Err(CliError::SourcesFailed {
            failed: unreadable,
            total: config.sources.len(),
        });
    }
    Ok(())
}
