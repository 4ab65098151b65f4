//! Pre-run checks for a source.

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use super::SourceConfig;
use crate::fetch::Fetcher;

/// A source failed its pre-run checks.
#[derive(Debug, Error)]
pub enum PreflightError {
    /// The output directory does not exist.
    #[error("output directory {} does not exist", .0.display())]
    OutputDirMissing(PathBuf),

    /// The output path exists but is not a directory.
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// The output directory lacks read or write permission.
    #[error("output directory {} is not readable/writable", .0.display())]
    NotAccessible(PathBuf),

    /// The patch list URL did not answer with success.
    #[error("patch list {url} is unreachable: {reason}")]
    IndexUnreachable { url: String, reason: String },

    /// The patch directory URL did not answer with success.
    #[error("patch directory {url} is unreachable: {reason}")]
    PatchDirUnreachable { url: String, reason: String },
}

/// Check that a source can be synced before touching anything.
///
/// The output directory must exist and be usable, and both the patch list
/// and the patch directory must answer a HEAD request.
pub fn preflight<F>(source: &SourceConfig, fetcher: &F) -> Result<(), PreflightError>
where
    F: Fetcher + ?Sized,
{
    let dir = &source.output_dir;

    let metadata = match fs::metadata(dir) {
        Ok(m) => m,
        Err(_) => return Err(PreflightError::OutputDirMissing(dir.clone())),
    };
    if !metadata.is_dir() {
        return Err(PreflightError::NotADirectory(dir.clone()));
    }
    if metadata.permissions().readonly() || fs::read_dir(dir).is_err() {
        return Err(PreflightError::NotAccessible(dir.clone()));
    }

    check_reachable(fetcher, &source.index_url).map_err(|reason| {
        PreflightError::IndexUnreachable {
            url: source.index_url.clone(),
            reason,
        }
    })?;
    check_reachable(fetcher, &source.patch_base_url).map_err(|reason| {
        PreflightError::PatchDirUnreachable {
            url: source.patch_base_url.clone(),
            reason,
        }
    })?;

    debug!(source = %source.name, "preflight passed");
    Ok(())
}

fn check_reachable<F: Fetcher + ?Sized>(fetcher: &F, url: &str) -> Result<(), String> {
    match fetcher.exists(url) {
        Ok(true) => Ok(()),
        Ok(false) => Err("not found".to_string()),
        Err(e) => Err(e.to_string()),
    }
}
