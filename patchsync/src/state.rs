//! Resume state persistence.
//!
//! Each source keeps a small state file holding the id of the last patch
//! that was fully applied, as plain decimal text. The file is only rewritten
//! after the patch it names is durably on disk, so after a crash at most the
//! in-flight patch is processed twice and none is skipped.
//!
//! Reading is permissive: a missing file means "never synced" and content
//! that is not a number reads as id `0`.
//!
//! Writes go through [`write_atomic`]: the value is written to a temporary
//! file in the same directory, synced, then renamed over the target, and
//! the directory entry is synced on Unix. A reader sees either the old value
//! or the new one, never a partial write.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while reading or writing resume state.
#[derive(Debug, Error)]
pub enum StateError {
    /// The state file exists but could not be read.
    #[error("failed to read state file {}: {source}", .path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// The state file could not be written.
    #[error("failed to write state file {}: {source}", .path.display())]
    WriteFailed { path: PathBuf, source: io::Error },
}

/// Handle on one source's state file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeState {
    path: PathBuf,
}

impl ResumeState {
    /// Create a handle for the state file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the last applied id, `0` if the file does not exist.
    pub fn load(&self) -> StateResult<u64> {
        load_state(&self.path)
    }

    /// Record `id` as the last applied id.
    pub fn save(&self, id: u64) -> StateResult<()> {
        save_state(&self.path, id)
    }
}

/// Read the last applied id from `path`.
///
/// Returns `0` when the file does not exist or its content is not a number.
pub fn load_state(path: &Path) -> StateResult<u64> {
    match fs::read(path) {
        Ok(bytes) => Ok(parse_state_id(&String::from_utf8_lossy(&bytes))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(source) => Err(StateError::ReadFailed {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Overwrite the state file at `path` with the decimal form of `id`.
pub fn save_state(path: &Path, id: u64) -> StateResult<()> {
    write_atomic(path, id.to_string().as_bytes()).map_err(|source| StateError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse state file content leniently.
///
/// Leading whitespace and an optional sign are accepted, then the longest
/// run of digits is read; anything after it is ignored. No digits yields
/// `0`, a negative value clamps to `0` and an oversized value saturates.
pub fn parse_state_id(content: &str) -> u64 {
    let s = content
        .trim_start_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0B' | '\x0C'));

    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let digits = &s[..digits_end];

    if digits.is_empty() || negative {
        return 0;
    }

    digits.parse().unwrap_or(u64::MAX)
}

/// Replace the file at `path` with `data` atomically.
///
/// The temporary file lives next to the target so the final rename never
/// crosses filesystems.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;

    let tmp_path = parent.join(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    let result = (|| -> io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, path)?;
        sync_dir(parent)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }

    result
}

/// Flush a directory so a rename inside it survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
