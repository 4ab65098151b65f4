//! Status line rendering for sync runs.
//!
//! Lines are keyed by source name so interleaved output from several
//! sources stays readable:
//!
//! ```text
//! [Status]: Starting to sync kro
//! [Status]:kro: Starting at patch 1012 - 2009-01-02data.gpf (3 patches to download)
//! [Status]:kro: 1/3 Trying to download 2009-01-02data.gpf
//! [Error]:kro: failed to download 2009-01-03data.gpf: gave up after 5 attempts: ...
//! ```

use std::sync::Mutex;

use console::style;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use patchsync::sync::{SourceReport, SyncEvent, SyncOutcome};

const BAR_TEMPLATE: &str = "{prefix:>12.cyan.bold} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}";

/// Severity of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Status,
    Error,
}

/// Text of the status line for an event, if it has one.
pub fn status_line(event: &SyncEvent<'_>) -> Option<(LineKind, String)> {
    let line = match event {
        SyncEvent::SourceStarted { source } => {
            format!("[Status]: Starting to sync {}", source)
        }
        SyncEvent::UpToDate { source, .. } => format!("[Status]:{}: is up-to-date", source),
        SyncEvent::Starting {
            source,
            first,
            pending,
        } => format!(
            "[Status]:{}: Starting at patch {} ({} patches to download)",
            source, first, pending
        ),
        SyncEvent::Attempt {
            source,
            entry,
            position,
            pending,
            attempt,
            max_attempts,
        } => {
            if *attempt == 1 {
                format!(
                    "[Status]:{}: {}/{} Trying to download {}",
                    source, position, pending, entry.filename
                )
            } else {
                format!(
                    "[Status]:{}: {}/{} Trying to download {} (attempt {}/{})",
                    source, position, pending, entry.filename, attempt, max_attempts
                )
            }
        }
        SyncEvent::Unlisted { source, entry } => format!(
            "[Status]:{}: File {} doesn't have an entry in checksum list",
            source, entry.filename
        ),
        SyncEvent::Finished { source, applied } => {
            format!("[Status]:{}: Done, {} patches applied", source, applied)
        }
        SyncEvent::Failed { source, error } => {
            return Some((LineKind::Error, format!("[Error]:{}: {}", source, error)));
        }
        SyncEvent::AttemptFailed { .. } | SyncEvent::Applied { .. } => return None,
    };

    Some((LineKind::Status, line))
}

/// Prints status lines and drives a progress bar over pending entries.
pub struct StatusPrinter {
    bar: Mutex<Option<ProgressBar>>,
}

impl StatusPrinter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    /// Handle one engine event.
    pub fn handle(&self, event: &SyncEvent<'_>) {
        let Ok(mut bar) = self.bar.lock() else {
            return;
        };

        if let Some((kind, line)) = status_line(event) {
            let line = match kind {
                LineKind::Status => line,
                LineKind::Error => style(line).red().bold().to_string(),
            };
            match bar.as_ref() {
                Some(pb) => pb.println(line),
                None => println!("{}", line),
            }
        }

        match event {
            SyncEvent::Starting { pending, .. } => {
                *bar = Some(new_bar(event.source(), *pending as u64));
            }
            SyncEvent::Attempt { entry, .. } => {
                if let Some(pb) = bar.as_ref() {
                    pb.set_message(entry.filename.clone());
                }
            }
            SyncEvent::Applied { .. } => {
                if let Some(pb) = bar.as_ref() {
                    pb.inc(1);
                }
            }
            SyncEvent::Finished { .. } => {
                if let Some(pb) = bar.take() {
                    pb.finish_and_clear();
                }
            }
            SyncEvent::Failed { .. } => {
                if let Some(pb) = bar.take() {
                    pb.abandon();
                }
            }
            _ => {}
        }
    }
}

impl Default for StatusPrinter {
    fn default() -> Self {
        Self::new()
    }
}

fn new_bar(source: &str, len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(bar_style) = ProgressStyle::with_template(BAR_TEMPLATE) {
        pb.set_style(bar_style.progress_chars("=> "));
    }
    pb.set_prefix(source.to_string());
    pb
}

/// One-line summary of a source report.
pub fn summary_line(report: &SourceReport) -> String {
    let outcome = match &report.outcome {
        SyncOutcome::UpToDate => style("up to date").green().to_string(),
        SyncOutcome::Done => style("done").green().to_string(),
        SyncOutcome::Failed { entry, .. } => match entry {
            Some(entry) => style(format!("failed at patch {}", entry)).red().to_string(),
            None => style("failed").red().to_string(),
        },
    };

    format!(
        "  {:<16} {} (resumed after {}, {} applied, {})",
        report.source,
        outcome,
        report.started_from,
        report.applied,
        HumanBytes(report.bytes)
    )
}
