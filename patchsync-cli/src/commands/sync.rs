//! The `sync` command.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Args;
use patchsync::config::{ConfigFile, SourceConfig};
use patchsync::fetch::{HttpFetcher, RetryPolicy};
use patchsync::sync::{SourceReport, SyncEngine};
use tracing::info;

use super::output::{summary_line, StatusPrinter};
use crate::error::CliError;

/// Arguments for `patchsync sync`.
#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Only sync the named source (repeatable)
    #[arg(long = "source", value_name = "NAME")]
    pub sources: Vec<String>,

    /// Skip the output directory and reachability checks
    #[arg(long)]
    pub no_preflight: bool,

    /// Print reports as JSON instead of status lines
    #[arg(long)]
    pub json: bool,
}

/// Run the sync command.
pub fn run(args: SyncArgs, config: &ConfigFile) -> Result<(), CliError> {
    let sources = select_sources(config, &args.sources)?;
    let settings = &config.settings;

    let fetcher = HttpFetcher::with_timeout(settings.timeout)?;

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_clone = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Interrupt received, stopping after the current patch...");
        cancel_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let mut engine = SyncEngine::new(fetcher)
        .with_retry_policy(RetryPolicy::new(settings.retry_attempts))
        .with_preflight(!args.no_preflight)
        .with_cancel_flag(cancel);

    if !args.json {
        let printer = Arc::new(StatusPrinter::new());
        engine = engine.with_event_callback(move |event| printer.handle(event));
    }

    info!(sources = sources.len(), "sync run starting");
    let reports = engine.sync_all(&sources);

    if args.json {
        let json = serde_json::to_string_pretty(&reports)
            .map_err(|e| CliError::Output(e.to_string()))?;
        println!("{}", json);
    } else {
        print_summary(&reports);
    }

    check_reports(&reports)
}

/// Pick the sources to run, in configuration order.
fn select_sources(config: &ConfigFile, names: &[String]) -> Result<Vec<SourceConfig>, CliError> {
    if let Some(unknown) = names.iter().find(|n| config.source(n).is_none()) {
        return Err(CliError::Config(format!(
            "Unknown source '{}'. Use 'patchsync config show' to list configured sources.",
            unknown
        )));
    }

    Ok(config
        .sources
        .iter()
        .filter(|s| names.is_empty() || names.contains(&s.name))
        .cloned()
        .collect())
}

fn print_summary(reports: &[SourceReport]) {
    println!();
    println!("Summary");
    println!("=======");
    for report in reports {
        println!("{}", summary_line(report));
    }
}

fn check_reports(reports: &[SourceReport]) -> Result<(), CliError> {
    let failed = reports.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        return Err(CliError::SourcesFailed {
            failed,
            total: reports.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchsync::sync::{ErrorKind, SyncOutcome};

    fn config() -> ConfigFile {
        ConfigFile::parse(
            "[source.a]\noutput_dir=/a\npatch_list=x\npatch_dir=y\n\
             [source.b]\noutput_dir=/b\npatch_list=x\npatch_dir=y\n\
             [source.c]\noutput_dir=/c\npatch_list=x\npatch_dir=y\n",
        )
        .unwrap()
    }

    #[test]
    fn test_select_all_sources_by_default() {
        let selected = select_sources(&config(), &[]).unwrap();
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn test_select_keeps_config_order() {
        let names = vec!["c".to_string(), "a".to_string()];
        let selected = select_sources(&config(), &names).unwrap();
        let names: Vec<_> = selected.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_select_unknown_source() {
        let result = select_sources(&config(), &["nope".to_string()]);
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_check_reports() {
        let mut ok = SourceReport::new("a");
        ok.outcome = SyncOutcome::UpToDate;
        assert!(check_reports(&[ok.clone(), SourceReport::new("b")]).is_ok());

        let mut failed = SourceReport::new("c");
        failed.outcome = SyncOutcome::Failed {
            kind: ErrorKind::IndexFetchFailed,
            message: "boom".to_string(),
            entry: None,
        };
        match check_reports(&[ok, failed]) {
            Err(CliError::SourcesFailed { failed, total }) => {
                assert_eq!(failed, 1);
                assert_eq!(total, 2);
            }
            other => panic!("Expected SourcesFailed, got {:?}", other),
        }
    }
}
