//! The synchronization engine.

use std::borrow::Cow;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, info, info_span, warn};

use super::{EventCallback, SourceReport, SyncError, SyncEvent, SyncOutcome, SyncResult};
use crate::config::{self, SourceConfig};
use crate::fetch::{fetch_with_retry, AttemptEvent, Fetcher, RetryPolicy};
use crate::index::{parse_index, select_pending, PatchEntry};
use crate::manifest::{ChecksumManifest, Verification};
use crate::state::{write_atomic, ResumeState};

/// Remote data for one source, fetched once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceContext {
    /// Entries in feed order.
    pub index: Vec<PatchEntry>,

    /// Checksum manifest, when the source publishes one.
    pub manifest: Option<ChecksumManifest>,
}

/// Mirrors remote patch feeds into local directories.
///
/// Sources are processed one at a time. Within a source every pending entry
/// is fetched, verified, written and recorded in the resume state before the
/// next one starts.
pub struct SyncEngine<F> {
    fetcher: F,
    retry: RetryPolicy,
    preflight: bool,
    on_event: Option<EventCallback>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<F: Fetcher> SyncEngine<F> {
    /// Create an engine with the default retry policy and preflight enabled.
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            retry: RetryPolicy::default(),
            preflight: true,
            on_event: None,
            cancel: None,
        }
    }

    /// Set the per-entry retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Enable or disable the preflight checks run by [`sync_source`](Self::sync_source).
    pub fn with_preflight(mut self, enabled: bool) -> Self {
        self.preflight = enabled;
        self
    }

    /// Receive progress events.
    pub fn with_event_callback<C>(mut self, callback: C) -> Self
    where
        C: Fn(&SyncEvent<'_>) + Send + Sync + 'static,
    {
        self.on_event = Some(Box::new(callback));
        self
    }

    /// Stop between entries once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// The underlying fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Synchronize every source in order.
    ///
    /// A failing source does not stop the ones after it.
    pub fn sync_all(&self, sources: &[SourceConfig]) -> Vec<SourceReport> {
        sources.iter().map(|s| self.sync_source(s)).collect()
    }

    /// Synchronize one source and report how it ended.
    pub fn sync_source(&self, source: &SourceConfig) -> SourceReport {
        let _span = info_span!("sync", source = %source.name).entered();
        let mut report = SourceReport::new(&source.name);

        self.emit(SyncEvent::SourceStarted {
            source: &source.name,
        });
        info!(source = %source.name, "starting to sync");

        if let Err(e) = self.run_source(source, &mut report) {
            error!(source = %source.name, error = %e, "sync failed");
            self.emit(SyncEvent::Failed {
                source: &source.name,
                error: &e,
            });
            report.fail(&e);
        }

        report
    }

    fn run_source(&self, source: &SourceConfig, report: &mut SourceReport) -> SyncResult<()> {
        if self.is_cancelled() {
            return Err(SyncError::Interrupted { entry: None });
        }
        if self.preflight {
            config::preflight(source, &self.fetcher)?;
        }

        let ctx = self.load_source(source)?;
        self.apply(source, &ctx, report)
    }

    /// Fetch the patch index and, if configured, the checksum manifest.
    pub fn load_source(&self, source: &SourceConfig) -> SyncResult<SourceContext> {
        let raw = self
            .fetcher
            .fetch(&source.index_url)
            .map_err(|e| SyncError::IndexFetchFailed {
                url: source.index_url.clone(),
                source: e,
            })?;
        let text = String::from_utf8_lossy(&raw);
        let lossy = matches!(text, Cow::Owned(_));
        let index: Vec<PatchEntry> = parse_index(&text)
            .filter(|entry| {
                let mangled = lossy && entry.filename.contains(char::REPLACEMENT_CHARACTER);
                if mangled {
                    warn!(
                        source = %source.name,
                        id = entry.id,
                        "skipping patch list entry with a non-UTF-8 filename"
                    );
                }
                !mangled
            })
            .collect();
        debug!(source = %source.name, entries = index.len(), "parsed patch list");

        let manifest = match &source.manifest_url {
            Some(url) => Some(self.load_manifest(url)?),
            None => None,
        };

        Ok(SourceContext { index, manifest })
    }

    fn load_manifest(&self, url: &str) -> SyncResult<ChecksumManifest> {
        let raw = self
            .fetcher
            .fetch(url)
            .map_err(|e| SyncError::ManifestFetchFailed {
                url: url.to_string(),
                source: e,
            })?;

        let manifest =
            ChecksumManifest::decode(&raw).map_err(|e| SyncError::ManifestDecodeFailed {
                url: url.to_string(),
                source: e,
            })?;
        debug!(url, records = manifest.len(), "loaded checksum list");
        Ok(manifest)
    }

    /// Apply every entry of `ctx` newer than the source's resume state.
    ///
    /// `report` is updated as entries are applied, so on failure it still
    /// reflects the entries that made it to disk.
    pub fn apply(
        &self,
        source: &SourceConfig,
        ctx: &SourceContext,
        report: &mut SourceReport,
    ) -> SyncResult<()> {
        let state = ResumeState::new(source.state_path());
        let last_applied = state.load().map_err(SyncError::StateReadFailed)?;
        report.started_from = last_applied;

        let pending = select_pending(ctx.index.iter().cloned(), last_applied);
        let Some(first) = pending.first() else {
            info!(source = %source.name, last_applied, "up to date");
            self.emit(SyncEvent::UpToDate {
                source: &source.name,
                last_applied,
            });
            report.outcome = SyncOutcome::UpToDate;
            return Ok(());
        };

        info!(
            source = %source.name,
            first = %first,
            pending = pending.len(),
            "starting at patch"
        );
        self.emit(SyncEvent::Starting {
            source: &source.name,
            first,
            pending: pending.len(),
        });

        for (i, entry) in pending.iter().enumerate() {
            if self.is_cancelled() {
                warn!(source = %source.name, next = %entry, "interrupted");
                return Err(SyncError::Interrupted {
                    entry: Some(entry.clone()),
                });
            }

            let path = output_path(&source.output_dir, &entry.filename).ok_or_else(|| {
                SyncError::UnsafeFilename {
                    entry: entry.clone(),
                }
            })?;

            let data = self.fetch_entry(source, entry, i + 1, pending.len())?;
            self.verify(source, ctx, entry, &data)?;
            persist(&source.output_dir, &path, entry, &data)?;

            state
                .save(entry.id)
                .map_err(|e| SyncError::StateWriteFailed {
                    entry: entry.clone(),
                    source: e,
                })?;

            let bytes = data.len() as u64;
            report.applied += 1;
            report.bytes += bytes;
            debug!(source = %source.name, id = entry.id, bytes, "applied");
            self.emit(SyncEvent::Applied {
                source: &source.name,
                entry,
                position: i + 1,
                pending: pending.len(),
                bytes,
            });
        }

        info!(source = %source.name, applied = report.applied, "done");
        self.emit(SyncEvent::Finished {
            source: &source.name,
            applied: report.applied,
        });
        report.outcome = SyncOutcome::Done;
        Ok(())
    }

    fn fetch_entry(
        &self,
        source: &SourceConfig,
        entry: &PatchEntry,
        position: usize,
        pending: usize,
    ) -> SyncResult<Bytes> {
        let url = source.patch_url(&entry.filename);
        let max_attempts = self.retry.max_attempts();

        fetch_with_retry(&self.fetcher, &url, self.retry, |event| match event {
            AttemptEvent::Started { attempt } => self.emit(SyncEvent::Attempt {
                source: &source.name,
                entry,
                position,
                pending,
                attempt,
                max_attempts,
            }),
            AttemptEvent::Failed { attempt, error } => self.emit(SyncEvent::AttemptFailed {
                source: &source.name,
                entry,
                attempt,
                error,
            }),
        })
        .map_err(|e| SyncError::PatchFetchExhausted {
            entry: entry.clone(),
            source: e,
        })
    }

    fn verify(
        &self,
        source: &SourceConfig,
        ctx: &SourceContext,
        entry: &PatchEntry,
        data: &[u8],
    ) -> SyncResult<()> {
        let Some(manifest) = &ctx.manifest else {
            return Ok(());
        };

        match manifest.verify(&entry.filename, data) {
            Ok(Verification::Verified(algorithm)) => {
                debug!(
                    source = %source.name,
                    filename = %entry.filename,
                    algorithm = algorithm.name(),
                    "checksum verified"
                );
                Ok(())
            }
            Ok(Verification::Unlisted) => {
                warn!(
                    source = %source.name,
                    filename = %entry.filename,
                    "no entry in checksum list"
                );
                self.emit(SyncEvent::Unlisted {
                    source: &source.name,
                    entry,
                });
                Ok(())
            }
            Err(kind) => Err(SyncError::ChecksumMismatch {
                entry: entry.clone(),
                kind,
            }),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn emit(&self, event: SyncEvent<'_>) {
        if let Some(callback) = &self.on_event {
            callback(&event);
        }
    }
}

/// Resolve a feed filename inside `dir`.
///
/// A leading `/` is ignored. Returns `None` for names with `..` or prefix
/// components and names that do not name a file.
fn output_path(dir: &Path, filename: &str) -> Option<PathBuf> {
    let mut path = dir.to_path_buf();
    let mut named = false;

    for component in Path::new(filename).components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                named = true;
            }
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir | Component::Prefix(_) => return None,
        }
    }

    named.then_some(path)
}

/// Write a patch file, creating parent directories for nested names.
fn persist(dir: &Path, path: &Path, entry: &PatchEntry, data: &[u8]) -> SyncResult<()> {
    let write_failed = |source| SyncError::WriteFailed {
        entry: entry.clone(),
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if parent != dir {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }
    }

    write_atomic(path, data).map_err(write_failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchError, FetchResult};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serves fixed bodies and records every fetched URL.
    #[derive(Default)]
    struct MapFetcher {
        bodies: HashMap<String, Vec<u8>>,
        fetched: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn with(mut self, url: &str, body: &[u8]) -> Self {
            self.bodies.insert(url.to_string(), body.to_vec());
            self
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    impl Fetcher for MapFetcher {
        fn fetch(&self, uri: &str) -> FetchResult<Bytes> {
            self.fetched.lock().unwrap().push(uri.to_string());
            self.bodies
                .get(uri)
                .map(|b| Bytes::from(b.clone()))
                .ok_or_else(|| FetchError::Status {
                    url: uri.to_string(),
                    status: 404,
                })
        }

        fn exists(&self, _uri: &str) -> FetchResult<bool> {
            Ok(true)
        }
    }

    fn source(dir: &Path) -> SourceConfig {
        SourceConfig::new("test", dir, "http://h/list.txt", "http://h/patch/")
    }

    #[test]
    fn test_output_path() {
        let dir = Path::new("/out");
        assert_eq!(output_path(dir, "a.gpf"), Some(PathBuf::from("/out/a.gpf")));
        assert_eq!(
            output_path(dir, "data/a.gpf"),
            Some(PathBuf::from("/out/data/a.gpf"))
        );
        assert_eq!(output_path(dir, "./a.gpf"), Some(PathBuf::from("/out/a.gpf")));
        assert_eq!(output_path(dir, "../a.gpf"), None);
        assert_eq!(output_path(dir, "data/../../a.gpf"), None);
        assert_eq!(output_path(dir, "/x.gpf"), Some(PathBuf::from("/out/x.gpf")));
        assert_eq!(
            output_path(dir, "/etc/passwd"),
            Some(PathBuf::from("/out/etc/passwd"))
        );
        assert_eq!(output_path(dir, "/../a.gpf"), None);
        assert_eq!(output_path(dir, "/"), None);
        assert_eq!(output_path(dir, "."), None);
    }

    #[test]
    fn test_load_source_without_manifest() {
        let fetcher = MapFetcher::default().with("http://h/list.txt", b"1 a.gpf\n2 b.gpf\n");
        let engine = SyncEngine::new(fetcher);
        let temp = TempDir::new().unwrap();

        let ctx = engine.load_source(&source(temp.path())).unwrap();
        assert_eq!(ctx.index.len(), 2);
        assert!(ctx.manifest.is_none());
    }

    #[test]
    fn test_load_source_skips_non_utf8_filenames() {
        let fetcher = MapFetcher::default().with("http://h/list.txt", b"1 a\xff.gpf\n2 b.gpf\n");
        let engine = SyncEngine::new(fetcher);
        let temp = TempDir::new().unwrap();

        let ctx = engine.load_source(&source(temp.path())).unwrap();
        assert_eq!(ctx.index, vec![PatchEntry::new(2, "b.gpf")]);
    }

    #[test]
    fn test_load_source_keeps_literal_replacement_char() {
        let fetcher =
            MapFetcher::default().with("http://h/list.txt", "1 a\u{fffd}.gpf\n".as_bytes());
        let engine = SyncEngine::new(fetcher);
        let temp = TempDir::new().unwrap();

        let ctx = engine.load_source(&source(temp.path())).unwrap();
        assert_eq!(ctx.index, vec![PatchEntry::new(1, "a\u{fffd}.gpf")]);
    }

    #[test]
    fn test_apply_writes_files_and_state() {
        let temp = TempDir::new().unwrap();
        let fetcher = MapFetcher::default()
            .with("http://h/patch/a.gpf", b"aaa")
            .with("http://h/patch/sub/b.gpf", b"bb");
        let engine = SyncEngine::new(fetcher);
        let ctx = SourceContext {
            index: vec![PatchEntry::new(1, "a.gpf"), PatchEntry::new(2, "sub/b.gpf")],
            manifest: None,
        };
        let config = source(temp.path());
        let mut report = SourceReport::new("test");

        engine.apply(&config, &ctx, &mut report).unwrap();

        assert_eq!(report.outcome, SyncOutcome::Done);
        assert_eq!(report.applied, 2);
        assert_eq!(report.bytes, 5);
        assert_eq!(fs::read(temp.path().join("a.gpf")).unwrap(), b"aaa");
        assert_eq!(fs::read(temp.path().join("sub/b.gpf")).unwrap(), b"bb");
        assert_eq!(
            fs::read_to_string(temp.path().join(".patch_state")).unwrap(),
            "2"
        );
    }

    #[test]
    fn test_apply_empty_index_is_up_to_date() {
        let temp = TempDir::new().unwrap();
        let engine = SyncEngine::new(MapFetcher::default());
        let mut report = SourceReport::new("test");

        engine
            .apply(&source(temp.path()), &SourceContext::default(), &mut report)
            .unwrap();

        assert_eq!(report.outcome, SyncOutcome::UpToDate);
        assert!(engine.fetcher().fetched().is_empty());
        assert!(!temp.path().join(".patch_state").exists());
    }

    #[test]
    fn test_unsafe_filename_is_rejected_before_fetch() {
        let temp = TempDir::new().unwrap();
        let engine = SyncEngine::new(MapFetcher::default());
        let ctx = SourceContext {
            index: vec![PatchEntry::new(1, "../escape.gpf")],
            manifest: None,
        };
        let mut report = SourceReport::new("test");

        let err = engine
            .apply(&source(temp.path()), &ctx, &mut report)
            .unwrap_err();

        assert!(matches!(err, SyncError::UnsafeFilename { .. }));
        assert!(engine.fetcher().fetched().is_empty());
    }

    #[test]
    fn test_events_in_order() {
        let temp = TempDir::new().unwrap();
        let fetcher = MapFetcher::default()
            .with("http://h/list.txt", b"1 a.gpf\n")
            .with("http://h/patch/a.gpf", b"x");
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);

        let engine = SyncEngine::new(fetcher).with_event_callback(move |event| {
            let name = match event {
                SyncEvent::SourceStarted { .. } => "started",
                SyncEvent::UpToDate { .. } => "up_to_date",
                SyncEvent::Starting { .. } => "starting",
                SyncEvent::Attempt { .. } => "attempt",
                SyncEvent::AttemptFailed { .. } => "attempt_failed",
                SyncEvent::Unlisted { .. } => "unlisted",
                SyncEvent::Applied { .. } => "applied",
                SyncEvent::Finished { .. } => "finished",
                SyncEvent::Failed { .. } => "failed",
            };
            sink.lock().unwrap().push(name);
        });

        let report = engine.sync_source(&source(temp.path()));
        assert!(report.is_success());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["started", "starting", "attempt", "applied", "finished"]
        );
    }
}
