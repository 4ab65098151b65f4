//! Configuration file handling.
//!
//! Configuration is an INI file. A `[general]` section holds run-wide
//! settings and every `[source.<name>]` section describes one remote source,
//! processed in file order:
//!
//! ```ini
//! [general]
//! retry_attempts = 5
//! timeout_secs = 300
//! log_level = info
//!
//! [source.kro]
//! output_dir = /srv/mirror/kro
//! patch_list = https://patch.example.com/patch2.txt
//! patch_dir = https://patch.example.com/patch/
//! checksum_list = https://patch.example.com/checksums.json
//! state_file = .patch_state
//! ```
//!
//! Relative `output_dir` and `log_dir` values are resolved against the
//! directory holding the configuration file.

mod preflight;

pub use preflight::{preflight, PreflightError};

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tracing::warn;

use crate::fetch::{DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT_SECS};

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV_VAR: &str = "PATCHSYNC_CONFIG";

/// Default state file name inside each output directory.
pub const DEFAULT_STATE_FILE: &str = ".patch_state";

/// Default log level when none is configured.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const GENERAL_SECTION: &str = "general";
const SOURCE_PREFIX: &str = "source.";

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or parsed.
    #[error("failed to load config file {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    /// The configuration text is not valid INI.
    #[error("invalid config syntax: {0}")]
    Syntax(String),

    /// A required key is absent.
    #[error("[{section}] is missing required key '{key}'")]
    MissingKey { section: String, key: String },

    /// A key has a value that cannot be used.
    #[error("[{section}] {key} = '{value}': {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Two sections describe a source with the same name.
    #[error("source '{0}' is defined more than once")]
    DuplicateSource(String),

    /// No `[source.<name>]` section was found.
    #[error("no sources configured")]
    NoSources,
}

/// One remote source to mirror.
///
/// Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Source name, used as the key for status output.
    pub name: String,

    /// Local directory receiving patch files and the state file.
    pub output_dir: PathBuf,

    /// URI of the patch index feed.
    pub index_url: String,

    /// Base URI that patch filenames are appended to.
    pub patch_base_url: String,

    /// URI of the optional checksum manifest.
    pub manifest_url: Option<String>,

    /// State file name, relative to `output_dir`.
    pub state_file: String,
}

impl SourceConfig {
    /// Create a source without a checksum manifest.
    pub fn new(
        name: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        index_url: impl Into<String>,
        patch_base_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            output_dir: output_dir.into(),
            index_url: index_url.into(),
            patch_base_url: patch_base_url.into(),
            manifest_url: None,
            state_file: DEFAULT_STATE_FILE.to_string(),
        }
    }

    /// Set the checksum manifest URI.
    pub fn with_manifest(mut self, url: impl Into<String>) -> Self {
        self.manifest_url = Some(url.into());
        self
    }

    /// Set the state file name.
    pub fn with_state_file(mut self, name: impl Into<String>) -> Self {
        self.state_file = name.into();
        self
    }

    /// Full path of this source's state file.
    pub fn state_path(&self) -> PathBuf {
        self.output_dir.join(&self.state_file)
    }

    /// Remote URI of a patch file.
    ///
    /// The filename is appended to the base as-is; the base is expected to
    /// end with a separator.
    pub fn patch_url(&self, filename: &str) -> String {
        format!("{}{}", self.patch_base_url, filename)
    }
}

/// Run-wide settings from the `[general]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Attempts per patch file before the source is aborted.
    pub retry_attempts: u32,

    /// HTTP request timeout.
    pub timeout: Duration,

    /// Default log filter directive.
    pub log_level: String,

    /// Directory for log files; logging goes to stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            retry_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_dir: None,
        }
    }
}

/// A parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    /// Run-wide settings.
    pub settings: SyncSettings,

    /// Sources in file order.
    pub sources: Vec<SourceConfig>,
}

impl ConfigFile {
    /// Load the configuration from `path`.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_ini(&ini, Some(base_dir))
    }

    /// Parse configuration text. Relative paths are kept as written.
    pub fn parse(text: &str) -> ConfigResult<Self> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Syntax(e.to_string()))?;
        Self::from_ini(&ini, None)
    }

    /// Find a source by name.
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    fn from_ini(ini: &Ini, base_dir: Option<&Path>) -> ConfigResult<Self> {
        let mut settings = SyncSettings::default();
        let mut sources: Vec<SourceConfig> = Vec::new();

        for (section, props) in ini.iter() {
            let Some(section) = section else {
                if props.iter().next().is_some() {
                    warn!("ignoring keys outside of any section");
                }
                continue;
            };

            if section == GENERAL_SECTION {
                settings = parse_general(section, props, base_dir)?;
            } else if let Some(name) = section.strip_prefix(SOURCE_PREFIX) {
                let source = parse_source(section, name, props, base_dir)?;
                if sources.iter().any(|s| s.name == source.name) {
                    return Err(ConfigError::DuplicateSource(source.name));
                }
                sources.push(source);
            } else {
                warn!(section, "ignoring unknown config section");
            }
        }

        if sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        Ok(Self { settings, sources })
    }
}

/// Path of the configuration file.
///
/// `PATCHSYNC_CONFIG` wins; otherwise `<config dir>/patchsync/config.ini`.
pub fn config_file_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }

    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("patchsync")
        .join("config.ini")
}

fn parse_general(
    section: &str,
    props: &ini::Properties,
    base_dir: Option<&Path>,
) -> ConfigResult<SyncSettings> {
    let mut settings = SyncSettings::default();

    if let Some(value) = props.get("retry_attempts") {
        let attempts = parse_number(section, "retry_attempts", value)?;
        if attempts == 0 {
            return Err(invalid(section, "retry_attempts", value, "must be at least 1"));
        }
        settings.retry_attempts = u32::try_from(attempts)
            .map_err(|_| invalid(section, "retry_attempts", value, "too large"))?;
    }

    if let Some(value) = props.get("timeout_secs") {
        let secs = parse_number(section, "timeout_secs", value)?;
        if secs == 0 {
            return Err(invalid(section, "timeout_secs", value, "must be at least 1"));
        }
        settings.timeout = Duration::from_secs(secs);
    }

    if let Some(value) = non_empty(props.get("log_level")) {
        settings.log_level = value.to_string();
    }

    if let Some(value) = non_empty(props.get("log_dir")) {
        settings.log_dir = Some(resolve_path(value, base_dir));
    }

    Ok(settings)
}

fn parse_source(
    section: &str,
    name: &str,
    props: &ini::Properties,
    base_dir: Option<&Path>,
) -> ConfigResult<SourceConfig> {
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid(section, "name", name, "source name must not be empty"));
    }

    let output_dir = resolve_path(required(section, props, "output_dir")?, base_dir);
    let index_url = required(section, props, "patch_list")?;
    let patch_base_url = required(section, props, "patch_dir")?;

    let mut source = SourceConfig::new(name, output_dir, index_url, patch_base_url);

    if let Some(url) = non_empty(props.get("checksum_list")) {
        source = source.with_manifest(url);
    }

    if let Some(state_file) = non_empty(props.get("state_file")) {
        if Path::new(state_file).components().count() != 1 {
            return Err(invalid(
                section,
                "state_file",
                state_file,
                "must be a plain file name",
            ));
        }
        source = source.with_state_file(state_file);
    }

    Ok(source)
}

fn required<'a>(section: &str, props: &'a ini::Properties, key: &str) -> ConfigResult<&'a str> {
    non_empty(props.get(key)).ok_or_else(|| ConfigError::MissingKey {
        section: section.to_string(),
        key: key.to_string(),
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number(section: &str, key: &str, value: &str) -> ConfigResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| invalid(section, key, value, &e.to_string()))
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn resolve_path(value: &str, base_dir: Option<&Path>) -> PathBuf {
    let path = PathBuf::from(value);
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}
