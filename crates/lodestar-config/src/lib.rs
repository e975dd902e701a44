//! Workspace configuration for Lodestar.
//!
//! The configuration is a single TOML document. Every field has a default, so an
//! empty (or missing) file yields [`LodestarConfig::default`].

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use parking_lot::ReentrantMutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod logging;

pub use logging::{init_tracing, LoggingConfig};

/// What happens to a file's previous contribution when re-parsing it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailurePolicy {
    /// Keep serving the last successful parse result.
    #[default]
    Retain,
    /// Drop everything the file contributed.
    Retract,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    /// Worker threads for the indexing pipeline; `0` uses the host parallelism.
    #[serde(default)]
    pub threads: usize,

    #[serde(default)]
    pub on_parse_failure: ParseFailurePolicy,

    /// Drop parse results older than the last one merged for the same file.
    #[serde(default = "default_true")]
    pub reject_stale_merges: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            on_parse_failure: ParseFailurePolicy::default(),
            reject_stale_merges: true,
        }
    }
}

impl IndexConfig {
    pub fn worker_threads(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexCacheConfig {
    /// Root of the persistent cache. When unset, `LODESTAR_CACHE_DIR` is
    /// consulted; with neither, parse results are kept in memory only.
    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default = "IndexCacheConfig::default_ttl_days")]
    pub ttl_days: u64,

    #[serde(default = "IndexCacheConfig::default_max_bytes")]
    pub max_bytes: u64,

    #[serde(default = "IndexCacheConfig::default_gc_interval_secs")]
    pub gc_interval_secs: u64,
}

impl IndexCacheConfig {
    fn default_ttl_days() -> u64 {
        30
    }

    fn default_max_bytes() -> u64 {
        1024 * 1024 * 1024
    }

    fn default_gc_interval_secs() -> u64 {
        10 * 60
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_days.saturating_mul(24 * 60 * 60))
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }
}

impl Default for IndexCacheConfig {
    fn default() -> Self {
        Self {
            directory: None,
            ttl_days: Self::default_ttl_days(),
            max_bytes: Self::default_max_bytes(),
            gc_interval_secs: Self::default_gc_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodeLensConfig {
    /// Emit reference lenses for locals and parameters.
    #[serde(default = "default_true")]
    pub local_variables: bool,
}

impl Default for CodeLensConfig {
    fn default() -> Self {
        Self {
            local_variables: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LodestarConfig {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub cache: IndexCacheConfig,
    #[serde(default)]
    pub code_lens: CodeLensConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

/// Redact user-controlled text from a `toml`/`serde` error message.
///
/// Messages can echo config values (`invalid type: string "secret"`) or keys
/// (``unknown field `secret` ``), and config errors end up in logs. Quoted
/// runs are always redacted; backticked runs only where they hold user input,
/// so schema names in the `expected ...` tail survive.
fn sanitize_toml_error_message(message: &str) -> String {
    static QUOTED_STRING_RE: OnceLock<Regex> = OnceLock::new();
    static SINGLE_QUOTED_STRING_RE: OnceLock<Regex> = OnceLock::new();

    // Escaped quotes (`\"`) do not end a quoted run.
    let quoted = QUOTED_STRING_RE.get_or_init(|| {
        Regex::new(r#""(?:\\.|[^"\\])*""#).expect("quoted-string regex should compile")
    });
    let mut out = quoted
        .replace_all(message, r#""<redacted>""#)
        .into_owned();

    let single_quoted = SINGLE_QUOTED_STRING_RE.get_or_init(|| {
        Regex::new(r#"'(?:\\.|[^'\\])*'"#).expect("single-quoted-string regex should compile")
    });
    out = single_quoted
        .replace_all(&out, "'<redacted>'")
        .into_owned();

    // `missing field `foo`` names a schema field and is kept.
    let mut start = ["unknown field `", "unknown variant `"]
        .iter()
        .filter_map(|pattern| out.find(pattern).map(|pos| pos + pattern.len() - 1))
        .min();
    if start.is_none() && (out.contains("invalid type:") || out.contains("invalid value:")) {
        let boundary = out.find(", expected").unwrap_or(out.len());
        start = out[..boundary].find('`');
        if start.is_none() && boundary == out.len() {
            start = out.find('`');
        }
    }

    if let Some(start) = start {
        let after_start = &out[start + 1..];
        let end_rel = after_start
            .rfind("`, expected")
            .or_else(|| after_start.rfind('`'));
        if let Some(end_rel) = end_rel {
            let end = start + 1 + end_rel;
            out.replace_range(start + 1..end, "<redacted>");
        }
    }

    out
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // `Display` includes a source snippet; keep only the message.
        ConfigError::Toml(sanitize_toml_error_message(err.message()))
    }
}

impl LodestarConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

pub const LODESTAR_CONFIG_ENV_VAR: &str = "LODESTAR_CONFIG_PATH";

static CONFIG_ENV_LOCK: OnceLock<ReentrantMutex<()>> = OnceLock::new();

fn config_env_lock() -> &'static ReentrantMutex<()> {
    CONFIG_ENV_LOCK.get_or_init(|| ReentrantMutex::new(()))
}

/// Run `f` while holding the lock that serializes config discovery.
///
/// Tests that set [`LODESTAR_CONFIG_ENV_VAR`] wrap the mutation and the
/// discovery in this so concurrent tests don't observe the override.
pub fn with_config_env_lock<R>(f: impl FnOnce() -> R) -> R {
    let _guard = config_env_lock().lock();
    f()
}

/// Discover the configuration file for a workspace root.
///
/// Search order:
/// 1) `LODESTAR_CONFIG_PATH` (absolute or relative to `workspace_root`)
/// 2) `lodestar.toml`
/// 3) `.lodestar.toml`
/// 4) `.lodestar/config.toml`
pub fn discover_config_path(workspace_root: &Path) -> Option<PathBuf> {
    let _guard = config_env_lock().lock();
    if let Some(value) = std::env::var_os(LODESTAR_CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(value);
        let path = if candidate.is_absolute() {
            candidate
        } else {
            workspace_root.join(candidate)
        };
        return Some(path.canonicalize().unwrap_or(path));
    }

    ["lodestar.toml", ".lodestar.toml", ".lodestar/config.toml"]
        .into_iter()
        .map(|name| workspace_root.join(name))
        .find(|path| path.is_file())
        .map(|path| path.canonicalize().unwrap_or(path))
}

/// Load the configuration for a workspace root.
///
/// If no config is present, returns [`LodestarConfig::default`] and `None`.
pub fn load_for_workspace(
    workspace_root: &Path,
) -> Result<(LodestarConfig, Option<PathBuf>), ConfigError> {
    let Some(path) = discover_config_path(workspace_root) else {
        return Ok((LodestarConfig::default(), None));
    };

    let config = LodestarConfig::load_from_path(&path)?;
    tracing::info!(
        target: "lodestar.config",
        path = %path.display(),
        "loaded configuration"
    );
    Ok((config, Some(path)))
}
