/// Probe configuration: the runtime `ProbeConfig` handed to `start`, and the
/// `Settings` file the collector binary loads it from.
use crate::sink::{DiagnosticSink, TracingSink};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Custom property overriding the dstat executable.
pub const PATH_PROPERTY: &str = "benchmark.probe.dstat.path";

/// Custom property overriding the dstat command-line options.
pub const OPTS_PROPERTY: &str = "benchmark.probe.dstat.opts";

pub const DEFAULT_PATH: &str = "dstat";

/// Sampling interval passed to dstat when options are not overridden.
pub const DEFAULT_INTERVAL_SECS: u64 = 1;

pub fn default_opts() -> String {
    format!("--all --noheaders --noupdate {DEFAULT_INTERVAL_SECS}")
}

/// What the probe gets from the host harness at `start`.
#[derive(Clone)]
pub struct ProbeConfig {
    properties: HashMap<String, String>,
    output: Arc<dyn DiagnosticSink>,
    error: Arc<dyn DiagnosticSink>,
}

impl ProbeConfig {
    /// Config with the given custom properties, reporting through tracing.
    pub fn new(properties: HashMap<String, String>) -> Self {
        Self {
            properties,
            output: Arc::new(TracingSink::output()),
            error: Arc::new(TracingSink::error()),
        }
    }

    pub fn with_sinks(
        mut self,
        output: Arc<dyn DiagnosticSink>,
        error: Arc<dyn DiagnosticSink>,
    ) -> Self {
        self.output = output;
        self.error = error;
        self
    }

    pub fn custom_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn output(&self) -> &Arc<dyn DiagnosticSink> {
        &self.output
    }

    pub fn error(&self) -> &Arc<dyn DiagnosticSink> {
        &self.error
    }

    /// Executable to launch; an absent or empty override falls back to `dstat`.
    pub fn dstat_path(&self) -> String {
        match self.custom_property(PATH_PROPERTY) {
            Some(path) if !path.is_empty() => path.to_string(),
            _ => DEFAULT_PATH.to_string(),
        }
    }

    /// Options to pass, split on whitespace.
    pub fn dstat_opts(&self) -> Vec<String> {
        let opts = match self.custom_property(OPTS_PROPERTY) {
            Some(opts) if !opts.trim().is_empty() => opts.to_string(),
            _ => default_opts(),
        };
        opts.split_whitespace().map(str::to_string).collect()
    }
}

impl std::fmt::Debug for ProbeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeConfig")
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

/// How the collector binary renders samples on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Json,
}

/// Top-level settings loaded from dstat-probe.toml.
#[derive(Debug, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    /// Custom properties handed to the probe verbatim.
    pub properties: HashMap<String, String>,
    pub collect: CollectConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    /// How often `points()` is drained.
    pub interval_secs: u64,
    /// Total run time; 0 runs until Ctrl-C.
    pub duration_secs: u64,
    /// Grace period between SIGTERM and SIGKILL on stop.
    pub stop_timeout_secs: u64,
    pub format: OutputFormat,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            duration_secs: 0,
            stop_timeout_secs: 5,
            format: OutputFormat::Csv,
        }
    }
}

/// Errors loading the settings file.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "settings file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
