/// Startup configuration: JSON file + documented defaults.
///
/// Lookup order for the file: the `USBSLEUTH_CONFIG` environment variable,
/// then `usbsleuth.json` in the working directory. A missing file means
/// defaults; a present but malformed file is an error.
use crate::analysis::{Blacklist, Classifier};
use crate::error::{Result, SentryError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "USBSLEUTH_CONFIG";

/// File name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "usbsleuth.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SentryConfig {
    /// Dangerous extensions, with or without the leading dot.
    pub blacklist: Vec<String>,
    /// How often attached removable devices are enumerated.
    pub discovery_interval_ms: u64,
    /// How often each attached device is fully re-scanned.
    pub poll_interval_ms: u64,
    /// Wake a device monitor early when the host reports file changes.
    pub change_hints: bool,
    /// Persistent event log.
    pub log_path: PathBuf,
    /// Threads used by one device enumeration.
    pub snapshot_threads: usize,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            blacklist: crate::analysis::blacklist::DEFAULT_EXTENSIONS
                .iter()
                .map(|e| (*e).to_owned())
                .collect(),
            discovery_interval_ms: 1_000,
            poll_interval_ms: 30_000,
            change_hints: true,
            log_path: PathBuf::from("usb_monitor.log"),
            snapshot_threads: num_cpus::get().clamp(1, 4),
        }
    }
}

impl SentryConfig {
    /// Load from the environment-selected or default file, falling back to
    /// defaults when neither exists.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Self::from_file(local);
        }
        tracing::info!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load and validate a specific file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| SentryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&raw).map_err(|err| match err {
            SentryError::ConfigParse { source, .. } => SentryError::ConfigParse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate JSON text. Missing keys take their defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|source| SentryError::ConfigParse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.discovery_interval_ms == 0 {
            return Err(SentryError::InvalidConfig {
                details: "discovery_interval_ms must be greater than zero".into(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(SentryError::InvalidConfig {
                details: "poll_interval_ms must be greater than zero".into(),
            });
        }
        if self.snapshot_threads == 0 {
            return Err(SentryError::InvalidConfig {
                details: "snapshot_threads must be at least 1".into(),
            });
        }
        Blacklist::new(&self.blacklist)?;
        Ok(())
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Build the classifier described by this configuration.
    pub fn classifier(&self) -> Result<Classifier> {
        Ok(Classifier::new(Blacklist::new(&self.blacklist)?))
    }
}
