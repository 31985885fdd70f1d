/// Error taxonomy for the detection core.
///
/// No variant is fatal to the process: callers decide per variant whether to
/// skip a poll cycle, fall back to a placeholder, or surface it to the operator.
use std::path::PathBuf;

use thiserror::Error;

/// Shared `Result` alias for the core crate.
pub type Result<T> = std::result::Result<T, SentryError>;

#[derive(Debug, Error)]
pub enum SentryError {
    /// The device root could not be read this cycle (busy, momentarily gone).
    /// The poll is skipped and retried on the next cycle.
    #[error("device root {path} is temporarily unreadable: {source}")]
    TransientIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The device vanished from the host. Handled as a `Disconnected`
    /// transition, never shown to the operator as an error.
    #[error("device {id} is no longer attached")]
    DeviceGone { id: String },

    #[error("could not resolve volume label for {id}: {details}")]
    LabelResolution { id: String, details: String },

    /// The host refused or failed the unmount/eject request.
    #[error("quarantine of {id} failed: {details}")]
    QuarantineCommand { id: String, details: String },

    #[error("device {id} is not in the flagged set")]
    NotFlagged { id: String },

    /// Listing attached devices failed. Discovery treats this as "no change".
    #[error("removable device enumeration failed: {details}")]
    HostQuery { details: String },

    #[error("invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("configuration parse failure in {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn {component} thread: {source}")]
    ThreadSpawn {
        component: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported platform: {details}")]
    UnsupportedPlatform { details: String },
}

impl SentryError {
    /// Whether the failure only affects the current poll cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientIo { .. } | Self::HostQuery { .. })
    }
}
