/// UsbSleuth Core - device discovery, snapshot diffing, and classification.
///
/// This crate contains all detection logic with zero UI dependencies.
/// Frontends (the egui GUI, tests, any future CLI) drive it through
/// [`sentry::Sentry`] and consume the [`events::DeviceEvent`] stream.
///
/// # Modules
///
/// - [`analysis`] - Blacklist, extension classifier, and snapshot differ.
/// - [`model`] - Device records, snapshots, and event types.
/// - [`lifecycle`] - Per-device status state machine (sticky `Flagged`).
/// - [`registry`] - Shared, lock-guarded map of attached devices.
/// - [`scanner`] - `jwalk`-based device enumeration and one-shot full scans.
/// - [`monitor`] - Per-device polling thread plus best-effort change hints.
/// - [`discovery`] - Removable-device discovery loop.
/// - [`events`] - Event fan-out to channels and the persistent log file.
/// - [`quarantine`] - Operator-triggered eject and file purge.
/// - [`export`] - CSV export of the event history.
/// - [`platform`] - Host adapters (Windows, Linux, in-memory) and system info.
/// - [`config`] - JSON configuration with defaults.
/// - [`error`] - Error taxonomy shared by every module.
pub mod analysis;
pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod export;
pub mod lifecycle;
pub mod model;
pub mod monitor;
pub mod platform;
pub mod quarantine;
pub mod registry;
pub mod scanner;
pub mod sentry;

pub use error::{Result, SentryError};
