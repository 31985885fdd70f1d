/// Device identity as reported by the host, and the registry's per-device record.
use crate::lifecycle::DeviceStatus;
use crate::model::Snapshot;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Placeholder label used when the host cannot resolve a volume label.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// A removable device currently reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachedDevice {
    /// Device path string, unique per attached volume (`E:\`, `/media/usb0`).
    pub id: String,
    /// Directory that is enumerated on every poll.
    pub root: PathBuf,
}

impl AttachedDevice {
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
        }
    }
}

/// Everything the registry knows about one attached device.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub device: AttachedDevice,
    /// Volume label, or [`UNKNOWN_LABEL`].
    pub label: String,
    pub status: DeviceStatus,
    /// Result of the most recent successful enumeration.
    pub snapshot: Snapshot,
    pub first_seen_at: DateTime<Local>,
    /// Assigned by the registry on insert; distinguishes a re-attached
    /// device from the record a stale poll started on.
    pub generation: u64,
    /// `None` until the first successful poll completes.
    pub last_polled_at: Option<DateTime<Local>>,
}

impl DeviceRecord {
    /// A freshly discovered device with an empty snapshot.
    pub fn discovered(device: AttachedDevice, label: String) -> Self {
        Self {
            device,
            label,
            status: DeviceStatus::Discovered,
            snapshot: Snapshot::default(),
            first_seen_at: Local::now(),
            generation: 0,
            last_polled_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.device.id
    }

    /// Whether no poll has completed yet, i.e. the next poll is the baseline.
    pub fn awaiting_baseline(&self) -> bool {
        self.last_polled_at.is_none()
    }
}
