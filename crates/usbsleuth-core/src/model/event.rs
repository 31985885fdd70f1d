/// Structured events published by the core to every subscriber.
///
/// Events are immutable once emitted. Consumers (GUI log view, log file,
/// CSV export) never feed anything back into detection.
use crate::analysis::Classification;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A removable device appeared and is now being analysed.
    Discovered,
    /// A file path appeared on the device.
    Created,
    /// A file path disappeared from the device.
    Deleted,
    /// The device entered the sticky `Flagged` state.
    Flagged,
    /// The first clean poll completed.
    Safe,
    /// The device left the registry (unplugged or quarantined).
    Disconnected,
}

impl EventKind {
    /// Human-readable label for display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Discovered => "Discovered",
            Self::Created => "Created",
            Self::Deleted => "Deleted",
            Self::Flagged => "Flagged",
            Self::Safe => "Safe",
            Self::Disconnected => "Disconnected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub device_id: String,
    pub label: String,
    pub kind: EventKind,
    /// Relative file path; `None` for device-level events.
    pub path: Option<String>,
    /// Set on `Created` events only.
    pub classification: Option<Classification>,
    pub timestamp: DateTime<Local>,
}

impl DeviceEvent {
    /// A device-level event (no path, no classification).
    pub fn device(device_id: &str, label: &str, kind: EventKind) -> Self {
        Self {
            device_id: device_id.to_owned(),
            label: label.to_owned(),
            kind,
            path: None,
            classification: None,
            timestamp: Local::now(),
        }
    }

    pub fn created(device_id: &str, label: &str, path: &str, class: Classification) -> Self {
        Self {
            path: Some(path.to_owned()),
            classification: Some(class),
            ..Self::device(device_id, label, EventKind::Created)
        }
    }

    pub fn deleted(device_id: &str, label: &str, path: &str) -> Self {
        Self {
            path: Some(path.to_owned()),
            ..Self::device(device_id, label, EventKind::Deleted)
        }
    }

    pub fn is_suspicious(&self) -> bool {
        self.classification == Some(Classification::Suspicious)
    }
}
