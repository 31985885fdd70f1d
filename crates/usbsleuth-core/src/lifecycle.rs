/// Per-device lifecycle state machine.
///
/// ```text
/// Discovered ──► Analyzing ──┬──► Safe ──► Flagged
///                            └──────────► Flagged
/// (any) ──► Disconnected   (terminal)
/// ```
///
/// `Flagged` is sticky: nothing but removal leaves it. There is no edge from
/// `Flagged` back to `Safe`.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceStatus {
    Discovered,
    Analyzing,
    Safe,
    Flagged,
    Disconnected,
}

impl DeviceStatus {
    /// Human-readable label for display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Discovered => "Discovered",
            Self::Analyzing => "Analyzing",
            Self::Safe => "Safe",
            Self::Flagged => "Flagged",
            Self::Disconnected => "Disconnected",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Disconnected
    }
}

/// What happened to the device, as observed by discovery or a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleInput {
    /// The device monitor started.
    AnalysisStarted,
    /// A poll completed without any suspicious additions.
    CleanCycle,
    /// A poll found at least one suspicious added file.
    SuspiciousFound,
    /// The device left the host (or was quarantined).
    Removed,
}

/// A status change (or non-change) produced by [`next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: DeviceStatus,
    pub to: DeviceStatus,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }

    /// Whether this transition is the one that set the sticky flag.
    pub fn entered_flagged(&self) -> bool {
        self.changed() && self.to == DeviceStatus::Flagged
    }

    pub fn entered_safe(&self) -> bool {
        self.changed() && self.to == DeviceStatus::Safe
    }
}

/// Compute the next status. Total over all inputs: unknown combinations
/// leave the status unchanged.
pub fn next(from: DeviceStatus, input: LifecycleInput) -> Transition {
    use DeviceStatus::*;
    use LifecycleInput::*;

    let to = match (from, input) {
        (Disconnected, _) => Disconnected,
        (_, Removed) => Disconnected,
        (Discovered, AnalysisStarted) => Analyzing,
        (Discovered | Analyzing, CleanCycle) => Safe,
        (_, SuspiciousFound) => Flagged,
        (status, _) => status,
    };
    Transition { from, to }
}
