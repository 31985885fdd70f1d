/// Platform adapters - the host capabilities the core depends on.
///
/// Detection logic never talks to the OS directly; it goes through
/// [`HostAdapter`], so the same diffing, classification, and lifecycle code
/// runs against Windows drive letters, Linux mount points, or the in-memory
/// [`MemoryHost`] used by tests.
pub mod linux;
pub mod memory;
pub mod system_info;
#[cfg(windows)]
pub mod windows;

use crate::error::{Result, SentryError};
use crate::model::{AttachedDevice, Snapshot};
use crate::scanner;
use std::sync::Arc;

pub use memory::MemoryHost;
pub use system_info::SystemInfo;

/// A host adapter shared between threads.
pub type SharedHost = Arc<dyn HostAdapter>;

/// Host capabilities queried by discovery, monitors, and quarantine.
pub trait HostAdapter: Send + Sync {
    /// Removable devices attached right now.
    fn removable_devices(&self) -> Result<Vec<AttachedDevice>>;

    /// Best-effort volume label.
    fn volume_label(&self, device: &AttachedDevice) -> Result<String>;

    /// Recursive file listing of the device root.
    fn list_files(&self, device: &AttachedDevice, threads: usize) -> Result<Snapshot> {
        scanner::take_snapshot(&device.root, threads)
    }

    /// Unmount and eject the device.
    fn eject(&self, device: &AttachedDevice) -> Result<()>;

    /// Delete one file, given by its `/`-separated path relative to the root.
    fn remove_file(&self, device: &AttachedDevice, relative: &str) -> Result<()> {
        let path = relative
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(device.root.clone(), |acc, part| acc.join(part));
        std::fs::remove_file(&path).map_err(|source| SentryError::Io { path, source })
    }

    /// Whether this host can deliver file-change notifications that let a
    /// device monitor poll early.
    fn supports_change_hints(&self) -> bool {
        false
    }
}

/// Adapter for hosts with no removable-device support.
#[derive(Debug, Default)]
pub struct UnsupportedHost;

impl HostAdapter for UnsupportedHost {
    fn removable_devices(&self) -> Result<Vec<AttachedDevice>> {
        Err(SentryError::UnsupportedPlatform {
            details: std::env::consts::OS.to_owned(),
        })
    }

    fn volume_label(&self, device: &AttachedDevice) -> Result<String> {
        Err(SentryError::LabelResolution {
            id: device.id.clone(),
            details: "unsupported platform".into(),
        })
    }

    fn eject(&self, device: &AttachedDevice) -> Result<()> {
        Err(SentryError::QuarantineCommand {
            id: device.id.clone(),
            details: "eject is not supported on this platform".into(),
        })
    }
}

/// The adapter for the platform this binary was built for.
pub fn native_host() -> SharedHost {
    #[cfg(windows)]
    {
        Arc::new(windows::WindowsHost::new())
    }
    #[cfg(target_os = "linux")]
    {
        Arc::new(linux::LinuxHost::new())
    }
    #[cfg(not(any(windows, target_os = "linux")))]
    {
        Arc::new(UnsupportedHost)
    }
}
