/// Removable-drive enumeration and eject using the Windows API.
///
/// Drive letters whose `GetDriveTypeW` is `DRIVE_REMOVABLE` are reported as
/// devices; the id is the root string (`"E:\"`), which is also the scan root.
use crate::error::{Result, SentryError};
use crate::model::AttachedDevice;
use crate::platform::HostAdapter;
use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;
use std::time::Duration;
use tracing::{debug, warn};
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, GetDriveTypeW, GetLogicalDriveStringsW, GetVolumeInformationW,
    FILE_FLAGS_AND_ATTRIBUTES, FILE_GENERIC_READ, FILE_GENERIC_WRITE, FILE_SHARE_READ,
    FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows::Win32::System::Ioctl::{
    FSCTL_DISMOUNT_VOLUME, FSCTL_LOCK_VOLUME, IOCTL_STORAGE_EJECT_MEDIA,
};
use windows::Win32::System::IO::DeviceIoControl;

// Drive type constant from the Windows API.
const DRIVE_REMOVABLE_VAL: u32 = 2;

/// Attempts to take the exclusive volume lock before giving up.
const LOCK_ATTEMPTS: u32 = 10;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
pub struct WindowsHost;

impl WindowsHost {
    pub fn new() -> Self {
        Self
    }
}

impl HostAdapter for WindowsHost {
    fn removable_devices(&self) -> Result<Vec<AttachedDevice>> {
        // GetLogicalDriveStringsW returns null-separated drive root strings.
        let mut buffer = [0u16; 256];
        let len = unsafe { GetLogicalDriveStringsW(Some(&mut buffer)) };
        if len == 0 {
            return Err(SentryError::HostQuery {
                details: "GetLogicalDriveStringsW returned 0".into(),
            });
        }

        let full = OsString::from_wide(&buffer[..len as usize]);
        let full_str = full.to_string_lossy();

        let mut devices = Vec::new();
        for root in full_str.split('\0').filter(|s| !s.is_empty()) {
            let root_wide = wide(root);
            let raw_type = unsafe { GetDriveTypeW(windows::core::PCWSTR(root_wide.as_ptr())) };
            if raw_type == DRIVE_REMOVABLE_VAL {
                devices.push(AttachedDevice::new(root, root));
            }
        }
        Ok(devices)
    }

    fn volume_label(&self, device: &AttachedDevice) -> Result<String> {
        let root_wide = wide(&device.id);
        let mut label_buf = [0u16; 256];
        unsafe {
            GetVolumeInformationW(
                windows::core::PCWSTR(root_wide.as_ptr()),
                Some(&mut label_buf),
                None,
                None,
                None,
                None,
            )
        }
        .map_err(|e| SentryError::LabelResolution {
            id: device.id.clone(),
            details: e.to_string(),
        })?;

        let end = label_buf.iter().position(|&c| c == 0).unwrap_or(0);
        let label = String::from_utf16_lossy(&label_buf[..end]);
        if label.is_empty() {
            return Err(SentryError::LabelResolution {
                id: device.id.clone(),
                details: "volume has no label".into(),
            });
        }
        Ok(label)
    }

    /// Lock, dismount, and eject the volume behind the drive letter.
    fn eject(&self, device: &AttachedDevice) -> Result<()> {
        let letter = device.id.trim_end_matches('\\');
        let volume_path = wide(&format!("\\\\.\\{letter}"));
        let fail = |details: String| SentryError::QuarantineCommand {
            id: device.id.clone(),
            details,
        };

        let handle: HANDLE = unsafe {
            CreateFileW(
                windows::core::PCWSTR(volume_path.as_ptr()),
                FILE_GENERIC_READ.0 | FILE_GENERIC_WRITE.0,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                None,
                OPEN_EXISTING,
                FILE_FLAGS_AND_ATTRIBUTES(0),
                None,
            )
        }
        .map_err(|e| fail(format!("cannot open volume: {e}")))?;

        let result = lock_dismount_eject(handle).map_err(fail);
        unsafe {
            let _ = CloseHandle(handle);
        }
        result
    }

    fn supports_change_hints(&self) -> bool {
        true
    }
}

fn lock_dismount_eject(handle: HANDLE) -> std::result::Result<(), String> {
    let mut locked = false;
    for attempt in 1..=LOCK_ATTEMPTS {
        if control(handle, FSCTL_LOCK_VOLUME).is_ok() {
            locked = true;
            break;
        }
        debug!("Eject: volume busy, lock attempt {} failed", attempt);
        std::thread::sleep(LOCK_RETRY_DELAY);
    }
    if !locked {
        return Err("volume is in use and could not be locked".into());
    }

    control(handle, FSCTL_DISMOUNT_VOLUME).map_err(|e| format!("dismount failed: {e}"))?;
    control(handle, IOCTL_STORAGE_EJECT_MEDIA).map_err(|e| {
        warn!("Eject: volume dismounted but media eject failed: {}", e);
        format!("eject failed: {e}")
    })
}

fn control(handle: HANDLE, code: u32) -> windows::core::Result<()> {
    let mut bytes_returned = 0u32;
    unsafe {
        DeviceIoControl(
            handle,
            code,
            None,
            0,
            None,
            0,
            Some(&mut bytes_returned),
            None,
        )
    }
}

/// Null-terminated UTF-16 copy of `s`.
fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}
