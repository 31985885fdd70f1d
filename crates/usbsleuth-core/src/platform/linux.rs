/// Removable-device enumeration on Linux via `/proc/self/mounts` and sysfs.
///
/// A mount is reported when its source is a block device whose parent disk
/// has `/sys/class/block/<disk>/removable == 1`. The id and scan root are the
/// mount point. Eject goes through `udisksctl` so no root privileges are
/// required on desktop systems.
use crate::error::{Result, SentryError};
use crate::model::AttachedDevice;
use crate::platform::HostAdapter;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const PROC_MOUNTS: &str = "/proc/self/mounts";
const SYS_BLOCK: &str = "/sys/class/block";
const BY_LABEL: &str = "/dev/disk/by-label";

/// One line of `/proc/self/mounts` that refers to a `/dev` block device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMount {
    /// Source device, e.g. `/dev/sdb1`.
    pub device: PathBuf,
    pub mount_point: PathBuf,
}

#[derive(Debug)]
pub struct LinuxHost {
    sys_block: PathBuf,
}

impl Default for LinuxHost {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxHost {
    pub fn new() -> Self {
        Self {
            sys_block: PathBuf::from(SYS_BLOCK),
        }
    }

    fn is_removable(&self, device: &Path) -> bool {
        let Some(name) = device.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        // Partitions inherit removability from their parent disk; the sysfs
        // entry of a partition resolves to `<disk>/<partition>`.
        let entry = self.sys_block.join(name);
        let candidates = [
            entry.join("removable"),
            fs::canonicalize(&entry)
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("removable")))
                .unwrap_or_default(),
        ];
        candidates.iter().any(|path| {
            fs::read_to_string(path)
                .map(|v| v.trim() == "1")
                .unwrap_or(false)
        })
    }

    fn mount_for(&self, device: &AttachedDevice) -> Result<BlockMount> {
        let raw = fs::read_to_string(PROC_MOUNTS).map_err(|source| SentryError::Io {
            path: PathBuf::from(PROC_MOUNTS),
            source,
        })?;
        parse_block_mounts(&raw)
            .into_iter()
            .find(|m| m.mount_point == device.root)
            .ok_or_else(|| SentryError::DeviceGone {
                id: device.id.clone(),
            })
    }
}

impl HostAdapter for LinuxHost {
    fn removable_devices(&self) -> Result<Vec<AttachedDevice>> {
        let raw = fs::read_to_string(PROC_MOUNTS).map_err(|err| SentryError::HostQuery {
            details: format!("{PROC_MOUNTS}: {err}"),
        })?;
        Ok(parse_block_mounts(&raw)
            .into_iter()
            .filter(|m| self.is_removable(&m.device))
            .map(|m| {
                let id = m.mount_point.to_string_lossy().into_owned();
                AttachedDevice::new(id, m.mount_point)
            })
            .collect())
    }

    fn volume_label(&self, device: &AttachedDevice) -> Result<String> {
        let mount = self.mount_for(device)?;
        let source = fs::canonicalize(&mount.device).unwrap_or(mount.device);
        let entries = fs::read_dir(BY_LABEL).map_err(|err| SentryError::LabelResolution {
            id: device.id.clone(),
            details: format!("{BY_LABEL}: {err}"),
        })?;
        for entry in entries.flatten() {
            if fs::canonicalize(entry.path()).ok().as_deref() == Some(source.as_path()) {
                return Ok(unescape_mount_field(&entry.file_name().to_string_lossy()));
            }
        }
        Err(SentryError::LabelResolution {
            id: device.id.clone(),
            details: "no entry in /dev/disk/by-label".into(),
        })
    }

    fn eject(&self, device: &AttachedDevice) -> Result<()> {
        let mount = self.mount_for(device).map_err(|err| SentryError::QuarantineCommand {
            id: device.id.clone(),
            details: err.to_string(),
        })?;
        let block = mount.device.to_string_lossy().into_owned();
        run_udisksctl(&device.id, &["unmount", "-b", &block])?;
        // Powering off is best effort: the volume is already unmounted, so
        // it no longer appears in discovery.
        if let Err(err) = run_udisksctl(&device.id, &["power-off", "-b", &block]) {
            tracing::warn!("Eject: {} unmounted but not powered off: {}", device.id, err);
        }
        Ok(())
    }
}

fn run_udisksctl(id: &str, args: &[&str]) -> Result<()> {
    let output = Command::new("udisksctl")
        .args(args)
        .output()
        .map_err(|err| SentryError::QuarantineCommand {
            id: id.to_owned(),
            details: format!("cannot run udisksctl: {err}"),
        })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(SentryError::QuarantineCommand {
            id: id.to_owned(),
            details: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}

/// Parse `/proc/self/mounts`, keeping only `/dev/...` block-device sources.
pub fn parse_block_mounts(raw: &str) -> Vec<BlockMount> {
    raw.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let source = fields.next()?;
            let target = fields.next()?;
            if !source.starts_with("/dev/") || source.starts_with("/dev/loop") {
                return None;
            }
            Some(BlockMount {
                device: PathBuf::from(unescape_mount_field(source)),
                mount_point: PathBuf::from(unescape_mount_field(target)),
            })
        })
        .collect()
}

/// Decode the octal escapes (`\040` for space, ...) used by the kernel in
/// mount tables and by udev in `/dev/disk/by-label` names.
pub fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
