/// In-memory host adapter with failure injection.
///
/// Devices and their files live in a map; tests (and demos) attach, detach,
/// and edit devices while the real discovery loop and monitors run against it.
use crate::error::{Result, SentryError};
use crate::model::{AttachedDevice, Snapshot};
use crate::platform::HostAdapter;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::io;

#[derive(Debug, Default)]
struct FakeDevice {
    label: Option<String>,
    files: BTreeSet<String>,
    read_failure: bool,
    eject_failure: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    devices: BTreeMap<String, FakeDevice>,
    listing_failure: bool,
    ejected: Vec<String>,
    label_queries: usize,
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<State>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device. `label = None` makes label resolution fail.
    pub fn attach(&self, id: &str, label: Option<&str>, files: &[&str]) {
        self.state.lock().devices.insert(
            id.to_owned(),
            FakeDevice {
                label: label.map(str::to_owned),
                files: files.iter().map(|f| (*f).to_owned()).collect(),
                ..FakeDevice::default()
            },
        );
    }

    pub fn detach(&self, id: &str) {
        self.state.lock().devices.remove(id);
    }

    pub fn add_file(&self, id: &str, path: &str) {
        if let Some(dev) = self.state.lock().devices.get_mut(id) {
            dev.files.insert(path.to_owned());
        }
    }

    pub fn delete_file(&self, id: &str, path: &str) {
        if let Some(dev) = self.state.lock().devices.get_mut(id) {
            dev.files.remove(path);
        }
    }

    /// Make `removable_devices` fail until reset.
    pub fn set_listing_failure(&self, fail: bool) {
        self.state.lock().listing_failure = fail;
    }

    /// Make `list_files` for one device fail until reset.
    pub fn set_read_failure(&self, id: &str, fail: bool) {
        if let Some(dev) = self.state.lock().devices.get_mut(id) {
            dev.read_failure = fail;
        }
    }

    /// Make `eject` for one device fail with `reason` (or succeed with `None`).
    pub fn set_eject_failure(&self, id: &str, reason: Option<&str>) {
        if let Some(dev) = self.state.lock().devices.get_mut(id) {
            dev.eject_failure = reason.map(str::to_owned);
        }
    }

    /// Ids successfully ejected so far, in order.
    pub fn ejected(&self) -> Vec<String> {
        self.state.lock().ejected.clone()
    }

    pub fn label_queries(&self) -> usize {
        self.state.lock().label_queries
    }
}

impl HostAdapter for MemoryHost {
    fn removable_devices(&self) -> Result<Vec<AttachedDevice>> {
        let state = self.state.lock();
        if state.listing_failure {
            return Err(SentryError::HostQuery {
                details: "injected listing failure".into(),
            });
        }
        Ok(state
            .devices
            .keys()
            .map(|id| AttachedDevice::new(id.as_str(), id.as_str()))
            .collect())
    }

    fn volume_label(&self, device: &AttachedDevice) -> Result<String> {
        let mut state = self.state.lock();
        state.label_queries += 1;
        state
            .devices
            .get(&device.id)
            .and_then(|d| d.label.clone())
            .ok_or_else(|| SentryError::LabelResolution {
                id: device.id.clone(),
                details: "no label".into(),
            })
    }

    fn list_files(&self, device: &AttachedDevice, _threads: usize) -> Result<Snapshot> {
        let state = self.state.lock();
        match state.devices.get(&device.id) {
            Some(dev) if !dev.read_failure => Ok(dev.files.iter().map(String::as_str).collect()),
            _ => Err(SentryError::TransientIo {
                path: device.root.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "device not readable"),
            }),
        }
    }

    fn eject(&self, device: &AttachedDevice) -> Result<()> {
        let mut state = self.state.lock();
        let reason = match state.devices.get(&device.id) {
            None => Some("device not present".to_owned()),
            Some(dev) => dev.eject_failure.clone(),
        };
        if let Some(details) = reason {
            return Err(SentryError::QuarantineCommand {
                id: device.id.clone(),
                details,
            });
        }
        state.devices.remove(&device.id);
        state.ejected.push(device.id.clone());
        Ok(())
    }

    fn remove_file(&self, device: &AttachedDevice, relative: &str) -> Result<()> {
        let mut state = self.state.lock();
        let removed = state
            .devices
            .get_mut(&device.id)
            .is_some_and(|dev| dev.files.remove(relative));
        if removed {
            Ok(())
        } else {
            Err(SentryError::Io {
                path: device.root.join(relative),
                source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
            })
        }
    }
}
