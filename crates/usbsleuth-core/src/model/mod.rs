/// Data model - device records, file-set snapshots, and emitted events.

pub mod device;
pub mod event;
pub mod snapshot;

pub use device::{AttachedDevice, DeviceRecord, UNKNOWN_LABEL};
pub use event::{DeviceEvent, EventKind};
pub use snapshot::Snapshot;
