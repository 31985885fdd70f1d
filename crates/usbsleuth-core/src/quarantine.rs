/// Quarantine controller - operator-triggered eject and per-file purge.
///
/// Only flagged devices can be ejected. A successful eject stops the
/// device's monitor, emits `Disconnected`, and removes the record; a failed
/// one is returned to the caller and the device stays flagged. Nothing here
/// retries.
use crate::error::{Result, SentryError};
use crate::lifecycle::LifecycleInput;
use crate::model::{DeviceEvent, EventKind};
use crate::monitor::{MonitorContext, MonitorSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a successful `quarantine` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuarantineOutcome {
    /// The flagged set was empty; nothing was attempted.
    NothingFlagged,
    /// The device was ejected and removed from the registry.
    Ejected { id: String, label: String },
}

/// Outcome of deleting one file.
#[derive(Debug)]
pub struct PurgeOutcome {
    pub path: String,
    pub result: Result<()>,
}

impl PurgeOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Clone)]
pub struct QuarantineController {
    ctx: Arc<MonitorContext>,
    monitors: Arc<MonitorSet>,
}

impl QuarantineController {
    pub fn new(ctx: Arc<MonitorContext>, monitors: Arc<MonitorSet>) -> Self {
        Self { ctx, monitors }
    }

    /// Eject one flagged device.
    pub fn quarantine(&self, id: &str) -> Result<QuarantineOutcome> {
        let registry = &self.ctx.registry;
        if registry.flagged_count() == 0 {
            warn!("Quarantine: no flagged devices");
            return Ok(QuarantineOutcome::NothingFlagged);
        }
        if !registry.is_flagged(id) {
            return Err(SentryError::NotFlagged { id: id.to_owned() });
        }
        let record = registry
            .get(id)
            .ok_or_else(|| SentryError::DeviceGone { id: id.to_owned() })?;

        if let Err(e) = self.ctx.host.eject(&record.device) {
            warn!("Quarantine: eject of {} ({}) failed: {}", record.label, id, e);
            return Err(e);
        }

        registry.apply(id, LifecycleInput::Removed);
        self.monitors.stop(id);
        info!("Quarantine: {} ({}) ejected", record.label, id);
        // Discovery may already have noticed the device is gone.
        if registry.remove(id).is_some() {
            self.ctx
                .bus
                .emit(DeviceEvent::device(id, &record.label, EventKind::Disconnected));
        }

        Ok(QuarantineOutcome::Ejected {
            id: id.to_owned(),
            label: record.label,
        })
    }

    /// Attempt every flagged device, one at a time. Each outcome stands alone.
    pub fn quarantine_all(&self) -> Vec<(String, Result<QuarantineOutcome>)> {
        let flagged = self.ctx.registry.flagged();
        if flagged.is_empty() {
            warn!("Quarantine: no flagged devices");
        }
        flagged
            .into_iter()
            .map(|id| {
                let outcome = self.quarantine(&id);
                (id, outcome)
            })
            .collect()
    }

    /// Delete files from a device one at a time.
    ///
    /// Not atomic: each path succeeds or fails on its own. The device keeps
    /// its status; the monitor is woken so the next poll reports the deletes.
    pub fn purge_files(&self, id: &str, paths: &[String]) -> Result<Vec<PurgeOutcome>> {
        let record = self
            .ctx
            .registry
            .get(id)
            .ok_or_else(|| SentryError::DeviceGone { id: id.to_owned() })?;

        let outcomes: Vec<PurgeOutcome> = paths
            .iter()
            .map(|path| {
                let result = self.ctx.host.remove_file(&record.device, path);
                match &result {
                    Ok(()) => info!("Quarantine: deleted {} from {}", path, id),
                    Err(e) => warn!("Quarantine: could not delete {}: {}", path, e),
                }
                PurgeOutcome {
                    path: path.clone(),
                    result,
                }
            })
            .collect();

        self.monitors.wake(id);
        Ok(outcomes)
    }
}
