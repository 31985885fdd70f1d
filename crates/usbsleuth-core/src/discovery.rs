/// Discovery loop - reconciles attached removable devices with the registry.
///
/// Every interval the host is asked for its removable devices. Ids that are
/// new get a record, a `Discovered` event, and a device monitor; registry
/// ids that no longer appear are disconnected and removed. A failed listing
/// changes nothing, so a flaky host query never looks like a mass unplug.
use crate::error::{Result, SentryError};
use crate::lifecycle::LifecycleInput;
use crate::model::{AttachedDevice, DeviceEvent, DeviceRecord, EventKind, UNKNOWN_LABEL};
use crate::monitor::{DeviceMonitor, MonitorContext, MonitorSet};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a single reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Newly discovered device ids, in listing order.
    pub attached: Vec<String>,
    /// Device ids confirmed gone, sorted.
    pub detached: Vec<String>,
    /// The host listing failed; nothing was changed.
    pub listing_failed: bool,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty()
    }
}

pub struct DiscoveryLoop {
    ctx: Arc<MonitorContext>,
    monitors: Arc<MonitorSet>,
    poll_interval: Duration,
    change_hints: bool,
    spawn_monitors: bool,
    /// Ids whose label lookup already produced a warning.
    label_warned: Mutex<HashSet<String>>,
}

impl DiscoveryLoop {
    pub fn new(
        ctx: Arc<MonitorContext>,
        monitors: Arc<MonitorSet>,
        poll_interval: Duration,
        change_hints: bool,
    ) -> Self {
        Self {
            ctx,
            monitors,
            poll_interval,
            change_hints,
            spawn_monitors: true,
            label_warned: Mutex::new(HashSet::new()),
        }
    }

    /// Reconcile without starting monitor threads. New records stay
    /// `Discovered` until something polls them.
    pub fn without_monitors(mut self) -> Self {
        self.spawn_monitors = false;
        self
    }

    /// Query the host and reconcile once.
    pub fn run_cycle(&self) -> ReconcileReport {
        self.reconcile(self.ctx.host.removable_devices())
    }

    /// Reconcile the registry against one host listing.
    pub fn reconcile(&self, listing: Result<Vec<AttachedDevice>>) -> ReconcileReport {
        let devices = match listing {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Discovery: device listing failed, keeping current state: {}", e);
                return ReconcileReport {
                    listing_failed: true,
                    ..ReconcileReport::default()
                };
            }
        };

        let mut report = ReconcileReport::default();
        let present: HashSet<&str> = devices.iter().map(|d| d.id.as_str()).collect();

        for id in self.ctx.registry.ids() {
            if !present.contains(id.as_str()) {
                self.detach(&id);
                report.detached.push(id);
            }
        }

        for device in devices {
            if self.ctx.registry.contains(&device.id) {
                continue;
            }
            let id = device.id.clone();
            if self.attach(device) {
                report.attached.push(id);
            }
        }

        if !report.is_empty() {
            debug!(
                "Discovery: +{} -{} ({} tracked)",
                report.attached.len(),
                report.detached.len(),
                self.ctx.registry.len()
            );
        }
        report
    }

    fn attach(&self, device: AttachedDevice) -> bool {
        let label = self.resolve_label(&device);
        let id = device.id.clone();
        if !self
            .ctx
            .registry
            .insert(DeviceRecord::discovered(device.clone(), label.clone()))
        {
            return false;
        }

        info!("Discovery: {} attached at {:?}", label, device.root);
        self.ctx
            .bus
            .emit(DeviceEvent::device(&id, &label, EventKind::Discovered));

        if self.spawn_monitors {
            let monitor = DeviceMonitor::new(device, Arc::clone(&self.ctx));
            match monitor.spawn(self.poll_interval, self.change_hints) {
                Ok(handle) => self.monitors.insert(handle),
                Err(e) => warn!("Discovery: no monitor for {}: {}", id, e),
            }
        }
        true
    }

    fn detach(&self, id: &str) {
        let label = self
            .ctx
            .registry
            .label(id)
            .unwrap_or_else(|| UNKNOWN_LABEL.to_owned());
        self.ctx.registry.apply(id, LifecycleInput::Removed);
        self.monitors.stop(id);
        self.label_warned.lock().remove(id);

        // A concurrent quarantine may have removed it first.
        if self.ctx.registry.remove(id).is_some() {
            info!("Discovery: {} ({}) disconnected", label, id);
            self.ctx
                .bus
                .emit(DeviceEvent::device(id, &label, EventKind::Disconnected));
        }
    }

    fn resolve_label(&self, device: &AttachedDevice) -> String {
        match self.ctx.host.volume_label(device) {
            Ok(label) => label,
            Err(e) => {
                if self.label_warned.lock().insert(device.id.clone()) {
                    warn!("Discovery: {}", e);
                }
                UNKNOWN_LABEL.to_owned()
            }
        }
    }

    /// Run the loop on its own thread. The first cycle runs immediately.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> Result<DiscoveryHandle> {
        let cancel = Arc::new(AtomicBool::new(false));
        let (wake_tx, wake_rx) = bounded::<()>(1);
        let cancel_clone = Arc::clone(&cancel);

        let thread = std::thread::Builder::new()
            .name("usbsleuth-discovery".to_owned())
            .spawn(move || {
                debug!("Discovery: started, interval {:?}", interval);
                while !cancel_clone.load(Ordering::Relaxed) {
                    self.run_cycle();
                    if cancel_clone.load(Ordering::Relaxed) {
                        break;
                    }
                    match wake_rx.recv_timeout(interval) {
                        Ok(()) | Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Discovery: stopped");
            })
            .map_err(|source| SentryError::ThreadSpawn {
                component: "discovery loop",
                source,
            })?;

        Ok(DiscoveryHandle {
            cancel,
            wake: wake_tx,
            thread: Some(thread),
        })
    }
}

/// Handle to the running discovery thread. Dropping it stops the loop.
pub struct DiscoveryHandle {
    cancel: Arc<AtomicBool>,
    wake: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl DiscoveryHandle {
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
        let _ = self.wake.try_send(());
    }

    /// Stop and wait for the current cycle to finish.
    pub fn join(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for DiscoveryHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Classifier;
    use crate::events::{EventBus, MemorySink};
    use crate::lifecycle::DeviceStatus;
    use crate::platform::{HostAdapter, MemoryHost};
    use crate::registry::{Registry, SharedRegistry};

    fn setup() -> (Arc<MemoryHost>, SharedRegistry, Arc<MemorySink>, DiscoveryLoop) {
        let host = Arc::new(MemoryHost::new());
        let registry = Registry::shared();
        let bus = EventBus::shared();
        let sink = Arc::new(MemorySink::new());
        bus.add_sink(sink.clone());
        let ctx = Arc::new(MonitorContext {
            host: host.clone(),
            registry: registry.clone(),
            bus,
            classifier: Arc::new(Classifier::default()),
            snapshot_threads: 1,
        });
        let discovery = DiscoveryLoop::new(
            ctx,
            Arc::new(MonitorSet::new()),
            Duration::from_secs(30),
            false,
        )
        .without_monitors();
        (host, registry, sink, discovery)
    }

    #[test]
    fn new_device_is_registered_once() {
        let (host, registry, sink, discovery) = setup();
        host.attach("E:\\", Some("KINGSTON"), &[]);

        let report = discovery.run_cycle();
        assert_eq!(report.attached, vec!["E:\\".to_owned()]);
        assert_eq!(registry.status("E:\\"), Some(DeviceStatus::Discovered));
        assert_eq!(registry.label("E:\\").as_deref(), Some("KINGSTON"));

        // A second cycle with the same listing changes nothing.
        assert!(discovery.run_cycle().is_empty());
        assert_eq!(sink.of_kind(EventKind::Discovered).len(), 1);
    }

    #[test]
    fn unreadable_label_falls_back_to_unknown() {
        let (host, registry, sink, discovery) = setup();
        host.attach("F:\\", None, &[]);
        discovery.run_cycle();
        assert_eq!(registry.label("F:\\").as_deref(), Some(UNKNOWN_LABEL));
        assert_eq!(sink.events()[0].label, UNKNOWN_LABEL);
    }

    #[test]
    fn missing_device_is_disconnected_and_removed() {
        let (host, registry, sink, discovery) = setup();
        host.attach("E:\\", Some("STICK"), &[]);
        discovery.run_cycle();
        registry.apply("E:\\", LifecycleInput::SuspiciousFound);

        host.detach("E:\\");
        let report = discovery.run_cycle();
        assert_eq!(report.detached, vec!["E:\\".to_owned()]);
        assert!(registry.is_empty());
        assert!(!registry.is_flagged("E:\\"));

        let gone = sink.of_kind(EventKind::Disconnected);
        assert_eq!(gone.len(), 1);
        assert_eq!(gone[0].label, "STICK");
    }

    #[test]
    fn listing_failure_is_not_mass_disconnection() {
        let (host, registry, sink, discovery) = setup();
        host.attach("E:\\", Some("A"), &[]);
        host.attach("F:\\", Some("B"), &[]);
        discovery.run_cycle();

        host.set_listing_failure(true);
        let report = discovery.run_cycle();
        assert!(report.listing_failed);
        assert!(report.is_empty());
        assert_eq!(registry.len(), 2);
        assert!(sink.of_kind(EventKind::Disconnected).is_empty());
    }

    #[test]
    fn reconcile_accepts_explicit_listing() {
        let (host, registry, _sink, discovery) = setup();
        host.attach("G:\\", Some("CARD"), &[]);
        let listing = host.removable_devices();
        let report = discovery.reconcile(listing);
        assert_eq!(report.attached.len(), 1);

        let report = discovery.reconcile(Ok(Vec::new()));
        assert_eq!(report.detached, vec!["G:\\".to_owned()]);
        assert!(registry.is_empty());
    }

    #[test]
    fn reattached_device_starts_fresh() {
        let (host, registry, sink, discovery) = setup();
        host.attach("E:\\", Some("STICK"), &[]);
        discovery.run_cycle();
        registry.apply("E:\\", LifecycleInput::SuspiciousFound);
        host.detach("E:\\");
        discovery.run_cycle();

        host.attach("E:\\", Some("STICK"), &[]);
        discovery.run_cycle();
        assert_eq!(registry.status("E:\\"), Some(DeviceStatus::Discovered));
        assert!(!registry.is_flagged("E:\\"));
        assert_eq!(sink.of_kind(EventKind::Discovered).len(), 2);
    }

    #[test]
    fn spawned_loop_discovers_and_stops() {
        let (host, registry, _sink, discovery) = setup();
        host.attach("E:\\", Some("STICK"), &[]);
        let handle = Arc::new(discovery)
            .spawn(Duration::from_millis(10))
            .unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while !registry.contains("E:\\") {
            assert!(std::time::Instant::now() < deadline, "device never discovered");
            std::thread::sleep(Duration::from_millis(5));
        }
        handle.join();
    }
}
