/// Device monitor - one polling thread per attached device.
///
/// Each cycle takes a full snapshot of the device root, diffs it against
/// the registry's stored snapshot, classifies every added path, and feeds
/// the result through the lifecycle state machine before emitting events.
///
/// # Usage
///
/// ```ignore
/// let handle = DeviceMonitor::new(device, ctx).spawn(interval, true)?;
/// // events arrive on the bus
/// handle.stop();
/// ```
///
/// # Cancellation
///
/// [`MonitorHandle::stop`] sets the cancel flag and wakes the inter-cycle
/// wait. A cycle already enumerating runs to completion; the flag is
/// checked once per cycle, never mid-walk.
#[cfg(windows)]
pub mod watch;

use crate::analysis::{Classification, Classifier};
use crate::error::{Result, SentryError};
use crate::events::SharedBus;
use crate::lifecycle::{LifecycleInput, Transition};
use crate::model::{AttachedDevice, DeviceEvent, EventKind};
use crate::platform::SharedHost;
use crate::registry::SharedRegistry;
use compact_str::CompactString;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything a monitor needs besides its own device. Shared by all monitors.
pub struct MonitorContext {
    pub host: SharedHost,
    pub registry: SharedRegistry,
    pub bus: SharedBus,
    pub classifier: Arc<Classifier>,
    pub snapshot_threads: usize,
}

/// Why a poll cycle did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The record left the registry (disconnected or quarantined), or was
    /// replaced by a re-attached device before the poll finished.
    NotRegistered,
    /// The device root could not be enumerated this cycle.
    ReadFailed,
}

/// What one successful cycle found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSummary {
    /// First successful poll after attach.
    pub baseline: bool,
    pub files: usize,
    pub added: usize,
    pub removed: usize,
    /// Suspicious paths among `added`, sorted.
    pub suspicious: Vec<CompactString>,
    pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Skipped(SkipReason),
    Completed(PollSummary),
}

pub struct DeviceMonitor {
    device: AttachedDevice,
    ctx: Arc<MonitorContext>,
}

impl DeviceMonitor {
    pub fn new(device: AttachedDevice, ctx: Arc<MonitorContext>) -> Self {
        Self { device, ctx }
    }

    pub fn device(&self) -> &AttachedDevice {
        &self.device
    }

    /// Mark the record as under analysis (`Discovered → Analyzing`).
    pub fn begin(&self) {
        self.ctx
            .registry
            .apply(&self.device.id, LifecycleInput::AnalysisStarted);
    }

    /// Run one snapshot → diff → classify → transition → emit cycle.
    pub fn poll_once(&self) -> PollOutcome {
        let ctx = &self.ctx;
        let id = self.device.id.as_str();

        let Some(record) = ctx.registry.get(id) else {
            return PollOutcome::Skipped(SkipReason::NotRegistered);
        };

        let current = match ctx.host.list_files(&self.device, ctx.snapshot_threads) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("Monitor: skipping poll of {}: {}", id, err);
                return PollOutcome::Skipped(SkipReason::ReadFailed);
            }
        };

        let diff = record.snapshot.diff(&current);
        let baseline = record.awaiting_baseline();
        let label = record.label.as_str();
        let files = current.len();

        // Pre-existing benign files are not announced on the baseline poll.
        let mut suspicious = Vec::new();
        let mut created = Vec::with_capacity(if baseline { 0 } else { diff.added.len() });
        for path in &diff.added {
            let class = ctx.classifier.classify(path);
            if class == Classification::Suspicious {
                suspicious.push(path.clone());
            }
            if !baseline || class == Classification::Suspicious {
                created.push(DeviceEvent::created(id, label, path, class));
            }
        }

        let Some(transition) = ctx.registry.complete_poll(
            id,
            record.generation,
            current,
            !suspicious.is_empty(),
        ) else {
            debug!("Monitor: {} was detached during the walk, discarding poll", id);
            return PollOutcome::Skipped(SkipReason::NotRegistered);
        };

        for event in created {
            ctx.bus.emit(event);
        }
        if transition.entered_flagged() {
            info!(
                "Monitor: {} ({}) flagged, {} suspicious file(s)",
                label,
                id,
                suspicious.len()
            );
            ctx.bus.emit(DeviceEvent::device(id, label, EventKind::Flagged));
        }
        for path in &diff.removed {
            ctx.bus.emit(DeviceEvent::deleted(id, label, path));
        }
        if transition.entered_safe() {
            info!("Monitor: {} ({}) is safe to use", label, id);
            ctx.bus.emit(DeviceEvent::device(id, label, EventKind::Safe));
        }

        debug!(
            "Monitor: polled {}: {} files, +{} -{}, status {}",
            id,
            files,
            diff.added.len(),
            diff.removed.len(),
            transition.to.label()
        );

        PollOutcome::Completed(PollSummary {
            baseline,
            files,
            added: diff.added.len(),
            removed: diff.removed.len(),
            suspicious,
            transition,
        })
    }

    /// Start the polling thread. The first cycle runs immediately.
    pub fn spawn(self, interval: Duration, change_hints: bool) -> Result<MonitorHandle> {
        let cancel = Arc::new(AtomicBool::new(false));
        // Capacity 1: pending wake-ups coalesce into a single early poll.
        let (wake_tx, wake_rx) = bounded::<()>(1);
        let device_id = self.device.id.clone();

        #[cfg(windows)]
        if change_hints && self.ctx.host.supports_change_hints() {
            watch::spawn_watcher(self.device.root.clone(), cancel.clone(), wake_tx.clone());
        }
        #[cfg(not(windows))]
        let _ = change_hints;

        let cancel_clone = Arc::clone(&cancel);
        let thread = std::thread::Builder::new()
            .name(format!("usbsleuth-monitor-{device_id}"))
            .spawn(move || self.run(interval, cancel_clone, wake_rx))
            .map_err(|source| SentryError::ThreadSpawn {
                component: "device monitor",
                source,
            })?;

        Ok(MonitorHandle {
            device_id,
            cancel,
            wake: wake_tx,
            thread: Some(thread),
        })
    }

    fn run(self, interval: Duration, cancel: Arc<AtomicBool>, wake: Receiver<()>) {
        debug!("Monitor: starting on {:?}", self.device.root);
        self.begin();
        loop {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            self.poll_once();
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            match wake.recv_timeout(interval) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("Monitor: stopped for {:?}", self.device.root);
    }
}

/// Handle to a running device monitor. Dropping it stops the monitor.
pub struct MonitorHandle {
    device_id: String,
    cancel: Arc<AtomicBool>,
    wake: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Signal the monitor to stop after its current cycle. Non-blocking.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
        let _ = self.wake.try_send(());
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Ask for an early poll. Coalesces with any pending request.
    pub fn wake(&self) {
        let _ = self.wake.try_send(());
    }

    /// Stop and wait for the thread to exit.
    pub fn join(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Running monitors keyed by device id, shared by discovery and quarantine.
#[derive(Default)]
pub struct MonitorSet {
    handles: Mutex<HashMap<String, MonitorHandle>>,
}

impl MonitorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a running monitor, stopping any previous one for the same id.
    pub fn insert(&self, handle: MonitorHandle) {
        if let Some(old) = self
            .handles
            .lock()
            .insert(handle.device_id().to_owned(), handle)
        {
            old.stop();
        }
    }

    /// Stop and untrack the monitor for `id`, returning its handle.
    pub fn stop(&self, id: &str) -> Option<MonitorHandle> {
        let handle = self.handles.lock().remove(id)?;
        handle.stop();
        Some(handle)
    }

    /// Stop every monitor and wait for their threads.
    pub fn stop_all(&self) -> usize {
        let handles: Vec<MonitorHandle> = self.handles.lock().drain().map(|(_, h)| h).collect();
        let count = handles.len();
        for handle in &handles {
            handle.stop();
        }
        for handle in handles {
            handle.join();
        }
        count
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handles.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    /// Request an early poll on one device.
    pub fn wake(&self, id: &str) -> bool {
        match self.handles.lock().get(id) {
            Some(handle) => {
                handle.wake();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventBus, MemorySink};
    use crate::lifecycle::DeviceStatus;
    use crate::model::DeviceRecord;
    use crate::platform::MemoryHost;
    use crate::registry::Registry;

    struct Fixture {
        host: Arc<MemoryHost>,
        registry: SharedRegistry,
        sink: Arc<MemorySink>,
        monitor: DeviceMonitor,
    }

    fn fixture(files: &[&str]) -> Fixture {
        let host = Arc::new(MemoryHost::new());
        host.attach("D1", Some("STICK"), files);
        let registry = Registry::shared();
        let bus = EventBus::shared();
        let sink = Arc::new(MemorySink::new());
        bus.add_sink(sink.clone());

        let device = AttachedDevice::new("D1", "D1");
        registry.insert(DeviceRecord::discovered(device.clone(), "STICK".into()));
        let ctx = Arc::new(MonitorContext {
            host: host.clone(),
            registry: registry.clone(),
            bus,
            classifier: Arc::new(Classifier::default()),
            snapshot_threads: 1,
        });
        let monitor = DeviceMonitor::new(device, ctx);
        monitor.begin();
        Fixture {
            host,
            registry,
            sink,
            monitor,
        }
    }

    fn completed(outcome: PollOutcome) -> PollSummary {
        match outcome {
            PollOutcome::Completed(summary) => summary,
            other => panic!("expected a completed poll, got {other:?}"),
        }
    }

    #[test]
    fn begin_moves_to_analyzing() {
        let f = fixture(&[]);
        assert_eq!(f.registry.status("D1"), Some(DeviceStatus::Analyzing));
    }

    #[test]
    fn clean_baseline_is_safe_and_quiet() {
        let f = fixture(&["a.txt", "docs/b.pdf"]);
        let summary = completed(f.monitor.poll_once());
        assert!(summary.baseline);
        assert_eq!(summary.files, 2);
        assert_eq!(f.registry.status("D1"), Some(DeviceStatus::Safe));

        // No Created events for pre-existing benign files; one Safe event.
        assert!(f.sink.of_kind(EventKind::Created).is_empty());
        assert_eq!(f.sink.of_kind(EventKind::Safe).len(), 1);
    }

    #[test]
    fn suspicious_file_on_baseline_flags_immediately() {
        let f = fixture(&["a.txt", "autorun.BAT"]);
        let summary = completed(f.monitor.poll_once());
        assert_eq!(summary.suspicious, vec!["autorun.BAT"]);
        assert_eq!(f.registry.status("D1"), Some(DeviceStatus::Flagged));

        let created = f.sink.of_kind(EventKind::Created);
        assert_eq!(created.len(), 1);
        assert!(created[0].is_suspicious());
        assert_eq!(f.sink.of_kind(EventKind::Flagged).len(), 1);
        assert!(f.sink.of_kind(EventKind::Safe).is_empty());
    }

    #[test]
    fn unchanged_device_stays_safe() {
        let f = fixture(&["a.txt"]);
        for _ in 0..5 {
            completed(f.monitor.poll_once());
            assert_eq!(f.registry.status("D1"), Some(DeviceStatus::Safe));
        }
        assert_eq!(f.sink.of_kind(EventKind::Safe).len(), 1);
        assert_eq!(f.sink.events().len(), 1);
    }

    #[test]
    fn benign_additions_after_baseline_emit_created() {
        let f = fixture(&["a.txt"]);
        f.monitor.poll_once();
        f.host.add_file("D1", "b.txt");
        let summary = completed(f.monitor.poll_once());
        assert_eq!(summary.added, 1);

        let created = f.sink.of_kind(EventKind::Created);
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].path.as_deref(), Some("b.txt"));
        assert_eq!(created[0].classification, Some(Classification::Benign));
        assert_eq!(f.registry.status("D1"), Some(DeviceStatus::Safe));
    }

    #[test]
    fn second_suspicious_file_does_not_duplicate_flag() {
        let f = fixture(&["a.txt"]);
        f.monitor.poll_once();
        f.host.add_file("D1", "one.exe");
        f.monitor.poll_once();
        f.host.add_file("D1", "two.js");
        let summary = completed(f.monitor.poll_once());
        assert!(!summary.transition.changed());

        assert_eq!(f.sink.of_kind(EventKind::Flagged).len(), 1);
        let suspicious: Vec<_> = f
            .sink
            .of_kind(EventKind::Created)
            .into_iter()
            .filter(DeviceEvent::is_suspicious)
            .collect();
        assert_eq!(suspicious.len(), 2);
        assert_eq!(f.registry.flagged(), vec!["D1".to_owned()]);
    }

    #[test]
    fn read_failure_keeps_snapshot_and_status() {
        let f = fixture(&["a.txt"]);
        f.monitor.poll_once();
        let before = f.registry.get("D1").unwrap();

        f.host.set_read_failure("D1", true);
        f.host.add_file("D1", "virus.exe");
        assert_eq!(
            f.monitor.poll_once(),
            PollOutcome::Skipped(SkipReason::ReadFailed)
        );
        let after = f.registry.get("D1").unwrap();
        assert_eq!(after.snapshot, before.snapshot);
        assert_eq!(after.status, DeviceStatus::Safe);
        assert_eq!(after.last_polled_at, before.last_polled_at);

        // Next readable cycle picks the change up.
        f.host.set_read_failure("D1", false);
        completed(f.monitor.poll_once());
        assert_eq!(f.registry.status("D1"), Some(DeviceStatus::Flagged));
    }

    #[test]
    fn failed_baseline_stays_analyzing() {
        let f = fixture(&["a.txt"]);
        f.host.set_read_failure("D1", true);
        assert_eq!(
            f.monitor.poll_once(),
            PollOutcome::Skipped(SkipReason::ReadFailed)
        );
        assert_eq!(f.registry.status("D1"), Some(DeviceStatus::Analyzing));
        assert!(f.registry.get("D1").unwrap().awaiting_baseline());
    }

    #[test]
    fn unregistered_device_is_skipped() {
        let f = fixture(&["a.txt"]);
        f.registry.remove("D1");
        assert_eq!(
            f.monitor.poll_once(),
            PollOutcome::Skipped(SkipReason::NotRegistered)
        );
        assert!(f.sink.events().is_empty());
    }

    #[test]
    fn label_falls_through_to_events() {
        let f = fixture(&["x.exe"]);
        f.monitor.poll_once();
        assert!(f.sink.events().iter().all(|e| e.label == "STICK"));
    }

    #[test]
    fn spawned_monitor_polls_immediately_and_stops() {
        let f = fixture(&["a.txt"]);
        let registry = f.registry.clone();
        let handle = f.monitor.spawn(Duration::from_secs(3600), false).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while registry.status("D1") != Some(DeviceStatus::Safe) {
            assert!(std::time::Instant::now() < deadline, "first poll never ran");
            std::thread::sleep(Duration::from_millis(5));
        }

        // Stop wakes the hour-long wait, so join returns promptly.
        handle.join();
    }

    #[test]
    fn wake_triggers_an_early_poll() {
        let f = fixture(&["a.txt"]);
        let (host, sink) = (f.host.clone(), f.sink.clone());
        let set = MonitorSet::new();
        set.insert(f.monitor.spawn(Duration::from_secs(3600), false).unwrap());

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while sink.of_kind(EventKind::Safe).is_empty() {
            assert!(std::time::Instant::now() < deadline, "first poll never ran");
            std::thread::sleep(Duration::from_millis(5));
        }

        host.add_file("D1", "late.exe");
        assert!(set.wake("D1"));
        while sink.of_kind(EventKind::Flagged).is_empty() {
            assert!(std::time::Instant::now() < deadline, "wake did not trigger a poll");
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(set.stop_all(), 1);
        assert!(set.is_empty());
    }
}
