/// Sentry - owns and wires the detection pipeline.
///
/// The frontend talks only to this type: start and stop analysis, subscribe
/// to events, read the registry, and trigger quarantine or a full scan.
///
/// Ejecting and full scans can block for seconds. [`Sentry::actions`] hands
/// out a [`SentryActions`] that can be moved onto a worker thread so the
/// caller's thread stays responsive.
use crate::config::SentryConfig;
use crate::discovery::{DiscoveryHandle, DiscoveryLoop, ReconcileReport};
use crate::error::{Result, SentryError};
use crate::events::{EventBus, LogFileSink, SharedBus};
use crate::model::DeviceEvent;
use crate::monitor::{MonitorContext, MonitorSet};
use crate::platform::{self, SharedHost};
use crate::quarantine::{PurgeOutcome, QuarantineController, QuarantineOutcome};
use crate::registry::{Registry, SharedRegistry};
use crate::scanner::{self, FullScanReport};
use crossbeam_channel::Receiver;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Sentry {
    config: SentryConfig,
    ctx: Arc<MonitorContext>,
    monitors: Arc<MonitorSet>,
    discovery: Arc<DiscoveryLoop>,
    actions: SentryActions,
    running: Option<DiscoveryHandle>,
    log_path: Option<PathBuf>,
}

impl Sentry {
    /// Build against the host this binary was compiled for.
    pub fn new(config: SentryConfig) -> Result<Self> {
        Self::with_host(config, platform::native_host())
    }

    /// Build against an explicit host adapter.
    ///
    /// An unwritable event log is reported and skipped; detection still runs.
    pub fn with_host(config: SentryConfig, host: SharedHost) -> Result<Self> {
        config.validate()?;
        let classifier = Arc::new(config.classifier()?);

        let bus = EventBus::shared();
        let log_path = match LogFileSink::open(&config.log_path) {
            Ok(sink) => {
                bus.add_sink(Arc::new(sink));
                Some(config.log_path.clone())
            }
            Err(e) => {
                warn!("Sentry: event log disabled: {}", e);
                None
            }
        };

        let ctx = Arc::new(MonitorContext {
            host,
            registry: Registry::shared(),
            bus,
            classifier,
            snapshot_threads: config.snapshot_threads,
        });
        let monitors = Arc::new(MonitorSet::new());
        let discovery = Arc::new(DiscoveryLoop::new(
            Arc::clone(&ctx),
            Arc::clone(&monitors),
            config.poll_interval(),
            config.change_hints,
        ));
        let actions = SentryActions {
            ctx: Arc::clone(&ctx),
            quarantine: QuarantineController::new(Arc::clone(&ctx), Arc::clone(&monitors)),
            scan_threads: config.snapshot_threads,
        };

        Ok(Self {
            config,
            ctx,
            monitors,
            discovery,
            actions,
            running: None,
            log_path,
        })
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Start the discovery loop. A no-op when already running.
    pub fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Ok(());
        }
        let handle = Arc::clone(&self.discovery).spawn(self.config.discovery_interval())?;
        info!(
            "Sentry: analysis started ({} blacklisted extensions)",
            self.ctx.classifier.blacklist().len()
        );
        self.running = Some(handle);
        Ok(())
    }

    /// Stop discovery and every monitor, then forget all devices.
    /// No events are emitted for the cleared records.
    pub fn stop(&mut self) {
        let was_running = match self.running.take() {
            Some(handle) => {
                handle.join();
                true
            }
            None => false,
        };
        let stopped = self.monitors.stop_all();
        let cleared = self.ctx.registry.clear();
        if was_running || stopped > 0 || !cleared.is_empty() {
            info!(
                "Sentry: analysis stopped ({} monitors, {} devices cleared)",
                stopped,
                cleared.len()
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Run one discovery cycle on the calling thread.
    pub fn discover_now(&self) -> ReconcileReport {
        self.discovery.run_cycle()
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn subscribe(&self) -> Receiver<DeviceEvent> {
        self.ctx.bus.subscribe()
    }

    pub fn bus(&self) -> &SharedBus {
        &self.ctx.bus
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.ctx.registry
    }

    pub fn config(&self) -> &SentryConfig {
        &self.config
    }

    /// The persistent event log, if it could be opened.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn monitor_count(&self) -> usize {
        self.monitors.len()
    }

    // ── Operator actions ───────────────────────────────────────────

    /// A cloneable handle for the operator actions below.
    pub fn actions(&self) -> SentryActions {
        self.actions.clone()
    }

    pub fn quarantine(&self, id: &str) -> Result<QuarantineOutcome> {
        self.actions.quarantine(id)
    }

    pub fn quarantine_all(&self) -> Vec<(String, Result<QuarantineOutcome>)> {
        self.actions.quarantine_all()
    }

    pub fn purge_files(&self, id: &str, paths: &[String]) -> Result<Vec<PurgeOutcome>> {
        self.actions.purge_files(id, paths)
    }

    pub fn full_scan(&self, id: &str) -> Result<FullScanReport> {
        self.actions.full_scan(id)
    }
}

/// Operator actions detached from the [`Sentry`] that created them.
///
/// Stays valid after the sentry is stopped; actions against devices that
/// are no longer registered fail with `DeviceGone` or `NotFlagged`.
#[derive(Clone)]
pub struct SentryActions {
    ctx: Arc<MonitorContext>,
    quarantine: QuarantineController,
    scan_threads: usize,
}

impl SentryActions {
    /// Eject one flagged device.
    pub fn quarantine(&self, id: &str) -> Result<QuarantineOutcome> {
        self.quarantine.quarantine(id)
    }

    pub fn quarantine_all(&self) -> Vec<(String, Result<QuarantineOutcome>)> {
        self.quarantine.quarantine_all()
    }

    pub fn purge_files(&self, id: &str, paths: &[String]) -> Result<Vec<PurgeOutcome>> {
        self.quarantine.purge_files(id, paths)
    }

    /// Classify every file on one attached device in parallel.
    pub fn full_scan(&self, id: &str) -> Result<FullScanReport> {
        let record = self
            .ctx
            .registry
            .get(id)
            .ok_or_else(|| SentryError::DeviceGone { id: id.to_owned() })?;
        scanner::scan_drive(&record.device.root, &self.ctx.classifier, self.scan_threads)
    }
}

impl Drop for Sentry {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::DeviceStatus;
    use crate::model::EventKind;
    use crate::platform::MemoryHost;
    use std::time::{Duration, Instant};

    fn config(dir: &Path) -> SentryConfig {
        SentryConfig {
            discovery_interval_ms: 10,
            poll_interval_ms: 10,
            change_hints: false,
            log_path: dir.join("usb_monitor.log"),
            ..SentryConfig::default()
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = SentryConfig {
            poll_interval_ms: 0,
            ..config(dir.path())
        };
        let err = Sentry::with_host(cfg, Arc::new(MemoryHost::new()))
            .err()
            .unwrap();
        assert!(matches!(err, SentryError::InvalidConfig { .. }));
    }

    #[test]
    fn start_stop_clears_registry() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(MemoryHost::new());
        host.attach("E:\\", Some("STICK"), &["a.txt"]);
        let mut sentry = Sentry::with_host(config(dir.path()), host).unwrap();
        let rx = sentry.subscribe();

        sentry.start().unwrap();
        assert!(sentry.is_running());

        let deadline = Instant::now() + Duration::from_secs(10);
        while sentry.registry().status("E:\\") != Some(DeviceStatus::Safe) {
            assert!(Instant::now() < deadline, "device never reached Safe");
            std::thread::sleep(Duration::from_millis(5));
        }

        sentry.stop();
        assert!(!sentry.is_running());
        assert!(sentry.registry().is_empty());
        assert_eq!(sentry.monitor_count(), 0);

        let kinds: Vec<EventKind> = rx.try_iter().map(|e| e.kind).collect();
        assert_eq!(kinds.first(), Some(&EventKind::Discovered));
        assert!(kinds.contains(&EventKind::Safe));
        assert!(!kinds.contains(&EventKind::Disconnected));
    }

    #[test]
    fn events_reach_the_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(MemoryHost::new());
        host.attach("E:\\", Some("STICK"), &[]);
        let sentry = Sentry::with_host(config(dir.path()), host).unwrap();
        sentry.discover_now();

        let text = crate::events::read_log(sentry.log_path().unwrap()).unwrap();
        assert!(text.contains("Discovered - Device: STICK (E:\\)"));
    }

    #[test]
    fn full_scan_of_unknown_device_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sentry = Sentry::with_host(config(dir.path()), Arc::new(MemoryHost::new())).unwrap();
        assert!(matches!(
            sentry.full_scan("Z:\\"),
            Err(SentryError::DeviceGone { .. })
        ));
    }

    #[test]
    fn actions_run_on_another_thread() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(MemoryHost::new());
        host.attach("E:\\", Some("STICK"), &["virus.exe"]);
        let sentry = Sentry::with_host(config(dir.path()), host.clone()).unwrap();
        let rx = sentry.subscribe();
        sentry.discover_now();
        sentry
            .registry()
            .apply("E:\\", crate::lifecycle::LifecycleInput::SuspiciousFound);

        let actions = sentry.actions();
        let outcome = std::thread::spawn(move || actions.quarantine("E:\\"))
            .join()
            .unwrap()
            .unwrap();

        assert!(matches!(outcome, QuarantineOutcome::Ejected { .. }));
        assert_eq!(host.ejected(), vec!["E:\\".to_owned()]);
        assert!(sentry.registry().is_empty());
        let kinds: Vec<EventKind> = rx.try_iter().map(|e| e.kind).collect();
        assert_eq!(kinds.last(), Some(&EventKind::Disconnected));
    }
}
