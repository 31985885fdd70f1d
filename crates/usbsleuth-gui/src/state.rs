/// Application state management.
///
/// Centralises all mutable state that the UI reads and writes. The core
/// [`Sentry`] runs discovery and device monitors on its own threads and
/// publishes [`DeviceEvent`]s on a channel; `process_events()` drains it
/// once per frame.
///
/// Nothing here draws. Every operator action is a plain method so the
/// whole state machine can be driven from tests without a window.
///
/// Quarantine and full scans run on a named worker thread; their results
/// come back on a second channel that `process_events()` also drains.
use anyhow::Context;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::{Path, PathBuf};
use usbsleuth_core::config::SentryConfig;
use usbsleuth_core::events;
use usbsleuth_core::export;
use usbsleuth_core::model::{DeviceEvent, DeviceRecord, EventKind};
use usbsleuth_core::platform::{self, SharedHost, SystemInfo};
use usbsleuth_core::quarantine::QuarantineOutcome;
use usbsleuth_core::registry::SharedRegistry;
use usbsleuth_core::scanner::FullScanReport;
use usbsleuth_core::sentry::{Sentry, SentryActions};

/// Whether analysis is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppPhase {
    /// Not watching for devices.
    Idle,
    /// Discovery and device monitors are running.
    Monitoring,
}

/// Severity of an operator-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// One line of feedback shown in the status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

/// Result of an operator action that ran off the UI thread.
#[derive(Debug)]
enum ActionOutcome {
    Quarantine {
        id: String,
        result: usbsleuth_core::Result<QuarantineOutcome>,
    },
    QuarantineAll(Vec<(String, usbsleuth_core::Result<QuarantineOutcome>)>),
    FullScan {
        id: String,
        result: usbsleuth_core::Result<FullScanReport>,
    },
}

/// Maximum events drained from the channel per frame.
///
/// Keeps a burst (a stick with thousands of files appearing at once) from
/// stalling the render thread.
pub const MAX_EVENTS_PER_FRAME: usize = 300;

/// Maximum events kept for display. Oldest are dropped first.
pub const MAX_EVENT_HISTORY: usize = 20_000;

/// All application state.
pub struct AppState {
    // ── Engine ─────────────────────────────────────────
    sentry: Sentry,
    events_rx: Receiver<DeviceEvent>,
    action_tx: Sender<ActionOutcome>,
    action_rx: Receiver<ActionOutcome>,
    /// Description of the action running in the background, if any.
    busy: Option<String>,
    pub phase: AppPhase,

    // ── Output ─────────────────────────────────────────
    /// Events received since the last clear, oldest first.
    pub events: Vec<DeviceEvent>,
    /// Host identity banner shown at the top of the output.
    pub system_info: SystemInfo,
    /// Most recent full-scan result, keyed by device id.
    pub last_scan: Option<(String, FullScanReport)>,
    pub notice: Option<Notice>,

    // ── UI state ───────────────────────────────────────
    pub selected_device: Option<String>,
    pub show_about: bool,
    /// Contents of the persistent log while the log window is open.
    pub log_view: Option<String>,
    /// Only show Suspicious / Flagged rows in the event table.
    pub suspicious_only: bool,
    /// `true` = dark mode (default), `false` = light mode.
    pub dark_mode: bool,
}

impl AppState {
    /// State backed by this platform's removable-device adapter.
    pub fn new(config: SentryConfig) -> anyhow::Result<Self> {
        Self::with_host(config, platform::native_host())
    }

    /// State backed by an explicit host adapter.
    pub fn with_host(config: SentryConfig, host: SharedHost) -> anyhow::Result<Self> {
        let sentry = Sentry::with_host(config, host).context("failed to initialise monitor")?;
        let events_rx = sentry.subscribe();
        let (action_tx, action_rx) = unbounded();
        Ok(Self {
            sentry,
            events_rx,
            action_tx,
            action_rx,
            busy: None,
            phase: AppPhase::Idle,
            events: Vec::new(),
            system_info: SystemInfo::collect(),
            last_scan: None,
            notice: None,
            selected_device: None,
            show_about: false,
            log_view: None,
            suspicious_only: false,
            dark_mode: true,
        })
    }

    // ── Analysis ───────────────────────────────────────────────────

    /// Start watching for removable devices.
    pub fn start_analysis(&mut self) {
        if self.phase == AppPhase::Monitoring {
            return;
        }
        match self.sentry.start() {
            Ok(()) => {
                self.phase = AppPhase::Monitoring;
                self.set_notice(NoticeLevel::Info, "Analysis started");
            }
            Err(e) => self.set_notice(NoticeLevel::Error, format!("Could not start: {e}")),
        }
    }

    /// Stop all monitoring and forget attached devices.
    pub fn stop_analysis(&mut self) {
        if self.phase == AppPhase::Idle {
            return;
        }
        self.sentry.stop();
        self.phase = AppPhase::Idle;
        self.selected_device = None;
        self.set_notice(NoticeLevel::Info, "Analysis stopped");
    }

    /// Drain pending events. Called once per frame; returns `true` if the
    /// UI should repaint.
    pub fn process_events(&mut self) -> bool {
        let mut received = 0usize;
        while received < MAX_EVENTS_PER_FRAME {
            let event = match self.events_rx.try_recv() {
                Ok(e) => e,
                Err(_) => break,
            };
            received += 1;

            if event.kind == EventKind::Disconnected
                && self.selected_device.as_deref() == Some(event.device_id.as_str())
            {
                self.selected_device = None;
            }
            self.events.push(event);
        }

        if self.events.len() > MAX_EVENT_HISTORY {
            let excess = self.events.len() - MAX_EVENT_HISTORY;
            self.events.drain(..excess);
        }

        let mut finished = false;
        while let Ok(outcome) = self.action_rx.try_recv() {
            self.busy = None;
            self.apply_outcome(outcome);
            finished = true;
        }
        received > 0 || finished
    }

    /// Clear the event output and refresh the host banner.
    pub fn clear_output(&mut self) {
        self.events.clear();
        self.last_scan = None;
        self.notice = None;
        self.system_info = SystemInfo::collect();
    }

    // ── Devices ────────────────────────────────────────────────────

    pub fn registry(&self) -> &SharedRegistry {
        self.sentry.registry()
    }

    /// Snapshot of the attached devices, sorted by id.
    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.sentry.registry().records()
    }

    pub fn flagged_count(&self) -> usize {
        self.sentry.registry().flagged_count()
    }

    pub fn suspicious_event_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_suspicious()).count()
    }

    /// Suspicious paths reported for `id` and not deleted since, sorted.
    pub fn suspicious_paths(&self, id: &str) -> Vec<String> {
        let mut live = std::collections::BTreeSet::new();
        for event in self.events.iter().filter(|e| e.device_id == id) {
            let Some(path) = &event.path else { continue };
            match event.kind {
                EventKind::Created if event.is_suspicious() => {
                    live.insert(path.clone());
                }
                EventKind::Deleted => {
                    live.remove(path);
                }
                _ => {}
            }
        }
        live.into_iter().collect()
    }

    /// Events to show, honouring the suspicious-only filter.
    pub fn visible_events(&self) -> Vec<&DeviceEvent> {
        self.events
            .iter()
            .filter(|e| !self.suspicious_only || e.is_suspicious() || e.kind == EventKind::Flagged)
            .collect()
    }

    // ── Operator actions ───────────────────────────────────────────

    /// Whether a quarantine or full scan is still running.
    pub fn is_busy(&self) -> bool {
        self.busy.is_some()
    }

    /// What the running background action is doing, for the status bar.
    pub fn busy_text(&self) -> Option<&str> {
        self.busy.as_deref()
    }

    /// Eject one flagged device on a worker thread.
    pub fn quarantine(&mut self, id: &str) {
        if self.flagged_count() == 0 {
            self.set_notice(NoticeLevel::Warning, "No flagged devices to quarantine");
            return;
        }
        let id = id.to_owned();
        self.run_in_background("usbsleuth-quarantine", format!("Ejecting {id}"), move |actions| {
            let result = actions.quarantine(&id);
            ActionOutcome::Quarantine { id, result }
        });
    }

    /// Eject every flagged device on a worker thread.
    pub fn quarantine_all(&mut self) {
        if self.flagged_count() == 0 {
            self.set_notice(NoticeLevel::Warning, "No flagged devices to quarantine");
            return;
        }
        self.run_in_background(
            "usbsleuth-quarantine",
            "Ejecting flagged devices".to_owned(),
            |actions| ActionOutcome::QuarantineAll(actions.quarantine_all()),
        );
    }

    /// Classify every file on a device on a worker thread.
    pub fn full_scan(&mut self, id: &str) {
        let id = id.to_owned();
        self.run_in_background("usbsleuth-full-scan", format!("Scanning {id}"), move |actions| {
            let result = actions.full_scan(&id);
            ActionOutcome::FullScan { id, result }
        });
    }

    /// One background action at a time; a second request while one is
    /// running is refused with a warning.
    fn run_in_background<F>(&mut self, thread_name: &str, what: String, job: F)
    where
        F: FnOnce(SentryActions) -> ActionOutcome + Send + 'static,
    {
        if let Some(current) = self.busy.clone() {
            self.set_notice(
                NoticeLevel::Warning,
                format!("{current} is still running"),
            );
            return;
        }

        let actions = self.sentry.actions();
        let tx = self.action_tx.clone();
        let spawned = std::thread::Builder::new()
            .name(thread_name.to_owned())
            .spawn(move || {
                // The receiver lives as long as the state; a failed send
                // means the window already closed.
                let _ = tx.send(job(actions));
            });
        match spawned {
            Ok(_) => {
                self.set_notice(NoticeLevel::Info, format!("{what}..."));
                self.busy = Some(what);
            }
            Err(e) => self.set_notice(NoticeLevel::Error, format!("{what} failed to start: {e}")),
        }
    }

    fn apply_outcome(&mut self, outcome: ActionOutcome) {
        match outcome {
            ActionOutcome::Quarantine { id, result } => match result {
                Ok(QuarantineOutcome::NothingFlagged) => {
                    self.set_notice(NoticeLevel::Warning, "No flagged devices to quarantine")
                }
                Ok(QuarantineOutcome::Ejected { label, .. }) => {
                    self.set_notice(NoticeLevel::Info, format!("{label} ({id}) ejected"))
                }
                Err(e) => self.set_notice(NoticeLevel::Error, e.to_string()),
            },
            ActionOutcome::QuarantineAll(results) => {
                if results.is_empty() {
                    self.set_notice(NoticeLevel::Warning, "No flagged devices to quarantine");
                    return;
                }
                let failed: Vec<String> = results
                    .iter()
                    .filter_map(|(id, r)| r.as_ref().err().map(|e| format!("{id}: {e}")))
                    .collect();
                if failed.is_empty() {
                    self.set_notice(
                        NoticeLevel::Info,
                        format!("{} device(s) ejected", results.len()),
                    );
                } else {
                    self.set_notice(NoticeLevel::Error, failed.join("; "));
                }
            }
            ActionOutcome::FullScan { id, result } => match result {
                Ok(report) => {
                    let text = format!(
                        "Full scan of {id}: {} files, {} suspicious",
                        report.files_scanned,
                        report.suspicious.len()
                    );
                    let level = if report.is_clean() {
                        NoticeLevel::Info
                    } else {
                        NoticeLevel::Warning
                    };
                    self.set_notice(level, text);
                    self.last_scan = Some((id, report));
                }
                Err(e) => self.set_notice(NoticeLevel::Error, e.to_string()),
            },
        }
    }

    /// Delete every suspicious file known for `id`, one at a time.
    /// Returns how many were deleted.
    pub fn purge_suspicious(&mut self, id: &str) -> usize {
        let mut paths = self.suspicious_paths(id);
        if let Some((scanned, report)) = &self.last_scan {
            if scanned == id {
                paths.extend(report.suspicious.iter().map(|p| p.to_string()));
                paths.sort();
                paths.dedup();
            }
        }
        if paths.is_empty() {
            self.set_notice(NoticeLevel::Warning, format!("Nothing to purge on {id}"));
            return 0;
        }

        match self.sentry.purge_files(id, &paths) {
            Ok(outcomes) => {
                let deleted = outcomes.iter().filter(|o| o.is_ok()).count();
                let level = if deleted == outcomes.len() {
                    NoticeLevel::Info
                } else {
                    NoticeLevel::Error
                };
                self.set_notice(
                    level,
                    format!("Deleted {deleted} of {} file(s) from {id}", outcomes.len()),
                );
                deleted
            }
            Err(e) => {
                self.set_notice(NoticeLevel::Error, e.to_string());
                0
            }
        }
    }

    // ── Log and export ─────────────────────────────────────────────

    pub fn log_path(&self) -> Option<&Path> {
        self.sentry.log_path()
    }

    /// Load the persistent log into the log window.
    pub fn show_log(&mut self) {
        let Some(path) = self.sentry.log_path().map(Path::to_path_buf) else {
            self.set_notice(NoticeLevel::Warning, "Event log is disabled");
            return;
        };
        match events::read_log(&path) {
            Ok(text) => self.log_view = Some(text),
            Err(e) => self.set_notice(NoticeLevel::Error, e.to_string()),
        }
    }

    /// Copy the persistent log to `to`.
    pub fn save_log(&mut self, to: &Path) -> anyhow::Result<u64> {
        let from = self
            .sentry
            .log_path()
            .context("event log is disabled")?
            .to_path_buf();
        let result = events::copy_log(&from, to).map_err(anyhow::Error::from);
        self.report("Log saved to", to, &result);
        result
    }

    /// Write the event history to `path` as CSV. Returns the row count.
    pub fn export_events(&mut self, path: &Path) -> anyhow::Result<usize> {
        let result = export::export_csv(path, &self.events)
            .map(|()| self.events.len())
            .map_err(anyhow::Error::from);
        self.report("Events exported to", path, &result);
        result
    }

    fn report<T>(&mut self, what: &str, path: &Path, result: &anyhow::Result<T>) {
        match result {
            Ok(_) => self.set_notice(NoticeLevel::Info, format!("{what} {}", path.display())),
            Err(e) => self.set_notice(NoticeLevel::Error, format!("{e:#}")),
        }
    }

    fn set_notice(&mut self, level: NoticeLevel, text: impl Into<String>) {
        let text = text.into();
        match level {
            NoticeLevel::Info => tracing::info!("{}", text),
            NoticeLevel::Warning => tracing::warn!("{}", text),
            NoticeLevel::Error => tracing::error!("{}", text),
        }
        self.notice = Some(Notice { level, text });
    }
}

/// Timestamped file name in the working directory, e.g.
/// `usbsleuth-events-20240501-120000.csv`.
pub fn default_output_path(stem: &str, extension: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    PathBuf::from(format!("{stem}-{stamp}.{extension}"))
}
