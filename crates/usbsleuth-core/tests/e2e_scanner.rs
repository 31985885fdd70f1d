/// End-to-end tests against a real temporary filesystem.
///
/// The snapshotter and full scan run the real `jwalk` traversal; the last
/// test mounts a temp directory as a "device" behind a small host adapter
/// and lets a `Sentry` with real threads find a dropped executable.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use usbsleuth_core::analysis::Classifier;
use usbsleuth_core::config::SentryConfig;
use usbsleuth_core::error::{Result, SentryError};
use usbsleuth_core::lifecycle::DeviceStatus;
use usbsleuth_core::model::{AttachedDevice, EventKind};
use usbsleuth_core::platform::HostAdapter;
use usbsleuth_core::scanner::{scan_drive, take_snapshot};
use usbsleuth_core::sentry::Sentry;

// ── Helpers ──────────────────────────────────────────────────────────────────

/// ```text
/// root/
///   docs/
///     report.pdf
///     tools/
///       setup.EXE
///   music/
///     song.mp3
///   run.bat
///   notes.txt
/// ```
fn build_test_tree(root: &Path) {
    fs::create_dir_all(root.join("docs/tools")).unwrap();
    fs::create_dir_all(root.join("music")).unwrap();
    for rel in [
        "docs/report.pdf",
        "docs/tools/setup.EXE",
        "music/song.mp3",
        "run.bat",
        "notes.txt",
    ] {
        fs::write(root.join(rel), b"x").unwrap();
    }
}

/// Presents one directory as a single removable device.
struct DirHost {
    root: PathBuf,
}

impl HostAdapter for DirHost {
    fn removable_devices(&self) -> Result<Vec<AttachedDevice>> {
        Ok(vec![AttachedDevice::new("TMP", self.root.clone())])
    }

    fn volume_label(&self, _device: &AttachedDevice) -> Result<String> {
        Ok("TEMPSTICK".to_owned())
    }

    fn eject(&self, device: &AttachedDevice) -> Result<()> {
        Err(SentryError::QuarantineCommand {
            id: device.id.clone(),
            details: "temp directories cannot be ejected".into(),
        })
    }
}

// ── Snapshot ─────────────────────────────────────────────────────────────────

#[test]
fn snapshot_lists_files_with_relative_ids() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());

    let snapshot = take_snapshot(tmp.path(), 2).unwrap();
    assert_eq!(
        snapshot.sorted(),
        vec![
            "docs/report.pdf",
            "docs/tools/setup.EXE",
            "music/song.mp3",
            "notes.txt",
            "run.bat",
        ]
    );
}

#[test]
fn empty_directories_are_not_files() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("a/b/c")).unwrap();
    let snapshot = take_snapshot(tmp.path(), 1).unwrap();
    assert!(snapshot.is_empty());
}

#[test]
fn missing_root_is_transient() {
    let tmp = TempDir::new().unwrap();
    let gone = tmp.path().join("unplugged");
    let err = take_snapshot(&gone, 1).unwrap_err();
    assert!(err.is_transient());
}

#[test]
fn snapshot_diff_on_disk() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());
    let before = take_snapshot(tmp.path(), 1).unwrap();

    fs::remove_file(tmp.path().join("notes.txt")).unwrap();
    fs::write(tmp.path().join("music/virus.js"), b"x").unwrap();
    let after = take_snapshot(tmp.path(), 1).unwrap();

    let diff = before.diff(&after);
    assert_eq!(diff.added, vec!["music/virus.js"]);
    assert_eq!(diff.removed, vec!["notes.txt"]);
}

// ── Full scan ────────────────────────────────────────────────────────────────

#[test]
fn full_scan_finds_blacklisted_files() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());

    let report = scan_drive(tmp.path(), &Classifier::default(), 2).unwrap();
    assert_eq!(report.files_scanned, 5);
    assert_eq!(report.suspicious, vec!["docs/tools/setup.EXE", "run.bat"]);
    assert!(!report.is_clean());
}

// ── Threaded pipeline ────────────────────────────────────────────────────────

#[test]
fn sentry_flags_a_dropped_executable() {
    let device = TempDir::new().unwrap();
    fs::write(device.path().join("photo.jpg"), b"x").unwrap();
    let logs = TempDir::new().unwrap();

    let config = SentryConfig {
        discovery_interval_ms: 20,
        poll_interval_ms: 20,
        change_hints: false,
        snapshot_threads: 1,
        log_path: logs.path().join("usb_monitor.log"),
        ..SentryConfig::default()
    };
    let host = Arc::new(DirHost {
        root: device.path().to_path_buf(),
    });
    let mut sentry = Sentry::with_host(config, host).unwrap();
    let rx = sentry.subscribe();
    sentry.start().unwrap();

    let deadline = Instant::now() + Duration::from_secs(30);
    while sentry.registry().status("TMP") != Some(DeviceStatus::Safe) {
        assert!(Instant::now() < deadline, "device never reached Safe");
        std::thread::sleep(Duration::from_millis(10));
    }

    fs::write(device.path().join("payload.exe"), b"MZ").unwrap();
    while sentry.registry().status("TMP") != Some(DeviceStatus::Flagged) {
        assert!(Instant::now() < deadline, "device never flagged");
        std::thread::sleep(Duration::from_millis(10));
    }

    let report = sentry.full_scan("TMP").unwrap();
    assert_eq!(report.suspicious, vec!["payload.exe"]);

    // Eject fails on a temp dir: surfaced, device stays flagged.
    assert!(sentry.quarantine("TMP").is_err());
    assert!(sentry.registry().is_flagged("TMP"));

    sentry.stop();

    let events: Vec<_> = rx.try_iter().collect();
    let suspicious: Vec<_> = events
        .iter()
        .filter(|e| e.kind == EventKind::Created && e.is_suspicious())
        .collect();
    assert_eq!(suspicious.len(), 1);
    assert_eq!(suspicious[0].path.as_deref(), Some("payload.exe"));
    assert_eq!(
        events.iter().filter(|e| e.kind == EventKind::Flagged).count(),
        1
    );

    let log = fs::read_to_string(logs.path().join("usb_monitor.log")).unwrap();
    assert!(log.contains("Flagged - Device: TEMPSTICK (TMP)"));
}
