/// Persistent, human-readable event log.
///
/// One line per event, appended. Each line is assembled in memory and
/// written with a single `write_all` so a concurrent reader never sees a
/// partial line. Write failures are logged and swallowed: losing a log line
/// must never stop monitoring.
use crate::error::{Result, SentryError};
use crate::events::EventSink;
use crate::model::DeviceEvent;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct LogFileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl LogFileSink {
    /// Open (or create) `path` for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SentryError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| SentryError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for LogFileSink {
    fn deliver(&self, event: &DeviceEvent) {
        let mut line = format_line(event);
        line.push('\n');
        if let Err(err) = self.file.lock().write_all(line.as_bytes()) {
            tracing::warn!("Event log: write to {} failed: {}", self.path.display(), err);
        }
    }
}

/// `2024-05-01 12:00:00 - Created - Device: STICK (E:\) - Path: virus.exe - Suspicious`
pub fn format_line(event: &DeviceEvent) -> String {
    let mut line = format!(
        "{} - {} - Device: {} ({})",
        event.timestamp.format("%Y-%m-%d %H:%M:%S"),
        event.kind.label(),
        event.label,
        event.device_id
    );
    if let Some(path) = &event.path {
        line.push_str(" - Path: ");
        line.push_str(path);
    }
    if let Some(class) = event.classification {
        line.push_str(" - ");
        line.push_str(class.label());
    }
    line
}

/// Whole log contents for the "show log" view.
pub fn read_log(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| SentryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Save a copy of the log (the "print log" action). Returns bytes copied.
pub fn copy_log(from: &Path, to: &Path) -> Result<u64> {
    std::fs::copy(from, to).map_err(|source| SentryError::Io {
        path: to.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Classification;
    use crate::model::EventKind;

    #[test]
    fn format_includes_path_and_classification() {
        let event = DeviceEvent::created("E:\\", "STICK", "bin/virus.exe", Classification::Suspicious);
        let line = format_line(&event);
        assert!(line.contains(" - Created - Device: STICK (E:\\)"));
        assert!(line.ends_with(" - Path: bin/virus.exe - Suspicious"));
    }

    #[test]
    fn device_events_have_no_path() {
        let line = format_line(&DeviceEvent::device("E:\\", "Unknown", EventKind::Disconnected));
        assert!(line.ends_with("Disconnected - Device: Unknown (E:\\)"));
    }

    #[test]
    fn sink_appends_lines_and_log_can_be_copied() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("logs").join("usb_monitor.log");
        let sink = LogFileSink::open(&path).unwrap();
        sink.deliver(&DeviceEvent::device("E:\\", "STICK", EventKind::Discovered));
        sink.deliver(&DeviceEvent::deleted("E:\\", "STICK", "a.txt"));
        drop(sink);

        // Re-opening appends rather than truncating.
        let sink = LogFileSink::open(&path).unwrap();
        sink.deliver(&DeviceEvent::device("E:\\", "STICK", EventKind::Safe));

        let text = read_log(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(1).unwrap().contains("Deleted"));

        let copy = tmp.path().join("copy.txt");
        assert_eq!(copy_log(&path, &copy).unwrap(), text.len() as u64);
        assert_eq!(read_log(&copy).unwrap(), text);
    }

    #[test]
    fn missing_log_is_an_io_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            read_log(&tmp.path().join("nope.log")),
            Err(SentryError::Io { .. })
        ));
    }
}
