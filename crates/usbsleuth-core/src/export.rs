/// CSV export of the event history (the spreadsheet export action).
use crate::error::{Result, SentryError};
use crate::model::DeviceEvent;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// One flattened CSV row.
#[derive(Debug, Serialize)]
struct EventRow<'a> {
    timestamp: String,
    device_id: &'a str,
    label: &'a str,
    event: &'static str,
    path: &'a str,
    classification: &'static str,
}

impl<'a> From<&'a DeviceEvent> for EventRow<'a> {
    fn from(event: &'a DeviceEvent) -> Self {
        Self {
            timestamp: event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            device_id: &event.device_id,
            label: &event.label,
            event: event.kind.label(),
            path: event.path.as_deref().unwrap_or(""),
            classification: event.classification.map(|c| c.label()).unwrap_or(""),
        }
    }
}

/// Write `events` as CSV (with header) to any writer.
pub fn write_csv<W: Write>(writer: W, events: &[DeviceEvent]) -> csv::Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for event in events {
        out.serialize(EventRow::from(event))?;
    }
    out.flush()?;
    Ok(())
}

/// Write `events` to a CSV file at `path`, replacing it.
pub fn export_csv(path: &Path, events: &[DeviceEvent]) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|source| SentryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_csv(file, events).map_err(|err| SentryError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::Other, err),
    })?;
    tracing::info!("Exported {} events to {}", events.len(), path.display());
    Ok(())
}
