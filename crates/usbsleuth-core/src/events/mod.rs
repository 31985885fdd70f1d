/// Event emitter - fans every [`DeviceEvent`] out to subscribers and sinks.
///
/// Subscribers get their own unbounded `crossbeam_channel` receiver; the
/// frontend drains it once per frame. Sinks are called synchronously on the
/// emitting thread (the persistent log file is one). A subscriber that
/// dropped its receiver is pruned on the next emit.
pub mod log_file;

use crate::model::{DeviceEvent, EventKind};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use log_file::{copy_log, format_line, read_log, LogFileSink};

/// An event bus shared between threads.
pub type SharedBus = Arc<EventBus>;

/// Synchronous consumer of events.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &DeviceEvent);
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<DeviceEvent>>>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
    emitted: AtomicU64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.lock().len())
            .field("sinks", &self.sinks.read().len())
            .field("emitted", &self.emitted_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedBus {
        Arc::new(Self::new())
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> Receiver<DeviceEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn add_sink(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().push(sink);
    }

    /// Publish one event.
    pub fn emit(&self, event: DeviceEvent) {
        match (event.kind, event.is_suspicious()) {
            (EventKind::Flagged, _) | (EventKind::Created, true) => warn!("{}", format_line(&event)),
            (EventKind::Created | EventKind::Deleted, false) => {
                debug!("{}", format_line(&event))
            }
            _ => info!("{}", format_line(&event)),
        }

        for sink in self.sinks.read().iter() {
            sink.deliver(&event);
        }
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn emitted_count(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Sink that keeps every event in memory. Handy for tests and exports.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DeviceEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events.lock().clone()
    }

    /// Events of one kind, in emission order.
    pub fn of_kind(&self, kind: EventKind) -> Vec<DeviceEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

impl EventSink for MemorySink {
    fn deliver(&self, event: &DeviceEvent) {
        self.events.lock().push(event.clone());
    }
}
