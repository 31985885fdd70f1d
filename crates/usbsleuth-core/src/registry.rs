/// Device registry - the single source of truth for attached devices.
///
/// Shared by the discovery loop, every device monitor, the quarantine
/// controller, and the frontend through an `Arc<Registry>`. All access goes
/// through a `parking_lot::RwLock`; no lock is ever held across I/O.
///
/// Status only changes through [`Registry::apply`] and
/// [`Registry::complete_poll`], both of which route through
/// [`lifecycle::next`], so the flagged set always mirrors the records whose
/// status is `Flagged`.
use crate::lifecycle::{self, DeviceStatus, LifecycleInput, Transition};
use crate::model::{DeviceRecord, Snapshot};
use chrono::Local;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// A registry shared between threads.
pub type SharedRegistry = Arc<Registry>;

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, DeviceRecord>,
    flagged: BTreeSet<String>,
    next_generation: u64,
}

#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(Self::new())
    }

    /// Insert a newly discovered record and stamp it with a fresh generation.
    /// Returns `false` (and leaves the existing record untouched) if the id is
    /// already present.
    pub fn insert(&self, mut record: DeviceRecord) -> bool {
        let mut inner = self.inner.write();
        if inner.records.contains_key(record.id()) {
            return false;
        }
        inner.next_generation += 1;
        record.generation = inner.next_generation;
        inner.records.insert(record.id().to_owned(), record);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().records.contains_key(id)
    }

    /// Clone of the record for `id`.
    pub fn get(&self, id: &str) -> Option<DeviceRecord> {
        self.inner.read().records.get(id).cloned()
    }

    pub fn status(&self, id: &str) -> Option<DeviceStatus> {
        self.inner.read().records.get(id).map(|r| r.status)
    }

    pub fn label(&self, id: &str) -> Option<String> {
        self.inner.read().records.get(id).map(|r| r.label.clone())
    }

    /// All device ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.read().records.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Clones of every record, sorted by id.
    pub fn records(&self) -> Vec<DeviceRecord> {
        let mut records: Vec<DeviceRecord> = self.inner.read().records.values().cloned().collect();
        records.sort_by(|a, b| a.id().cmp(b.id()));
        records
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    /// Feed a lifecycle input to one record. Returns `None` if the id is unknown.
    pub fn apply(&self, id: &str, input: LifecycleInput) -> Option<Transition> {
        let mut inner = self.inner.write();
        let Inner {
            records, flagged, ..
        } = &mut *inner;
        let record = records.get_mut(id)?;
        let transition = lifecycle::next(record.status, input);
        record.status = transition.to;
        if transition.to == DeviceStatus::Flagged {
            flagged.insert(id.to_owned());
        }
        Some(transition)
    }

    /// Store the result of a successful poll and advance the lifecycle in one
    /// critical section.
    ///
    /// `generation` is the value read when the poll started. Returns `None`
    /// and stores nothing if the record disappeared while the poll was
    /// running, or was replaced by a newer attachment under the same id.
    pub fn complete_poll(
        &self,
        id: &str,
        generation: u64,
        current: Snapshot,
        suspicious_found: bool,
    ) -> Option<Transition> {
        let mut inner = self.inner.write();
        let Inner {
            records, flagged, ..
        } = &mut *inner;
        let record = records.get_mut(id).filter(|r| r.generation == generation)?;

        let input = if suspicious_found {
            LifecycleInput::SuspiciousFound
        } else {
            LifecycleInput::CleanCycle
        };
        let transition = lifecycle::next(record.status, input);
        record.status = transition.to;
        record.snapshot = current;
        record.last_polled_at = Some(Local::now());
        if transition.to == DeviceStatus::Flagged {
            flagged.insert(id.to_owned());
        }
        Some(transition)
    }

    /// Remove a record and drop it from the flagged set.
    pub fn remove(&self, id: &str) -> Option<DeviceRecord> {
        let mut inner = self.inner.write();
        inner.flagged.remove(id);
        inner.records.remove(id)
    }

    /// Remove every record, returning them sorted by id.
    pub fn clear(&self) -> Vec<DeviceRecord> {
        let mut inner = self.inner.write();
        inner.flagged.clear();
        let mut records: Vec<DeviceRecord> = inner.records.drain().map(|(_, r)| r).collect();
        records.sort_by(|a, b| a.id().cmp(b.id()));
        records
    }

    /// Ids of flagged devices, sorted.
    pub fn flagged(&self) -> Vec<String> {
        self.inner.read().flagged.iter().cloned().collect()
    }

    pub fn is_flagged(&self, id: &str) -> bool {
        self.inner.read().flagged.contains(id)
    }

    pub fn flagged_count(&self) -> usize {
        self.inner.read().flagged.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttachedDevice, UNKNOWN_LABEL};

    fn record(id: &str) -> DeviceRecord {
        DeviceRecord::discovered(AttachedDevice::new(id, id), UNKNOWN_LABEL.to_owned())
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let reg = Registry::new();
        assert!(reg.insert(record("E:\\")));
        assert!(!reg.insert(record("E:\\")));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn complete_poll_replaces_snapshot_and_marks_safe() {
        let reg = Registry::new();
        reg.insert(record("E:\\"));
        reg.apply("E:\\", LifecycleInput::AnalysisStarted);

        let snap: Snapshot = ["a.txt"].into_iter().collect();
        let generation = reg.get("E:\\").unwrap().generation;
        let t = reg
            .complete_poll("E:\\", generation, snap.clone(), false)
            .unwrap();
        assert!(t.entered_safe());

        let rec = reg.get("E:\\").unwrap();
        assert_eq!(rec.snapshot, snap);
        assert!(rec.last_polled_at.is_some());
        assert!(!rec.awaiting_baseline());
    }

    #[test]
    fn flagged_set_tracks_flagged_records() {
        let reg = Registry::new();
        reg.insert(record("E:\\"));
        reg.insert(record("F:\\"));
        let e = reg.get("E:\\").unwrap().generation;
        let f = reg.get("F:\\").unwrap().generation;
        reg.complete_poll("E:\\", e, Snapshot::default(), false);
        reg.complete_poll("F:\\", f, ["x.exe"].into_iter().collect(), true);

        assert_eq!(reg.flagged(), vec!["F:\\".to_owned()]);
        assert!(reg.is_flagged("F:\\"));
        assert!(!reg.is_flagged("E:\\"));

        // A later clean poll does not clear the flag.
        let t = reg
            .complete_poll("F:\\", f, Snapshot::default(), false)
            .unwrap();
        assert_eq!(t.to, DeviceStatus::Flagged);
        assert_eq!(reg.flagged_count(), 1);
    }

    #[test]
    fn remove_clears_flag() {
        let reg = Registry::new();
        reg.insert(record("E:\\"));
        reg.apply("E:\\", LifecycleInput::SuspiciousFound);
        assert!(reg.is_flagged("E:\\"));

        let removed = reg.remove("E:\\").unwrap();
        assert_eq!(removed.status, DeviceStatus::Flagged);
        assert!(!reg.contains("E:\\"));
        assert_eq!(reg.flagged_count(), 0);
        assert!(reg.remove("E:\\").is_none());
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let reg = Registry::new();
        assert!(reg.apply("Z:\\", LifecycleInput::Removed).is_none());
        assert!(reg.complete_poll("Z:\\", 1, Snapshot::default(), true).is_none());
        assert_eq!(reg.flagged_count(), 0);
    }

    #[test]
    fn records_and_ids_are_sorted() {
        let reg = Registry::new();
        for id in ["G:\\", "E:\\", "F:\\"] {
            reg.insert(record(id));
        }
        assert_eq!(reg.ids(), vec!["E:\\", "F:\\", "G:\\"]);
        let ids: Vec<String> = reg.records().iter().map(|r| r.id().to_owned()).collect();
        assert_eq!(ids, reg.ids());
        assert_eq!(reg.clear().len(), 3);
        assert!(reg.is_empty());
    }

    #[test]
    fn stale_generation_does_not_touch_reattached_record() {
        let reg = Registry::new();
        reg.insert(record("E:\\"));
        let stale = reg.get("E:\\").unwrap().generation;

        reg.remove("E:\\");
        reg.insert(record("E:\\"));
        let fresh = reg.get("E:\\").unwrap();
        assert_ne!(fresh.generation, stale);

        let old: Snapshot = ["payload.exe"].into_iter().collect();
        assert!(reg.complete_poll("E:\\", stale, old, true).is_none());

        let rec = reg.get("E:\\").unwrap();
        assert!(rec.awaiting_baseline());
        assert!(rec.snapshot.is_empty());
        assert_eq!(rec.status, DeviceStatus::Discovered);
        assert_eq!(reg.flagged_count(), 0);
    }
}
