/// Snapshot differencing - pure set algebra over two file-identifier sets.
use crate::model::Snapshot;
use compact_str::CompactString;

/// Paths that appeared and disappeared between two snapshots.
///
/// Both lists are sorted for stable display. A path is never in both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub added: Vec<CompactString>,
    pub removed: Vec<CompactString>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// `added = current − previous`, `removed = previous − current`.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> SnapshotDiff {
    let (prev, curr) = (previous.set(), current.set());
    let mut added: Vec<CompactString> = curr.difference(prev).cloned().collect();
    let mut removed: Vec<CompactString> = prev.difference(curr).cloned().collect();
    added.sort_unstable();
    removed.sort_unstable();
    SnapshotDiff { added, removed }
}
