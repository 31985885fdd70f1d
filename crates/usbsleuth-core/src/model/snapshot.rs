/// File-set snapshots.
///
/// A file is identified only by its path relative to the device root,
/// `/`-separated. Two files with the same path are the same file regardless
/// of size, timestamps, or content, so an in-place rewrite is invisible here.
use crate::analysis::SnapshotDiff;
use compact_str::CompactString;
use std::collections::HashSet;

/// The set of file identifiers found under a device root at one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    files: HashSet<CompactString>,
}

impl Snapshot {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            files: HashSet::with_capacity(capacity),
        }
    }

    /// Insert a relative path. Returns `false` if it was already present.
    pub fn insert(&mut self, path: impl Into<CompactString>) -> bool {
        self.files.insert(path.into())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate file identifiers in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &CompactString> {
        self.files.iter()
    }

    /// All identifiers, sorted, for stable display and export.
    pub fn sorted(&self) -> Vec<CompactString> {
        let mut files: Vec<CompactString> = self.files.iter().cloned().collect();
        files.sort_unstable();
        files
    }

    /// Compute what changed going from `self` (previous) to `current`.
    pub fn diff(&self, current: &Snapshot) -> SnapshotDiff {
        crate::analysis::diff::diff(self, current)
    }

    pub(crate) fn set(&self) -> &HashSet<CompactString> {
        &self.files
    }
}

impl<S: Into<CompactString>> FromIterator<S> for Snapshot {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().map(Into::into).collect(),
        }
    }
}
