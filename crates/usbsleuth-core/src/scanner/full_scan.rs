/// One-shot full-drive scan: walk everything once, classify in parallel.
///
/// Independent of the device lifecycle: running it never changes a record's
/// status or emits events. It answers "which files on this drive would be
/// flagged right now?".
use crate::analysis::Classifier;
use crate::error::Result;
use crate::scanner::take_snapshot;
use compact_str::CompactString;
use rayon::prelude::*;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

/// Result of [`scan_drive`].
#[derive(Debug, Clone, Default)]
pub struct FullScanReport {
    pub files_scanned: usize,
    /// Suspicious relative paths, sorted.
    pub suspicious: Vec<CompactString>,
    pub duration: Duration,
}

impl FullScanReport {
    pub fn is_clean(&self) -> bool {
        self.suspicious.is_empty()
    }
}

/// Scan `root` and classify every file.
pub fn scan_drive(root: &Path, classifier: &Classifier, threads: usize) -> Result<FullScanReport> {
    let start = Instant::now();
    let snapshot = take_snapshot(root, threads)?;
    let files: Vec<&CompactString> = snapshot.iter().collect();

    let mut suspicious: Vec<CompactString> = files
        .par_iter()
        .filter(|path| classifier.is_suspicious(path))
        .map(|path| (*path).clone())
        .collect();
    suspicious.sort_unstable();

    let report = FullScanReport {
        files_scanned: files.len(),
        suspicious,
        duration: start.elapsed(),
    };
    info!(
        "Full scan of {}: {} files, {} suspicious",
        root.display(),
        report.files_scanned,
        report.suspicious.len()
    );
    Ok(report)
}
