/// Scanner module - full recursive enumeration of a device root.
///
/// - [`snapshot`] builds the file-identifier set a device monitor diffs.
/// - [`full_scan`] is the one-shot "scan the whole drive" action: it walks
///   once and classifies every file in parallel.
///
/// Both use `jwalk`'s rayon-backed parallel traversal.
pub mod full_scan;
pub mod snapshot;

pub use full_scan::{scan_drive, FullScanReport};
pub use snapshot::{relative_id, take_snapshot};
