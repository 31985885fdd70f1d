/// Analysis modules - pure policy and set algebra, no I/O.

pub mod blacklist;
pub mod classify;
pub mod diff;

pub use blacklist::{Blacklist, MAX_EXTENSION_LEN};
pub use classify::{Classification, Classifier};
pub use diff::{diff, SnapshotDiff};
