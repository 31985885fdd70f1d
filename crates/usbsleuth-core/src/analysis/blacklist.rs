/// The set of dangerous file extensions, loaded once at startup.
///
/// Entries are normalised to lowercase ASCII without a leading dot, so
/// `".EXE"`, `"exe"` and `".exe"` all describe the same entry.
use crate::error::{Result, SentryError};
use compact_str::CompactString;
use std::collections::HashSet;

/// Longest extension accepted in a blacklist entry.
///
/// Lets the classifier lowercase candidate extensions into a stack buffer.
pub const MAX_EXTENSION_LEN: usize = 32;

/// Extensions blacklisted when no configuration overrides them.
pub const DEFAULT_EXTENSIONS: [&str; 3] = [".exe", ".bat", ".js"];

/// Immutable, case-insensitive extension set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blacklist {
    extensions: HashSet<CompactString>,
}

impl Blacklist {
    /// Build a blacklist, rejecting empty, over-long, or compound entries.
    ///
    /// Only the final extension of a file name is ever compared, so an entry
    /// like `.tar.gz` or one containing a path separator could never match.
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut extensions = HashSet::new();
        for entry in entries {
            let raw = entry.as_ref().trim();
            let bare = raw.strip_prefix('.').unwrap_or(raw);
            if bare.is_empty() {
                return Err(SentryError::InvalidConfig {
                    details: format!("blacklist entry {raw:?} has no extension"),
                });
            }
            if bare.contains(&['.', '/', '\\'][..]) {
                return Err(SentryError::InvalidConfig {
                    details: format!(
                        "blacklist entry {raw:?} must be a single extension without dots or path separators"
                    ),
                });
            }
            if bare.len() > MAX_EXTENSION_LEN {
                return Err(SentryError::InvalidConfig {
                    details: format!(
                        "blacklist entry {raw:?} is longer than {MAX_EXTENSION_LEN} bytes"
                    ),
                });
            }
            extensions.insert(CompactString::from(bare.to_ascii_lowercase()));
        }
        Ok(Self { extensions })
    }

    /// Whether an already-lowercased bare extension is blacklisted.
    pub fn contains(&self, lower_ext: &str) -> bool {
        self.extensions.contains(lower_ext)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Entries in `.ext` form, sorted, for display.
    pub fn display_entries(&self) -> Vec<String> {
        let mut out: Vec<String> = self.extensions.iter().map(|e| format!(".{e}")).collect();
        out.sort_unstable();
        out
    }
}

impl Default for Blacklist {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS
                .iter()
                .map(|e| CompactString::from(&e[1..]))
                .collect(),
        }
    }
}
