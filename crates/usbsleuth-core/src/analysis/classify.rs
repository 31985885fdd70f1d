/// File classification by extension against the [`Blacklist`].
///
/// Pure and deterministic: the same path and blacklist always give the same
/// answer, so the device monitor and the one-shot full-drive scan share it.
/// No file content is ever read.
use crate::analysis::blacklist::{Blacklist, MAX_EXTENSION_LEN};
use serde::{Deserialize, Serialize};

/// Outcome of classifying one file path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Benign,
    Suspicious,
}

impl Classification {
    /// Human-readable label for display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Benign => "Benign",
            Self::Suspicious => "Suspicious",
        }
    }
}

/// Classifies paths using an immutable blacklist.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    blacklist: Blacklist,
}

impl Classifier {
    pub fn new(blacklist: Blacklist) -> Self {
        Self { blacklist }
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    /// Classify a path (relative or absolute, `/` or `\` separated).
    ///
    /// The extension is everything after the last `.` of the file name, so a
    /// bare `.exe` file name and `setup.tar.exe` both count as `exe`.
    pub fn classify(&self, path: &str) -> Classification {
        let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let ext = match name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext,
            _ => return Classification::Benign,
        };

        let bytes = ext.as_bytes();
        if bytes.len() > MAX_EXTENSION_LEN {
            return Classification::Benign;
        }

        // Lowercase into a stack buffer; no heap allocation per file.
        let mut lower = [0u8; MAX_EXTENSION_LEN];
        for (dest, &src) in lower.iter_mut().zip(bytes) {
            *dest = src.to_ascii_lowercase();
        }
        let lower_str = match std::str::from_utf8(&lower[..bytes.len()]) {
            Ok(s) => s,
            Err(_) => return Classification::Benign,
        };

        if self.blacklist.contains(lower_str) {
            Classification::Suspicious
        } else {
            Classification::Benign
        }
    }

    pub fn is_suspicious(&self, path: &str) -> bool {
        self.classify(path) == Classification::Suspicious
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exe_only() -> Classifier {
        Classifier::new(Blacklist::new([".exe"]).unwrap())
    }

    /// Extension matching must be case-insensitive so "EXE" == "exe".
    #[test]
    fn classify_case_insensitive() {
        let c = exe_only();
        for path in ["virus.EXE", "virus.exe", "virus.Exe", "dir/sub/VIRUS.eXe"] {
            assert_eq!(c.classify(path), Classification::Suspicious, "{path}");
        }
    }

    #[test]
    fn classify_default_blacklist() {
        let c = Classifier::default();
        assert!(c.is_suspicious("autorun.bat"));
        assert!(c.is_suspicious("payload.js"));
        assert!(c.is_suspicious("setup.exe"));
        assert!(!c.is_suspicious("notes.txt"));
        assert!(!c.is_suspicious("photo.jpeg"));
    }

    #[test]
    fn only_the_final_extension_counts() {
        let c = exe_only();
        assert!(c.is_suspicious("archive.tar.exe"));
        assert!(!c.is_suspicious("installer.exe.txt"));
        assert!(!c.is_suspicious("exe"));
    }

    #[test]
    fn dot_file_named_like_extension_is_suspicious() {
        assert!(exe_only().is_suspicious(".exe"));
        assert!(exe_only().is_suspicious("hidden/.EXE"));
    }

    #[test]
    fn dots_in_directory_names_are_ignored() {
        let c = exe_only();
        assert!(!c.is_suspicious("tools.exe/readme"));
        assert!(!c.is_suspicious("tools.exe\\readme"));
        assert!(c.is_suspicious("E:\\tools\\run.exe"));
    }

    #[test]
    fn trailing_dot_and_overlong_extensions_are_benign() {
        let c = exe_only();
        assert!(!c.is_suspicious("file."));
        assert!(!c.is_suspicious(&format!("file.{}", "e".repeat(MAX_EXTENSION_LEN + 1))));
    }

    #[test]
    fn non_ascii_names_do_not_panic() {
        let c = exe_only();
        assert!(!c.is_suspicious("документ.тхт"));
        assert!(c.is_suspicious("программа.exe"));
    }

    #[test]
    fn classification_is_deterministic() {
        let c = Classifier::default();
        let first: Vec<_> = ["a.exe", "b.txt", "c.JS"].iter().map(|p| c.classify(p)).collect();
        let second: Vec<_> = ["a.exe", "b.txt", "c.JS"].iter().map(|p| c.classify(p)).collect();
        assert_eq!(first, second);
    }
}
