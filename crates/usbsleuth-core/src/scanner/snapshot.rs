/// Parallel directory walk producing a [`Snapshot`].
///
/// A snapshot either succeeds as a whole or fails: if the root itself cannot
/// be read the walk returns [`SentryError::TransientIo`] and the caller keeps
/// its previous snapshot. Errors on individual subdirectories (permission
/// denied on `System Volume Information`, for example) are counted and
/// skipped, so a device with one locked folder can still be monitored.
use crate::error::{Result, SentryError};
use crate::model::Snapshot;
use compact_str::CompactString;
use std::path::{Component, Path};
use std::time::Instant;
use tracing::debug;

/// Initial capacity for a snapshot; typical USB sticks hold a few thousand files.
const SNAPSHOT_CAPACITY: usize = 4_096;

/// Enumerate every non-directory entry under `root`.
pub fn take_snapshot(root: &Path, threads: usize) -> Result<Snapshot> {
    let start = Instant::now();

    // Read the root up front: jwalk reports an unreadable root as an ordinary
    // entry error, which would otherwise look like an empty device.
    std::fs::read_dir(root).map_err(|source| SentryError::TransientIo {
        path: root.to_path_buf(),
        source,
    })?;

    let walker = jwalk::WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(false)
        .parallelism(jwalk::Parallelism::RayonNewPool(threads.max(1)));

    let mut snapshot = Snapshot::with_capacity(SNAPSHOT_CAPACITY);
    let mut error_count: u64 = 0;

    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                if err.depth() == 0 {
                    return Err(SentryError::TransientIo {
                        path: root.to_path_buf(),
                        source: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
                    });
                }
                error_count += 1;
                debug!("Snapshot: skipping unreadable entry under {:?}: {}", root, err);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }
        if let Some(id) = relative_id(root, &entry.path()) {
            snapshot.insert(id);
        }
    }

    debug!(
        "Snapshot: {} files under {:?} in {:.1?} ({} skipped)",
        snapshot.len(),
        root,
        start.elapsed(),
        error_count
    );
    Ok(snapshot)
}

/// Relative `/`-separated identifier for `path` under `root`.
///
/// Returns `None` for the root itself or paths outside it.
pub fn relative_id(root: &Path, path: &Path) -> Option<CompactString> {
    let rel = path.strip_prefix(root).ok()?;
    let mut id = CompactString::default();
    for component in rel.components() {
        if let Component::Normal(part) = component {
            if !id.is_empty() {
                id.push('/');
            }
            id.push_str(&part.to_string_lossy());
        }
    }
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn relative_id_uses_forward_slashes() {
        let root = PathBuf::from("/media/usb");
        let path = root.join("dir").join("sub").join("file.txt");
        assert_eq!(relative_id(&root, &path).unwrap(), "dir/sub/file.txt");
    }

    #[test]
    fn relative_id_rejects_root_and_outside_paths() {
        let root = PathBuf::from("/media/usb");
        assert!(relative_id(&root, &root).is_none());
        assert!(relative_id(&root, Path::new("/etc/passwd")).is_none());
    }

    #[test]
    fn missing_root_is_transient() {
        let tmp = tempfile::TempDir::new().unwrap();
        let gone = tmp.path().join("unplugged");
        match take_snapshot(&gone, 1) {
            Err(SentryError::TransientIo { path, .. }) => assert_eq!(path, gone),
            other => panic!("expected TransientIo, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("readme.txt"), b"x").unwrap();
        std::fs::create_dir(tmp.path().join("open")).unwrap();
        std::fs::write(tmp.path().join("open").join("photo.jpg"), b"x").unwrap();
        let locked = tmp.path().join("System Volume Information");
        std::fs::create_dir(&locked).unwrap();
        std::fs::write(locked.join("tracking.log"), b"x").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let result = take_snapshot(tmp.path(), 2);
        // Root ignores mode bits, in which case the locked file is listed too.
        let locked_is_readable = std::fs::read_dir(&locked).is_ok();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        let snapshot = result.expect("a locked subdirectory must not fail the walk");
        assert!(snapshot.contains("readme.txt"));
        assert!(snapshot.contains("open/photo.jpg"));
        if !locked_is_readable {
            assert!(!snapshot.contains("System Volume Information/tracking.log"));
            assert_eq!(snapshot.len(), 2);
        }
    }
}
