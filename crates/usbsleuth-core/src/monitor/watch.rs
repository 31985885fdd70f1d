/// Change hints for a device monitor on Windows.
///
/// A watcher thread issues overlapped `ReadDirectoryChangesW` requests on the
/// device root and turns every completion into a wake-up for the owning
/// monitor. The notification payload is never parsed: the monitor's next
/// snapshot is the source of truth, so a hint only shortens the wait.
///
/// The watcher exits when the cancel flag is set or the monitor side of the
/// wake channel is gone.
use crossbeam_channel::{Sender, TrySendError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, ReadDirectoryChangesW, FILE_FLAGS_AND_ATTRIBUTES, FILE_FLAG_BACKUP_SEMANTICS,
    FILE_FLAG_OVERLAPPED, FILE_LIST_DIRECTORY, FILE_NOTIFY_CHANGE_DIR_NAME,
    FILE_NOTIFY_CHANGE_FILE_NAME, FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE,
    OPEN_EXISTING,
};
use windows::Win32::System::Threading::{CreateEventW, ResetEvent, WaitForSingleObject};
use windows::Win32::System::IO::{CancelIoEx, GetOverlappedResult, OVERLAPPED};

/// How often the watcher re-checks the cancel flag while waiting on I/O.
const CANCEL_CHECK_MS: u32 = 200;

/// Start a detached watcher for `root`. Failure to start is logged and
/// leaves the monitor on its plain polling schedule.
pub(crate) fn spawn_watcher(root: PathBuf, cancel: Arc<AtomicBool>, wake: Sender<()>) {
    let name = format!("usbsleuth-watch-{}", root.display());
    let spawned = std::thread::Builder::new()
        .name(name)
        .spawn(move || run_watcher(root, cancel, wake));
    if let Err(e) = spawned {
        warn!("Monitor: change hints unavailable: {}", e);
    }
}

// ─── Background thread ──────────────────────────────────────────────────────

fn run_watcher(root: PathBuf, cancel: Arc<AtomicBool>, wake: Sender<()>) {
    debug!("Watch: starting on {:?}", root);

    let wide_path: Vec<u16> = root
        .to_string_lossy()
        .encode_utf16()
        .chain(std::iter::once(0u16))
        .collect();

    let dir_handle: HANDLE = unsafe {
        match CreateFileW(
            windows::core::PCWSTR(wide_path.as_ptr()),
            FILE_LIST_DIRECTORY.0,
            FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
            None,
            OPEN_EXISTING,
            FILE_FLAGS_AND_ATTRIBUTES(FILE_FLAG_BACKUP_SEMANTICS.0 | FILE_FLAG_OVERLAPPED.0),
            None,
        ) {
            Ok(h) => h,
            Err(e) => {
                warn!("Watch: failed to open {:?}: {}", root, e);
                return;
            }
        }
    };

    let io_event: HANDLE = unsafe {
        match CreateEventW(None, true, false, None) {
            Ok(h) => h,
            Err(e) => {
                warn!("Watch: failed to create event: {}", e);
                let _ = CloseHandle(dir_handle);
                return;
            }
        }
    };

    // Only names matter: a snapshot tracks paths, not contents.
    let filter = FILE_NOTIFY_CHANGE_FILE_NAME | FILE_NOTIFY_CHANGE_DIR_NAME;
    let mut buffer = vec![0u8; 16 * 1024];

    'outer: loop {
        if cancel.load(Ordering::Relaxed) {
            break;
        }

        let mut overlapped = OVERLAPPED::default();
        overlapped.hEvent = io_event;
        unsafe {
            let _ = ResetEvent(io_event);
        }

        let issued = unsafe {
            ReadDirectoryChangesW(
                dir_handle,
                buffer.as_mut_ptr() as *mut core::ffi::c_void,
                buffer.len() as u32,
                true,
                filter,
                None,
                Some(&mut overlapped),
                None,
            )
        };
        if let Err(e) = issued {
            // Typically the volume went away underneath us.
            debug!("Watch: request on {:?} failed: {}", root, e);
            break;
        }

        loop {
            if cancel.load(Ordering::Relaxed) {
                unsafe {
                    let _ = CancelIoEx(dir_handle, Some(&overlapped));
                    // The kernel must release OVERLAPPED before it leaves scope.
                    WaitForSingleObject(io_event, 5000);
                }
                break 'outer;
            }

            let wait = unsafe { WaitForSingleObject(io_event, CANCEL_CHECK_MS) };
            if wait.0 == 0 {
                // WAIT_OBJECT_0. Overflow still means "something changed".
                let mut bytes: u32 = 0;
                let _ = unsafe { GetOverlappedResult(dir_handle, &overlapped, &mut bytes, false) };
                break;
            } else if wait.0 == 0x102 {
                // WAIT_TIMEOUT
                continue;
            } else {
                warn!("Watch: WaitForSingleObject returned unexpected value");
                break 'outer;
            }
        }

        match wake.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => break,
        }
    }

    unsafe {
        let _ = CloseHandle(io_event);
        let _ = CloseHandle(dir_handle);
    }
    debug!("Watch: stopped for {:?}", root);
}
