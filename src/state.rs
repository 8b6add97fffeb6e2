use std::io;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::fs_event::FileSystemEvent;

/// Default wake-up cadence of the blocking drains, in milliseconds
///
/// This bounds how long a `stop()` can go unnoticed when the wake pipe
/// cannot be written (it normally can, and stop is then immediate).
pub(crate) const DEFAULT_SLEEP_MS: u64 = 250;

/// Policy shared between the controller, its backend and all handles
///
/// Owns the stop flag, the wake pipe, both ignore lists and the drain
/// cadence. Everything here may be touched from a user thread while the run
/// thread sits in a drain, so each piece is individually synchronized.
pub(crate) struct WatcherState {
    stopped: AtomicBool,
    sleep_ms: AtomicU64,
    ignored: Mutex<Vec<PathBuf>>,
    ignored_once: Mutex<Vec<PathBuf>>,
    wake_rx: OwnedFd,
    wake_tx: OwnedFd,
}

impl WatcherState {
    pub(crate) fn new() -> Result<Self> {
        let (wake_rx, wake_tx) = wake_pipe()?;

        Ok(WatcherState {
            stopped: AtomicBool::new(false),
            sleep_ms: AtomicU64::new(DEFAULT_SLEEP_MS),
            ignored: Mutex::new(Vec::new()),
            ignored_once: Mutex::new(Vec::new()),
            wake_rx,
            wake_tx,
        })
    }

    /// Requests cooperative termination
    ///
    /// Flips the stop flag (it never flips back) and pokes the wake pipe so
    /// a drain blocked in `poll`/`kevent` returns without waiting out its
    /// timeout.
    pub(crate) fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);

        let byte = [1u8];
        // A full pipe already guarantees the drain will wake; EAGAIN is fine.
        unsafe {
            libc::write(self.wake_tx.as_raw_fd(), byte.as_ptr() as *const _, 1);
        }
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub(crate) fn sleep(&self) -> Duration {
        Duration::from_millis(self.sleep_ms.load(Ordering::Relaxed))
    }

    pub(crate) fn set_sleep(&self, cadence: Duration) {
        self.sleep_ms
            .store(cadence.as_millis().max(1) as u64, Ordering::Relaxed);
    }

    /// Read end of the wake pipe, for registration in drain waits
    pub(crate) fn wake_fd(&self) -> RawFd {
        self.wake_rx.as_raw_fd()
    }

    /// Discards any pending wake bytes
    pub(crate) fn clear_wake(&self) {
        let mut buf = [0u8; 16];
        loop {
            let n = unsafe {
                libc::read(self.wake_rx.as_raw_fd(), buf.as_mut_ptr() as *mut _, buf.len())
            };
            if n <= 0 {
                break;
            }
        }
    }

    pub(crate) fn ignore(&self, path: impl Into<PathBuf>) {
        self.ignored.lock().unwrap().push(path.into());
    }

    pub(crate) fn ignore_once(&self, path: impl Into<PathBuf>) {
        self.ignored_once.lock().unwrap().push(path.into());
    }

    /// Exact-path membership test against the permanent ignore list
    pub(crate) fn is_ignored(&self, path: &Path) -> bool {
        self.ignored.lock().unwrap().iter().any(|p| p == path)
    }

    /// Membership test with removal on hit
    ///
    /// The first query for a listed path removes the entry and returns
    /// `true`; later queries return `false` again. Remove-and-test happens
    /// under one lock, so two drains cannot both consume the same entry.
    pub(crate) fn consume_ignored_once(&self, path: &Path) -> bool {
        let mut once = self.ignored_once.lock().unwrap();
        match once.iter().position(|p| p == path) {
            Some(index) => {
                once.remove(index);
                true
            }
            None => false,
        }
    }

    /// Should an event on `path` be dropped right now?
    pub(crate) fn filters_out(&self, path: &Path) -> bool {
        self.is_ignored(path) || self.consume_ignored_once(path)
    }

    /// Validates a file subscription
    ///
    /// Returns `Ok(false)` when the path is permanently ignored; the caller
    /// then skips registration without an error.
    pub(crate) fn check_watch_file(&self, fse: &FileSystemEvent) -> Result<bool> {
        let path = fse.path();
        let meta = std::fs::metadata(path).map_err(|_| Error::PathMissing {
            path: path.to_path_buf(),
        })?;

        if !meta.is_file() {
            return Err(Error::NotAFile {
                path: path.to_path_buf(),
            });
        }

        Ok(!self.is_ignored(path))
    }

    /// Validates a directory subscription
    ///
    /// Same contract as [`check_watch_file`](Self::check_watch_file):
    /// `Ok(false)` means "permanently ignored, skip silently".
    pub(crate) fn check_watch_directory(&self, fse: &FileSystemEvent) -> Result<bool> {
        let path = fse.path();
        let meta = std::fs::metadata(path).map_err(|_| Error::PathMissing {
            path: path.to_path_buf(),
        })?;

        if !meta.is_dir() {
            return Err(Error::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        Ok(!self.is_ignored(path))
    }
}

/// Creates the non-blocking, close-on-exec self-pipe used to interrupt
/// blocking drains
fn wake_pipe() -> Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0 as RawFd; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
        return Err(Error::Backend(io::Error::last_os_error()));
    }

    let (rx, tx) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

    for fd in [&rx, &tx] {
        let fd = fd.as_raw_fd();
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFL);
            libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
            let fd_flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, fd_flags | libc::FD_CLOEXEC);
        }
    }

    Ok((rx, tx))
}

/// Waits until `fd` is readable, the wake pipe fires, or `timeout` elapses
///
/// Returns `Ok(true)` when `fd` has data. A wake-pipe poke or an `EINTR`
/// returns `Ok(false)` so the caller re-checks the stop flag.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn wait_readable(fd: RawFd, state: &WatcherState, timeout: Duration) -> Result<bool> {
    let mut fds = [
        libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        },
        libc::pollfd {
            fd: state.wake_fd(),
            events: libc::POLLIN,
            revents: 0,
        },
    ];

    let ready = unsafe {
        libc::poll(
            fds.as_mut_ptr(),
            fds.len() as libc::nfds_t,
            timeout.as_millis() as libc::c_int,
        )
    };

    if ready == -1 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(Error::Backend(err));
    }

    if fds[1].revents & libc::POLLIN != 0 {
        state.clear_wake();
    }

    Ok(fds[0].revents & libc::POLLIN != 0)
}

#[cfg(test)]
mod tests {
    use super::WatcherState;
    use crate::error::Error;
    use crate::events::Event;
    use crate::fs_event::FileSystemEvent;
    use std::path::Path;

    #[test]
    fn stop_is_sticky() {
        let state = WatcherState::new().unwrap();
        assert!(!state.is_stopped());
        state.stop();
        assert!(state.is_stopped());
        state.stop();
        assert!(state.is_stopped());
    }

    #[test]
    fn is_ignored_matches_exact_paths_only() {
        let state = WatcherState::new().unwrap();
        state.ignore("/watched/file.txt");

        assert!(state.is_ignored(Path::new("/watched/file.txt")));
        assert!(!state.is_ignored(Path::new("/watched/file.txt.bak")));
        assert!(!state.is_ignored(Path::new("/watched")));
    }

    #[test]
    fn ignore_once_is_consumed_exactly_once() {
        let state = WatcherState::new().unwrap();
        state.ignore_once("/watched/file.txt");

        assert!(state.consume_ignored_once(Path::new("/watched/file.txt")));
        assert!(!state.consume_ignored_once(Path::new("/watched/file.txt")));
    }

    #[test]
    fn duplicate_ignore_once_entries_are_consumed_one_by_one() {
        let state = WatcherState::new().unwrap();
        state.ignore_once("/f");
        state.ignore_once("/f");

        assert!(state.consume_ignored_once(Path::new("/f")));
        assert!(state.consume_ignored_once(Path::new("/f")));
        assert!(!state.consume_ignored_once(Path::new("/f")));
    }

    #[test]
    fn check_watch_file_rejects_missing_and_non_files() {
        let state = WatcherState::new().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let missing = FileSystemEvent::new(dir.path().join("nope"), Event::ALL);
        assert!(matches!(
            state.check_watch_file(&missing),
            Err(Error::PathMissing { .. })
        ));

        let as_file = FileSystemEvent::new(dir.path(), Event::ALL);
        assert!(matches!(
            state.check_watch_file(&as_file),
            Err(Error::NotAFile { .. })
        ));
    }

    #[test]
    fn check_watch_file_skips_ignored_paths() {
        let state = WatcherState::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("watched.txt");
        std::fs::write(&file, b"x").unwrap();

        let fse = FileSystemEvent::new(&file, Event::ALL);
        assert!(state.check_watch_file(&fse).unwrap());

        state.ignore(&file);
        assert!(!state.check_watch_file(&fse).unwrap());
    }

    #[test]
    fn check_watch_directory_rejects_files() {
        let state = WatcherState::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, b"x").unwrap();

        let fse = FileSystemEvent::new(&file, Event::ALL);
        assert!(matches!(
            state.check_watch_directory(&fse),
            Err(Error::NotADirectory { .. })
        ));

        let ok = FileSystemEvent::new(dir.path(), Event::ALL);
        assert!(state.check_watch_directory(&ok).unwrap());
    }
}
