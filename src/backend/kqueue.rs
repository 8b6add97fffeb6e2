use std::collections::{HashMap, VecDeque};
use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::fs_event::FileSystemEvent;
use crate::state::WatcherState;
use crate::sys::kqueue as ffi;
use crate::translate::kqueue as translate;

/// Upper bound on a single `kevent` wait, so a missed wake cannot park the
/// drain for longer than this
const MAX_WAIT: Duration = Duration::from_millis(500);

/// How many events one `kevent` call may return
const EVENT_BATCH: usize = 32;

/// The kqueue adapter
///
/// Kqueue watches descriptors, not paths, so this adapter opens every
/// watched file `O_RDONLY` and keeps both directions of the `fd ↔ path`
/// mapping: events carry the fd as their ident, unwatch comes in by path.
pub(crate) struct KqueueWatcher {
    kq: OwnedFd,
    watches: HashMap<RawFd, PathBuf>,
    by_path: HashMap<PathBuf, RawFd>,
    queue: VecDeque<FileSystemEvent>,
    state: Arc<WatcherState>,
}

impl KqueueWatcher {
    pub(crate) fn new(state: Arc<WatcherState>) -> Result<Self> {
        let kq = unsafe { ffi::kqueue() };
        if kq == -1 {
            return Err(Error::Backend(io::Error::last_os_error()));
        }
        let kq = unsafe { OwnedFd::from_raw_fd(kq) };

        let mut watcher = KqueueWatcher {
            kq,
            watches: HashMap::new(),
            by_path: HashMap::new(),
            queue: VecDeque::new(),
            state,
        };

        // The wake pipe participates as a read filter, so stop() interrupts
        // a sleeping kevent immediately.
        watcher.register(
            watcher.state.wake_fd(),
            ffi::EVFILT_READ as i32,
            (ffi::EV_ADD | ffi::EV_CLEAR) as u32,
            0,
        )?;

        Ok(watcher)
    }

    pub(crate) fn watch_file(&mut self, fse: &FileSystemEvent) -> Result<()> {
        if !self.state.check_watch_file(fse)? {
            return Ok(());
        }
        self.add_watch(fse)
    }

    pub(crate) fn watch_directory(&mut self, fse: &FileSystemEvent) -> Result<()> {
        if !self.state.check_watch_directory(fse)? {
            return Ok(());
        }
        self.add_watch(fse)
    }

    fn add_watch(&mut self, fse: &FileSystemEvent) -> Result<()> {
        let fflags = translate::to_native(fse.event());
        if fflags == 0 {
            return Err(Error::UnsupportedEvent {
                requested: fse.event(),
                backend: "kqueue",
            });
        }

        if let Some(fd) = self.by_path.get(fse.path()) {
            // Re-registering an existing descriptor replaces its fflags.
            let fd = *fd;
            return self.register(
                fd,
                ffi::EVFILT_VNODE as i32,
                (ffi::EV_ADD | ffi::EV_ENABLE | ffi::EV_CLEAR) as u32,
                fflags,
            );
        }

        let cpath = CString::new(fse.path().as_os_str().as_bytes())
            .map_err(|_| Error::PathMissing {
                path: fse.path().to_path_buf(),
            })?;
        let fd = unsafe { libc::open(cpath.as_ptr(), libc::O_RDONLY) };
        if fd == -1 {
            return Err(Error::from_watch_errno(
                fse.path().to_path_buf(),
                io::Error::last_os_error(),
            ));
        }

        if let Err(err) = self.register(
            fd,
            ffi::EVFILT_VNODE as i32,
            (ffi::EV_ADD | ffi::EV_ENABLE | ffi::EV_CLEAR) as u32,
            fflags,
        ) {
            unsafe {
                libc::close(fd);
            }
            return Err(err);
        }

        self.watches.insert(fd, fse.path().to_path_buf());
        self.by_path.insert(fse.path().to_path_buf(), fd);
        Ok(())
    }

    pub(crate) fn unwatch(&mut self, path: &Path) -> Result<()> {
        let fd = match self.by_path.remove(path) {
            Some(fd) => fd,
            None => return Ok(()),
        };
        self.watches.remove(&fd);

        let result = self.register(fd, ffi::EVFILT_VNODE as i32, ffi::EV_DELETE as u32, 0);
        // Closing the descriptor would have dropped the filter anyway.
        unsafe {
            libc::close(fd);
        }
        result
    }

    fn register(&self, ident: RawFd, filter: i32, flags: u32, fflags: u32) -> Result<()> {
        // The kevent layout varies slightly across the BSDs (FreeBSD appends
        // an `ext` array); zero-initialize and fill the common fields.
        let mut change: ffi::kevent = unsafe { mem::zeroed() };
        change.ident = ident as libc::uintptr_t;
        change.filter = filter as _;
        change.flags = flags as _;
        change.fflags = fflags as _;

        let result = unsafe {
            ffi::kevent(
                self.kq.as_raw_fd(),
                &change,
                1,
                ptr::null_mut(),
                0,
                ptr::null(),
            )
        };
        if result == -1 {
            return Err(Error::Backend(io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Blocks until an event is available or the watcher is stopped
    pub(crate) fn next_event(&mut self) -> Result<Option<FileSystemEvent>> {
        loop {
            if self.state.is_stopped() {
                return Ok(None);
            }
            if let Some(event) = self.queue.pop_front() {
                return Ok(Some(event));
            }

            self.wait_and_drain()?;
            if self.state.is_stopped() {
                return Ok(None);
            }
        }
    }

    fn wait_and_drain(&mut self) -> Result<()> {
        let wait = self.state.sleep().min(MAX_WAIT);
        let timeout = ffi::timespec {
            tv_sec: wait.as_secs() as libc::time_t,
            tv_nsec: wait.subsec_nanos() as libc::c_long,
        };

        let mut events: [ffi::kevent; EVENT_BATCH] = unsafe { mem::zeroed() };
        let received = unsafe {
            ffi::kevent(
                self.kq.as_raw_fd(),
                ptr::null(),
                0,
                events.as_mut_ptr(),
                EVENT_BATCH as libc::c_int,
                &timeout,
            )
        };

        if received == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(Error::Backend(err));
        }

        for event in &events[..received as usize] {
            if event.flags as u32 & ffi::EV_ERROR as u32 != 0 {
                continue;
            }

            let fd = event.ident as RawFd;
            if fd == self.state.wake_fd() {
                self.state.clear_wake();
                continue;
            }

            let path = match self.watches.get(&fd) {
                Some(path) => path.clone(),
                None => continue,
            };

            if self.state.filters_out(&path) {
                continue;
            }

            for atom in translate::from_native(event.fflags as u32).atoms() {
                self.queue.push_back(FileSystemEvent::new(path.clone(), atom));
            }
        }

        Ok(())
    }
}

impl Drop for KqueueWatcher {
    fn drop(&mut self) {
        // The kqueue itself is an OwnedFd; the per-watch descriptors are raw
        // and must be released by hand.
        for fd in self.watches.keys() {
            unsafe {
                libc::close(*fd);
            }
        }
    }
}
