use std::collections::{HashMap, VecDeque};
use std::ffi::{CString, OsStr};
use std::io;
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::fs_event::FileSystemEvent;
use crate::state::{wait_readable, WatcherState};
use crate::sys::inotify as ffi;
use crate::translate::inotify as translate;

/// Longest file name a record can carry, plus its NUL
const NAME_SLOT: usize = 255 + 1;

/// Room for one kernel batch: 4096 records, each with a full-length name
const EVENT_BUF_LEN: usize = 4096 * (mem::size_of::<ffi::inotify_event>() + NAME_SLOT);

/// The inotify adapter
///
/// Owns the notification descriptor and the `wd → path` table the kernel's
/// records are resolved against. Closing the descriptor releases all
/// watches, so teardown is the `OwnedFd` drop.
pub(crate) struct InotifyWatcher {
    fd: OwnedFd,
    watches: HashMap<libc::c_int, PathBuf>,
    queue: VecDeque<FileSystemEvent>,
    state: Arc<WatcherState>,
    buffer: Vec<u8>,
}

impl InotifyWatcher {
    pub(crate) fn new(state: Arc<WatcherState>) -> Result<Self> {
        // Non-blocking, because this adapter manages blocking itself: the
        // drain waits in poll() and reads until EAGAIN.
        let fd = unsafe { ffi::inotify_init1(ffi::IN_CLOEXEC | ffi::IN_NONBLOCK) };
        if fd == -1 {
            return Err(Error::Backend(io::Error::last_os_error()));
        }

        Ok(InotifyWatcher {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
            watches: HashMap::new(),
            queue: VecDeque::new(),
            state,
            buffer: vec![0; EVENT_BUF_LEN],
        })
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
        let mask = translate::to_native(fse.event());
        if mask == 0 {
            return Err(Error::UnsupportedEvent {
                requested: fse.event(),
                backend: "inotify",
            });
        }

        let path = CString::new(fse.path().as_os_str().as_bytes())
            .map_err(|_| Error::PathMissing {
                path: fse.path().to_path_buf(),
            })?;

        let wd = unsafe { ffi::inotify_add_watch(self.fd.as_raw_fd(), path.as_ptr(), mask) };
        if wd == -1 {
            return Err(Error::from_watch_errno(
                fse.path().to_path_buf(),
                io::Error::last_os_error(),
            ));
        }

        // Re-watching a path yields the same wd; the insert stays unique.
        self.watches.insert(wd, fse.path().to_path_buf());
        Ok(())
    }

    pub(crate) fn unwatch(&mut self, path: &Path) -> Result<()> {
        let wd = self
            .watches
            .iter()
            .find(|(_, p)| p.as_path() == path)
            .map(|(wd, _)| *wd);

        if let Some(wd) = wd {
            if unsafe { ffi::inotify_rm_watch(self.fd.as_raw_fd(), wd) } == -1 {
                return Err(Error::Backend(io::Error::last_os_error()));
            }
            self.watches.remove(&wd);
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

            let readable = wait_readable(self.fd.as_raw_fd(), &self.state, self.state.sleep())?;
            if self.state.is_stopped() {
                return Ok(None);
            }
            if readable {
                self.drain()?;
            }
        }
    }

    /// Reads every currently available kernel batch into the queue
    fn drain(&mut self) -> Result<()> {
        loop {
            let read = unsafe {
                libc::read(
                    self.fd.as_raw_fd(),
                    self.buffer.as_mut_ptr() as *mut _,
                    self.buffer.len(),
                )
            };

            match read {
                n if n < 0 => {
                    let err = io::Error::last_os_error();
                    match err.kind() {
                        io::ErrorKind::WouldBlock => return Ok(()),
                        io::ErrorKind::Interrupted => continue,
                        _ => return Err(Error::Backend(err)),
                    }
                }
                0 => return Ok(()),
                n => walk_records(
                    &self.buffer[..n as usize],
                    &mut self.watches,
                    &self.state,
                    &mut self.queue,
                ),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn watched_paths(&self) -> Vec<&Path> {
        self.watches.values().map(PathBuf::as_path).collect()
    }
}

/// Walks one kernel batch, translating and filtering records into the queue
///
/// A record whose mask carries `IN_IGNORED` means the kernel invalidated the
/// watch; its `wd → path` entry is erased and nothing is emitted. Every
/// other record resolves to `watched-path` or `watched-path/name` and, after
/// the ignore filters, expands into one queued event per translated atom in
/// canonical order.
fn walk_records(
    buffer: &[u8],
    watches: &mut HashMap<libc::c_int, PathBuf>,
    state: &WatcherState,
    queue: &mut VecDeque<FileSystemEvent>,
) {
    let header = mem::size_of::<ffi::inotify_event>();
    let mut pos = 0;

    while pos + header <= buffer.len() {
        // The buffer has alignment 1; copy the header out instead of
        // referencing it in place.
        let record =
            unsafe { (buffer.as_ptr().add(pos) as *const ffi::inotify_event).read_unaligned() };

        let end = pos + header + record.len as usize;
        if end > buffer.len() {
            break;
        }
        let name = &buffer[pos + header..end];
        pos = end;

        if record.mask & ffi::IN_IGNORED != 0 {
            watches.remove(&record.wd);
            continue;
        }

        let base = match watches.get(&record.wd) {
            Some(path) => path,
            None => continue,
        };

        // `name` is NUL-padded up to the record boundary.
        let name = name.splitn(2, |byte| *byte == 0).next().unwrap();
        let path = if name.is_empty() {
            base.clone()
        } else {
            base.join(OsStr::from_bytes(name))
        };

        if state.filters_out(&path) {
            continue;
        }

        for atom in translate::from_native(record.mask).atoms() {
            queue.push_back(FileSystemEvent::new(path.clone(), atom));
        }
    }
}
