use std::collections::{HashMap, VecDeque};
use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, warn};

use crate::error::{Error, Result};
use crate::fs_event::FileSystemEvent;
use crate::state::{wait_readable, WatcherState};
use crate::sys::fanotify as ffi;
use crate::translate::fanotify as translate;

/// Read size for one batch of event metadata records
const EVENT_BUF_LEN: usize = 8192;

/// Resolves the file descriptor carried by a fanotify record to a path
///
/// Fanotify identifies the object of an event by an open descriptor, not by
/// name. The default implementation reads the `/proc/self/fd/<fd>` symlink;
/// tests substitute a fake so record handling can be exercised without
/// procfs.
pub trait PathResolver: Send {
    /// Returns the path behind `fd`, or `None` if it cannot be resolved
    fn resolve(&self, fd: RawFd) -> Option<PathBuf>;
}

/// The procfs-backed resolver used in production
pub(crate) struct ProcFdResolver;

impl PathResolver for ProcFdResolver {
    fn resolve(&self, fd: RawFd) -> Option<PathBuf> {
        std::fs::read_link(format!("/proc/self/fd/{fd}")).ok()
    }
}

/// The fanotify adapter
///
/// Owns the notification group descriptor and a `path → native mask` table;
/// fanotify has no watch handles, so removal must repeat the exact mask the
/// mark was created with.
pub(crate) struct FanotifyWatcher {
    fd: OwnedFd,
    marks: HashMap<PathBuf, u64>,
    queue: VecDeque<FileSystemEvent>,
    state: Arc<WatcherState>,
    resolver: Box<dyn PathResolver>,
    buffer: Vec<u8>,
}

impl FanotifyWatcher {
    #[cfg(target_os = "linux")]
    pub(crate) fn new(state: Arc<WatcherState>) -> Result<Self> {
        Self::with_resolver(state, Box::new(ProcFdResolver))
    }

    #[cfg(target_os = "linux")]
    pub(crate) fn with_resolver(
        state: Arc<WatcherState>,
        resolver: Box<dyn PathResolver>,
    ) -> Result<Self> {
        // The init flags are version-gated: FAN_ENABLE_AUDIT joins the set
        // on kernels that accept it.
        let fd = unsafe {
            ffi::fanotify_init(
                ffi::supported_init_flags(),
                ffi::event_file_flags() as libc::c_uint,
            )
        };
        if fd == -1 {
            return Err(Error::Backend(io::Error::last_os_error()));
        }

        Ok(FanotifyWatcher {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
            marks: HashMap::new(),
            queue: VecDeque::new(),
            state,
            resolver,
            buffer: vec![0; EVENT_BUF_LEN],
        })
    }

    pub(crate) fn watch_file(&mut self, fse: &FileSystemEvent) -> Result<()> {
        if !self.state.check_watch_file(fse)? {
            return Ok(());
        }
        self.mark(fse, ffi::FAN_MARK_ADD)
    }

    pub(crate) fn watch_directory(&mut self, fse: &FileSystemEvent) -> Result<()> {
        if !self.state.check_watch_directory(fse)? {
            return Ok(());
        }
        self.mark(fse, ffi::FAN_MARK_ADD)
    }

    /// Marks the whole mount containing the path
    ///
    /// Mount-scope marks only observe what fanotify itself can express;
    /// requesting atoms outside that set is accepted but has no effect, which
    /// is worth a warning rather than a failure.
    pub(crate) fn watch_mount_point(&mut self, fse: &FileSystemEvent) -> Result<()> {
        let inexpressible = fse.event() & !translate::supported();
        if !inexpressible.is_empty() {
            warn!(
                "mount-scope watch on {:?} cannot observe: {}",
                fse.path(),
                inexpressible
            );
        }

        self.mark(fse, ffi::FAN_MARK_ADD | ffi::FAN_MARK_MOUNT)
    }

    fn mark(&mut self, fse: &FileSystemEvent, flags: libc::c_uint) -> Result<()> {
        let mask = translate::to_native(fse.event());
        if mask == 0 {
            return Err(Error::UnsupportedEvent {
                requested: fse.event(),
                backend: "fanotify",
            });
        }

        let path = CString::new(fse.path().as_os_str().as_bytes())
            .map_err(|_| Error::PathMissing {
                path: fse.path().to_path_buf(),
            })?;

        let result = unsafe {
            ffi::fanotify_mark(self.fd.as_raw_fd(), flags, mask, libc::AT_FDCWD, path.as_ptr())
        };
        if result == -1 {
            return Err(Error::from_watch_errno(
                fse.path().to_path_buf(),
                io::Error::last_os_error(),
            ));
        }

        self.marks.insert(fse.path().to_path_buf(), mask);
        Ok(())
    }

    pub(crate) fn unwatch(&mut self, path: &Path) -> Result<()> {
        let mask = match self.marks.get(path) {
            Some(mask) => *mask,
            None => return Ok(()),
        };

        let cpath = CString::new(path.as_os_str().as_bytes()).map_err(|_| Error::PathMissing {
            path: path.to_path_buf(),
        })?;

        let result = unsafe {
            ffi::fanotify_mark(
                self.fd.as_raw_fd(),
                ffi::FAN_MARK_REMOVE,
                mask,
                libc::AT_FDCWD,
                cpath.as_ptr(),
            )
        };
        if result == -1 {
            return Err(Error::Backend(io::Error::last_os_error()));
        }

        self.marks.remove(path);
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
                    self.resolver.as_ref(),
                    &self.state,
                    &mut self.queue,
                ),
            }
        }
    }
}

/// Walks one batch of metadata records, translating and filtering into the
/// queue
///
/// Every record's descriptor is closed here, on all paths, including
/// filtered and unresolvable ones; leaking them would exhaust the fd table
/// under load. Fanotify ORs several occurrences into one record, so a single
/// record can expand into several queued atoms, in canonical order.
fn walk_records(
    buffer: &[u8],
    resolver: &dyn PathResolver,
    state: &WatcherState,
    queue: &mut VecDeque<FileSystemEvent>,
) {
    let header = mem::size_of::<ffi::fanotify_event_metadata>();
    let mut pos = 0;

    while buffer.len() - pos >= header {
        let meta = unsafe {
            (buffer.as_ptr().add(pos) as *const ffi::fanotify_event_metadata).read_unaligned()
        };

        if !ffi::event_ok(&meta, buffer.len() - pos) {
            break;
        }
        if meta.vers != ffi::FANOTIFY_METADATA_VERSION {
            error!(
                "fanotify ABI mismatch: kernel speaks version {}, expected {}",
                meta.vers,
                ffi::FANOTIFY_METADATA_VERSION
            );
            break;
        }
        pos += meta.event_len as usize;

        if meta.fd < 0 {
            // FAN_NOFD, e.g. a queue overflow record; nothing to resolve.
            continue;
        }

        let path = resolver.resolve(meta.fd);
        unsafe {
            libc::close(meta.fd);
        }

        let path = match path {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => continue,
        };

        if state.filters_out(&path) {
            continue;
        }

        for atom in translate::from_native(meta.mask).atoms() {
            queue.push_back(FileSystemEvent::new(path.clone(), atom));
        }
    }
}
