//! Bindings for fanotify
//!
//! Fanotify reports events for whole mounts as well as single files, and
//! hands out an open file descriptor per event instead of a name. The
//! receiver is responsible for closing that descriptor.
//!
//! Record walking uses the same ok/next arithmetic as the kernel's
//! `FAN_EVENT_OK` / `FAN_EVENT_NEXT` macros, provided here as functions.

#![allow(dead_code)]

use libc::{c_char, c_int, c_uint};

/// Mask: file was accessed
pub const FAN_ACCESS: u64 = 0x0000_0001;

/// Mask: file was modified
pub const FAN_MODIFY: u64 = 0x0000_0002;

/// Mask: file opened for writing was closed
pub const FAN_CLOSE_WRITE: u64 = 0x0000_0008;

/// Mask: file not opened for writing was closed
pub const FAN_CLOSE_NOWRITE: u64 = 0x0000_0010;

/// Mask: file was opened
pub const FAN_OPEN: u64 = 0x0000_0020;

/// Mask: the kernel event queue overflowed
pub const FAN_Q_OVERFLOW: u64 = 0x0000_4000;

/// Mask: permission to open was requested
pub const FAN_OPEN_PERM: u64 = 0x0001_0000;

/// Mask: permission to access was requested
pub const FAN_ACCESS_PERM: u64 = 0x0002_0000;

/// Mask: interested in events on children of a marked directory
pub const FAN_EVENT_ON_CHILD: u64 = 0x0800_0000;

/// Mask: event occurred against a directory
pub const FAN_ONDIR: u64 = 0x4000_0000;

/// Mask: any close event
pub const FAN_CLOSE: u64 = FAN_CLOSE_WRITE | FAN_CLOSE_NOWRITE;

/// Init flag: set close-on-exec on the notification descriptor
pub const FAN_CLOEXEC: c_uint = 0x0000_0001;

/// Init flag: set the notification descriptor non-blocking
pub const FAN_NONBLOCK: c_uint = 0x0000_0002;

/// Init flag: receive event notifications only (no permission decisions)
pub const FAN_CLASS_NOTIF: c_uint = 0x0000_0000;

/// Init flag: record events in the audit log
///
/// Only honored by kernels >= 4.15; see
/// [`supported_init_flags`](crate::sys::fanotify::supported_init_flags).
pub const FAN_ENABLE_AUDIT: c_uint = 0x0000_0040;

/// Mark flag: add the given mask to the mark
pub const FAN_MARK_ADD: c_uint = 0x0000_0001;

/// Mark flag: remove the given mask from the mark
pub const FAN_MARK_REMOVE: c_uint = 0x0000_0002;

/// Mark flag: mark the whole mount containing the path
pub const FAN_MARK_MOUNT: c_uint = 0x0000_0010;

/// Event-file flag for kernels predating the `O_LARGEFILE` convention
///
/// Kernels before 3.15 reject `fanotify_init` when the event-file flags
/// carry the glibc value of `O_LARGEFILE`; they expect the raw numeric flag
/// instead (torvalds/linux@1e2ee49f).
pub const O_LARGEFILE_LEGACY: c_int = 0o100000;

/// Version stamp expected in [`fanotify_event_metadata::vers`]
pub const FANOTIFY_METADATA_VERSION: u8 = 3;

/// Indicates the event file descriptor could not be provided
pub const FAN_NOFD: c_int = -1;

/// Fixed-size metadata prefix of every fanotify event record
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct fanotify_event_metadata {
    /// Total length of this record, including variable-length info
    pub event_len: u32,

    /// ABI version of this record; must match [`FANOTIFY_METADATA_VERSION`]
    pub vers: u8,

    /// Padding
    pub reserved: u8,

    /// Length of this fixed-size prefix
    pub metadata_len: u16,

    /// Bits describing the event
    pub mask: u64,

    /// An open descriptor for the object the event occurred on, or
    /// [`FAN_NOFD`]
    ///
    /// The receiver must close it.
    pub fd: c_int,

    /// Pid of the process that caused the event
    pub pid: c_int,
}

/// Equivalent of the kernel's `FAN_EVENT_OK` macro
///
/// `remaining` is the number of unconsumed bytes in the read buffer starting
/// at the record `meta` was copied from.
pub fn event_ok(meta: &fanotify_event_metadata, remaining: usize) -> bool {
    let header = std::mem::size_of::<fanotify_event_metadata>();
    remaining >= header && meta.event_len as usize >= header && meta.event_len as usize <= remaining
}

/// The `fanotify_init` flag set for this kernel
///
/// Always `FAN_CLOEXEC | FAN_NONBLOCK | FAN_CLASS_NOTIF`; `FAN_ENABLE_AUDIT`
/// was added in 4.15, so it joins the set there and stays absent on older
/// kernels, which reject it.
#[cfg(target_os = "linux")]
pub fn supported_init_flags() -> c_uint {
    let base = FAN_CLOEXEC | FAN_NONBLOCK | FAN_CLASS_NOTIF;
    if *crate::sys::KERNEL_VERSION >= (4, 15) {
        base | FAN_ENABLE_AUDIT
    } else {
        base
    }
}

/// Event-file flags for `fanotify_init`, honoring the pre-3.15 convention
#[cfg(target_os = "linux")]
pub fn event_file_flags() -> c_int {
    if *crate::sys::KERNEL_VERSION < (3, 15) {
        libc::O_RDONLY | O_LARGEFILE_LEGACY
    } else {
        libc::O_RDONLY | libc::O_LARGEFILE
    }
}

#[cfg(target_os = "linux")]
extern "C" {
    /// Creates a fanotify notification group
    pub fn fanotify_init(flags: c_uint, event_f_flags: c_uint) -> c_int;

    /// Adds, removes or flushes a mark on a filesystem object
    pub fn fanotify_mark(
        fd: c_int,
        flags: c_uint,
        mask: u64,
        dirfd: c_int,
        pathname: *const c_char,
    ) -> c_int;
}

#[cfg(test)]
mod tests {
    use super::{event_ok, fanotify_event_metadata, FANOTIFY_METADATA_VERSION};
    use std::mem;

    fn meta(event_len: u32) -> fanotify_event_metadata {
        fanotify_event_metadata {
            event_len,
            vers: FANOTIFY_METADATA_VERSION,
            reserved: 0,
            metadata_len: mem::size_of::<fanotify_event_metadata>() as u16,
            mask: 0,
            fd: -1,
            pid: 0,
        }
    }

    #[test]
    fn event_ok_accepts_a_full_record() {
        let header = mem::size_of::<fanotify_event_metadata>();
        assert!(event_ok(&meta(header as u32), header));
    }

    #[test]
    fn event_ok_rejects_truncated_buffers() {
        let header = mem::size_of::<fanotify_event_metadata>();
        assert!(!event_ok(&meta(header as u32), header - 1));
        assert!(!event_ok(&meta((header - 1) as u32), header));
        assert!(!event_ok(&meta((header + 8) as u32), header));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn init_flags_follow_the_kernel_version() {
        use super::{supported_init_flags, FAN_CLOEXEC, FAN_ENABLE_AUDIT, FAN_NONBLOCK};

        let flags = supported_init_flags();
        assert_eq!(
            flags & (FAN_CLOEXEC | FAN_NONBLOCK),
            FAN_CLOEXEC | FAN_NONBLOCK
        );
        assert_eq!(
            flags & FAN_ENABLE_AUDIT != 0,
            *crate::sys::KERNEL_VERSION >= (4, 15)
        );
    }
}
