//! Bindings for inotify
//!
//! There are three groups of statics: __flags__, passed to
//! `inotify_init1()`; __events__, which describe what to watch for (when
//! calling `inotify_add_watch()`) and what occurred (when returned by
//! `read()`); and __infos__, carrying further details of a returned event.
//!
//! Event records are variable-length: a fixed [`inotify_event`] header
//! followed by `len` bytes of NUL-padded name.

#![allow(dead_code)]

use libc::{c_char, c_int};

/// Flag: set the FD_CLOEXEC flag on the new file descriptor
pub const IN_CLOEXEC: c_int = 0o2000000;

/// Flag: set the O_NONBLOCK file status flag on the new file descriptor
pub const IN_NONBLOCK: c_int = 0o4000;

/// Event: file was accessed
pub const IN_ACCESS: u32 = 0x0000_0001;

/// Event: file was modified
pub const IN_MODIFY: u32 = 0x0000_0002;

/// Event: metadata has changed
pub const IN_ATTRIB: u32 = 0x0000_0004;

/// Event: file opened for writing was closed
pub const IN_CLOSE_WRITE: u32 = 0x0000_0008;

/// Event: file not opened for writing was closed
pub const IN_CLOSE_NOWRITE: u32 = 0x0000_0010;

/// Event: file was opened
pub const IN_OPEN: u32 = 0x0000_0020;

/// Event: file was moved out of a watched directory
pub const IN_MOVED_FROM: u32 = 0x0000_0040;

/// Event: file was moved into a watched directory
pub const IN_MOVED_TO: u32 = 0x0000_0080;

/// Event: file or directory was created in a watched directory
pub const IN_CREATE: u32 = 0x0000_0100;

/// Event: file or directory was deleted from a watched directory
pub const IN_DELETE: u32 = 0x0000_0200;

/// Event: the watched file or directory itself was deleted
///
/// An IN_IGNORED event will subsequently be generated.
pub const IN_DELETE_SELF: u32 = 0x0000_0400;

/// Event: the watched file or directory itself was moved
pub const IN_MOVE_SELF: u32 = 0x0000_0800;

/// Info: filesystem containing the watched object was unmounted
pub const IN_UNMOUNT: u32 = 0x0000_2000;

/// Info: the kernel event queue overflowed
pub const IN_Q_OVERFLOW: u32 = 0x0000_4000;

/// Info: the watch was removed
///
/// Generated by `inotify_rm_watch()`, or when the watched object is deleted
/// or its filesystem is unmounted.
pub const IN_IGNORED: u32 = 0x0000_8000;

/// Info: subject of this event is a directory
pub const IN_ISDIR: u32 = 0x4000_0000;

/// Describes an event read from an inotify file descriptor
///
/// Each successful `read()` returns a buffer containing one or more of this
/// structure, each followed by `len` bytes of name.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct inotify_event {
    /// The watch descriptor this event occurred on
    pub wd: c_int,

    /// Bits describing the event
    pub mask: u32,

    /// Connects the two halves of a rename; 0 otherwise
    pub cookie: u32,

    /// Byte length of the name following this header, including NUL padding
    pub len: u32,
}

#[cfg(target_os = "linux")]
extern "C" {
    /// Creates an inotify instance with the given flags
    pub fn inotify_init1(flags: c_int) -> c_int;

    /// Adds a watch to, or updates a watch on, an inotify instance
    pub fn inotify_add_watch(fd: c_int, pathname: *const c_char, mask: u32) -> c_int;

    /// Removes a watch from an inotify instance
    pub fn inotify_rm_watch(fd: c_int, wd: c_int) -> c_int;
}
