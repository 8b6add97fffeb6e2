//! Bindings for kqueue's vnode filter
//!
//! Kqueue watches open file descriptors rather than paths; the watcher keeps
//! one descriptor per watched file and registers an `EVFILT_VNODE` filter
//! for it. The `NOTE_*` fflags below describe what happened to the vnode.

#![allow(dead_code)]

/// Fflag: the vnode was removed
pub const NOTE_DELETE: u32 = 0x0000_0001;

/// Fflag: a write occurred on the vnode
pub const NOTE_WRITE: u32 = 0x0000_0002;

/// Fflag: the file grew
pub const NOTE_EXTEND: u32 = 0x0000_0004;

/// Fflag: attributes of the vnode changed
pub const NOTE_ATTRIB: u32 = 0x0000_0008;

/// Fflag: the link count of the vnode changed
pub const NOTE_LINK: u32 = 0x0000_0010;

/// Fflag: the vnode was renamed
pub const NOTE_RENAME: u32 = 0x0000_0020;

/// Fflag: access to the vnode was revoked
pub const NOTE_REVOKE: u32 = 0x0000_0040;

#[cfg(any(
    target_os = "macos",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly",
))]
pub use self::native::*;

#[cfg(any(
    target_os = "macos",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly",
))]
mod native {
    // The kevent structure, filter numbers and the kqueue/kevent calls vary
    // slightly across the BSDs; libc carries the per-OS definitions.
    pub use libc::{kevent, kqueue, timespec};
    pub use libc::{EVFILT_READ, EVFILT_VNODE, EV_ADD, EV_CLEAR, EV_DELETE, EV_ENABLE, EV_ERROR};
}
