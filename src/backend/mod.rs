//! The native backend adapters and their common dispatch surface
//!
//! Each adapter owns its notification descriptor, its watch table and its
//! pending-event queue, and drains the kernel without blocking the
//! controller API. `Backend` is the tagged union the controller dispatches
//! through; matching is exhaustive, so adding an adapter forces every
//! operation to say what it does there.

#[cfg(target_os = "linux")]
pub(crate) mod fanotify;
#[cfg(target_os = "linux")]
pub(crate) mod inotify;
#[cfg(any(
    target_os = "macos",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly",
))]
pub(crate) mod kqueue;

use std::path::Path;

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::fs_event::FileSystemEvent;
use crate::state::WatcherState;

pub(crate) enum Backend {
    #[cfg(target_os = "linux")]
    Inotify(inotify::InotifyWatcher),
    #[cfg(target_os = "linux")]
    Fanotify(fanotify::FanotifyWatcher),
    #[cfg(any(
        target_os = "macos",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly",
    ))]
    Kqueue(kqueue::KqueueWatcher),
}

impl Backend {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            #[cfg(target_os = "linux")]
            Backend::Inotify(_) => "inotify",
            #[cfg(target_os = "linux")]
            Backend::Fanotify(_) => "fanotify",
            #[cfg(any(
                target_os = "macos",
                target_os = "freebsd",
                target_os = "openbsd",
                target_os = "netbsd",
                target_os = "dragonfly",
            ))]
            Backend::Kqueue(_) => "kqueue",
        }
    }

    pub(crate) fn watch_file(&mut self, fse: &FileSystemEvent) -> Result<()> {
        match self {
            #[cfg(target_os = "linux")]
            Backend::Inotify(watcher) => watcher.watch_file(fse),
            #[cfg(target_os = "linux")]
            Backend::Fanotify(watcher) => watcher.watch_file(fse),
            #[cfg(any(
                target_os = "macos",
                target_os = "freebsd",
                target_os = "openbsd",
                target_os = "netbsd",
                target_os = "dragonfly",
            ))]
            Backend::Kqueue(watcher) => watcher.watch_file(fse),
        }
    }

    pub(crate) fn watch_directory(&mut self, fse: &FileSystemEvent) -> Result<()> {
        match self {
            #[cfg(target_os = "linux")]
            Backend::Inotify(watcher) => watcher.watch_directory(fse),
            #[cfg(target_os = "linux")]
            Backend::Fanotify(watcher) => watcher.watch_directory(fse),
            #[cfg(any(
                target_os = "macos",
                target_os = "freebsd",
                target_os = "openbsd",
                target_os = "netbsd",
                target_os = "dragonfly",
            ))]
            Backend::Kqueue(watcher) => watcher.watch_directory(fse),
        }
    }

    /// Watches the whole mount containing the path; fanotify only
    pub(crate) fn watch_mount_point(&mut self, fse: &FileSystemEvent) -> Result<()> {
        match self {
            #[cfg(target_os = "linux")]
            Backend::Fanotify(watcher) => watcher.watch_mount_point(fse),
            #[allow(unreachable_patterns)]
            _ => Err(Error::Unsupported {
                operation: "watch_mount_point",
                backend: self.name(),
            }),
        }
    }

    pub(crate) fn unwatch(&mut self, path: &Path) -> Result<()> {
        match self {
            #[cfg(target_os = "linux")]
            Backend::Inotify(watcher) => watcher.unwatch(path),
            #[cfg(target_os = "linux")]
            Backend::Fanotify(watcher) => watcher.unwatch(path),
            #[cfg(any(
                target_os = "macos",
                target_os = "freebsd",
                target_os = "openbsd",
                target_os = "netbsd",
                target_os = "dragonfly",
            ))]
            Backend::Kqueue(watcher) => watcher.unwatch(path),
        }
    }

    /// Blocks until an event is available or the watcher is stopped
    pub(crate) fn next_event(&mut self) -> Result<Option<FileSystemEvent>> {
        match self {
            #[cfg(target_os = "linux")]
            Backend::Inotify(watcher) => watcher.next_event(),
            #[cfg(target_os = "linux")]
            Backend::Fanotify(watcher) => watcher.next_event(),
            #[cfg(any(
                target_os = "macos",
                target_os = "freebsd",
                target_os = "openbsd",
                target_os = "netbsd",
                target_os = "dragonfly",
            ))]
            Backend::Kqueue(watcher) => watcher.next_event(),
        }
    }

    /// Walks the directory tree under the subscription's path and watches
    /// every regular file in it with the subscription's mask
    ///
    /// Intermediate directories get no watch of their own, so files created
    /// after this walk are not picked up. An ignored root is a silent skip;
    /// a missing or non-directory root is an error.
    pub(crate) fn watch_path_recursively(
        &mut self,
        fse: &FileSystemEvent,
        state: &WatcherState,
    ) -> Result<()> {
        if !state.check_watch_directory(fse)? {
            return Ok(());
        }

        for entry in WalkDir::new(fse.path()) {
            let entry = entry.map_err(|err| Error::Backend(err.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let child = FileSystemEvent::new(entry.path(), fse.event());
            if state.check_watch_file(&child)? {
                self.watch_file(&child)?;
            }
        }

        Ok(())
    }
}
