use std::io;
use std::path::PathBuf;

use crate::events::Event;

/// Convenience alias for results produced by this crate
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for watch registration and event dispatch
///
/// Everything that can go wrong is surfaced as one of these variants; no
/// failure is swallowed. `watch_*` failures are recoverable (the controller
/// stays usable), while an error escaping the drain loop stops the
/// controller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The path given to a `watch_*` call does not exist
    #[error("cannot watch {path:?}: path does not exist")]
    PathMissing {
        /// The offending path
        path: PathBuf,
    },

    /// The path given to `watch_file` is not a regular file
    #[error("cannot watch {path:?}: not a regular file")]
    NotAFile {
        /// The offending path
        path: PathBuf,
    },

    /// The path given to `watch_directory` or `watch_path_recursively` is
    /// not a directory
    #[error("cannot watch {path:?}: not a directory")]
    NotADirectory {
        /// The offending path
        path: PathBuf,
    },

    /// The kernel refused the watch because a per-user limit was hit
    #[error(
        "cannot watch {path:?}: kernel watch limit reached; please increase \
         /proc/sys/fs/inotify/max_user_watches"
    )]
    KernelLimit {
        /// The path whose registration hit the limit
        path: PathBuf,
        /// The underlying error, usually ENOSPC
        source: io::Error,
    },

    /// The requested mask contains only atoms the backend cannot express
    ///
    /// A mask that mixes supported and unsupported atoms is accepted (the
    /// unsupported part is silently dropped); failing here prevents a watch
    /// that could never deliver anything.
    #[error("the {backend} backend supports none of the requested events ({requested})")]
    UnsupportedEvent {
        /// The requested mask
        requested: Event,
        /// Name of the backend that rejected it
        backend: &'static str,
    },

    /// The operation is not available on this backend
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        /// The rejected operation
        operation: &'static str,
        /// Name of the backend
        backend: &'static str,
    },

    /// The controller was already stopped
    #[error("the controller has been stopped")]
    InvalidState,

    /// Any other native failure
    #[error("native backend error: {0}")]
    Backend(#[from] io::Error),
}

impl Error {
    /// Classifies an `inotify_add_watch`-style failure for `path`
    pub(crate) fn from_watch_errno(path: PathBuf, err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::ENOSPC) => Error::KernelLimit { path, source: err },
            _ => Error::Backend(err),
        }
    }
}
