#![deny(missing_docs)]

//! Filesystem change notification for the Rust programming language
//!
//! # About
//!
//! fswatch lets applications subscribe to events on files and directory
//! trees — open, close, read, write, attribute change, move, create,
//! delete — and receive them as a typed stream through callbacks. Three
//! native notification mechanisms are wrapped behind one portable event
//! vocabulary:
//!
//! - **inotify** (Linux): path-scoped watches, the full vocabulary.
//! - **fanotify** (Linux): content-access events, including whole-mount
//!   watches; requires `CAP_SYS_ADMIN`.
//! - **kqueue** (macOS and the BSDs): descriptor-scoped vnode events.
//!
//! The [`NotifyController`] struct is the main entry point into the API.
//!
//! # Example
//!
//! The example uses the inotify backend and therefore runs on Linux; on the
//! kqueue platforms, substitute [`NotifyController::kqueue`].
//!
//! ```
//! # #[cfg(target_os = "linux")]
//! # fn main() {
//! use fswatch::{Event, FileSystemEvent, NotifyController};
//!
//! # use std::io::Write;
//! # let dir = tempfile::tempdir().unwrap();
//! # let path = dir.path().join("watched.txt");
//! # let mut file = std::fs::File::create(&path).unwrap();
//! #
//! let mut controller = NotifyController::inotify()
//!     .expect("Failed to initialize an inotify instance");
//!
//! controller
//!     .watch_file(FileSystemEvent::new(&path, Event::CLOSE_WRITE))
//!     .expect("Failed to add file watch")
//!     .on_event(Event::CLOSE_WRITE, |notification| {
//!         println!("{} on {:?}", notification.event(), notification.path());
//!     });
//!
//! # write!(file, "trigger a close_write").unwrap();
//! # drop(file);
//! #
//! // Deliver one event; run() would loop until stopped.
//! controller.run_once().expect("Error while delivering events");
//! # }
//! # #[cfg(not(target_os = "linux"))]
//! # fn main() {}
//! ```
//!
//! `run` blocks, so it usually lives on a worker thread; take a
//! [`ControllerHandle`] first and stop the controller from anywhere.
//!
//! # Attention: backend gotchas
//!
//! The kernel mechanisms differ in what they can express, and this wrapper
//! does not paper over that: subscription masks are translated lossily (see
//! [`Event`]), fanotify cannot report renames or deletions, and kqueue
//! approximates several event kinds with coarser vnode notes. Watch out for
//! the per-backend notes throughout this documentation, and keep the
//! respective man pages close when behavior looks surprising.

#[macro_use]
extern crate bitflags;

mod backend;
mod controller;
mod error;
mod events;
mod fs_event;
mod state;
mod sys;
mod translate;

pub use controller::{ControllerHandle, EventObserver, NotifyController};
pub use error::{Error, Result};
pub use events::Event;
pub use fs_event::{FileSystemEvent, Notification};

#[cfg(target_os = "linux")]
pub use backend::fanotify::PathResolver;
