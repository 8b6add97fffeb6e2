use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::error;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::events::Event;
use crate::fs_event::{FileSystemEvent, Notification};
use crate::state::WatcherState;

/// An observer callback
///
/// Held by value; a callback outlives any stack frame it was created in.
pub type EventObserver = Box<dyn FnMut(Notification) + Send>;

/// The user-facing watch and dispatch surface
///
/// A controller wraps one backend. Registration methods are fluent (they
/// return `&mut Self`, behind `Result` where they can fail), so a complete
/// subscription reads as one chain (inotify shown; on the kqueue platforms
/// construct with [`NotifyController::kqueue`] instead):
///
/// ```no_run
/// use fswatch::{Event, FileSystemEvent, NotifyController};
///
/// # #[cfg(target_os = "linux")]
/// # fn main() -> fswatch::Result<()> {
/// let mut controller = NotifyController::inotify()?;
/// controller
///     .watch_file(FileSystemEvent::new("/tmp/watched", Event::CLOSE_WRITE))?
///     .on_event(Event::CLOSE_WRITE, |notification| {
///         println!("{} on {:?}", notification.event(), notification.path());
///     });
///
/// controller.run()?;
/// # Ok(())
/// # }
/// # #[cfg(not(target_os = "linux"))]
/// # fn main() {}
/// ```
///
/// `run` blocks; it is meant to live on a worker thread. Cross-thread
/// control goes through a [`ControllerHandle`] taken *before* the controller
/// moves to that thread:
///
/// ```
/// use fswatch::NotifyController;
///
/// # #[cfg(target_os = "linux")]
/// # fn main() -> fswatch::Result<()> {
/// let mut controller = NotifyController::inotify()?;
/// let handle = controller.handle();
///
/// let worker = std::thread::spawn(move || controller.run());
///
/// handle.stop();
/// worker.join().unwrap()?;
/// # Ok(())
/// # }
/// # #[cfg(not(target_os = "linux"))]
/// # fn main() {}
/// ```
///
/// Observers can only be registered through `&mut self`, so re-configuring
/// a controller while `run` borrows it is rejected at compile time.
pub struct NotifyController {
    backend: Backend,
    state: Arc<WatcherState>,
    observers: BTreeMap<Event, EventObserver>,
    unexpected: Option<EventObserver>,
}

impl NotifyController {
    /// Creates a controller over the inotify backend
    #[cfg(target_os = "linux")]
    pub fn inotify() -> Result<Self> {
        let state = Arc::new(WatcherState::new()?);
        let backend = Backend::Inotify(crate::backend::inotify::InotifyWatcher::new(state.clone())?);
        Ok(Self::with_backend(backend, state))
    }

    /// Creates a controller over the fanotify backend
    ///
    /// Fanotify requires `CAP_SYS_ADMIN`; without it this fails with
    /// [`Error::Backend`] wrapping `EPERM`.
    #[cfg(target_os = "linux")]
    pub fn fanotify() -> Result<Self> {
        let state = Arc::new(WatcherState::new()?);
        let backend =
            Backend::Fanotify(crate::backend::fanotify::FanotifyWatcher::new(state.clone())?);
        Ok(Self::with_backend(backend, state))
    }

    /// Creates a fanotify controller with a custom descriptor-to-path
    /// resolver, replacing the procfs default
    #[cfg(target_os = "linux")]
    pub fn fanotify_with_resolver(
        resolver: Box<dyn crate::backend::fanotify::PathResolver>,
    ) -> Result<Self> {
        let state = Arc::new(WatcherState::new()?);
        let backend = Backend::Fanotify(crate::backend::fanotify::FanotifyWatcher::with_resolver(
            state.clone(),
            resolver,
        )?);
        Ok(Self::with_backend(backend, state))
    }

    /// Creates a controller over the kqueue backend
    #[cfg(any(
        target_os = "macos",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly",
    ))]
    pub fn kqueue() -> Result<Self> {
        let state = Arc::new(WatcherState::new()?);
        let backend = Backend::Kqueue(crate::backend::kqueue::KqueueWatcher::new(state.clone())?);
        Ok(Self::with_backend(backend, state))
    }

    fn with_backend(backend: Backend, state: Arc<WatcherState>) -> Self {
        NotifyController {
            backend,
            state,
            observers: BTreeMap::new(),
            unexpected: None,
        }
    }

    /// Name of the backend this controller dispatches to
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// A cloneable handle for controlling this controller from other threads
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            state: self.state.clone(),
        }
    }

    /// Subscribes to events on a single regular file
    ///
    /// The subscription mask may be a composite; atoms the backend cannot
    /// express are dropped, and a mask with no expressible atom at all fails
    /// with [`Error::UnsupportedEvent`]. A permanently ignored path is
    /// skipped without error.
    pub fn watch_file(&mut self, fse: impl Into<FileSystemEvent>) -> Result<&mut Self> {
        self.ensure_not_stopped()?;
        self.backend.watch_file(&fse.into())?;
        Ok(self)
    }

    /// Subscribes to events on a directory (not its subtree)
    pub fn watch_directory(&mut self, fse: impl Into<FileSystemEvent>) -> Result<&mut Self> {
        self.ensure_not_stopped()?;
        self.backend.watch_directory(&fse.into())?;
        Ok(self)
    }

    /// Subscribes to events on every regular file below a directory
    ///
    /// Walks the tree depth-first and installs one file watch per entry.
    /// Files created after the walk are not picked up.
    pub fn watch_path_recursively(&mut self, fse: impl Into<FileSystemEvent>) -> Result<&mut Self> {
        self.ensure_not_stopped()?;
        self.backend.watch_path_recursively(&fse.into(), &self.state)?;
        Ok(self)
    }

    /// Subscribes to events on the whole mount containing the path
    ///
    /// Only the fanotify backend can do this; elsewhere it fails with
    /// [`Error::Unsupported`].
    pub fn watch_mount_point(&mut self, fse: impl Into<FileSystemEvent>) -> Result<&mut Self> {
        self.ensure_not_stopped()?;
        self.backend.watch_mount_point(&fse.into())?;
        Ok(self)
    }

    /// Removes the watch on exactly this path; not recursive
    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        self.ensure_not_stopped()?;
        self.backend.unwatch(path.as_ref())?;
        Ok(self)
    }

    /// Drops every future event on this path
    pub fn ignore(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.state.ignore(path);
        self
    }

    /// Drops the next event on this path, then expires
    pub fn ignore_once(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.state.ignore_once(path);
        self
    }

    /// Registers `observer` for `event`, replacing any previous registration
    /// under the same mask
    ///
    /// A composite mask matches every delivered atom it contains: an
    /// observer on [`Event::CLOSE`] fires for `close_write` and
    /// `close_nowrite` alike, and its [`Notification`] carries the
    /// registered mask, not the atom.
    pub fn on_event(
        &mut self,
        event: Event,
        observer: impl FnMut(Notification) + Send + 'static,
    ) -> &mut Self {
        self.observers.insert(event, Box::new(observer));
        self
    }

    /// Registers the same callback for every mask in `events`
    pub fn on_events(
        &mut self,
        events: impl IntoIterator<Item = Event>,
        observer: impl Fn(Notification) + Send + Clone + 'static,
    ) -> &mut Self {
        for event in events {
            let observer = observer.clone();
            self.observers.insert(event, Box::new(observer));
        }
        self
    }

    /// Registers the fallback observer for events no registration matches
    ///
    /// The fallback sees the delivered atom. It is also invoked (with the
    /// event that was being delivered) when a regular observer panics.
    pub fn on_unexpected_event(
        &mut self,
        observer: impl FnMut(Notification) + Send + 'static,
    ) -> &mut Self {
        self.unexpected = Some(Box::new(observer));
        self
    }

    /// Adjusts the fallback wake-up cadence of the blocking drain
    ///
    /// Defaults to 250 ms. `stop()` normally interrupts the drain
    /// immediately; this cadence only bounds the latency when that wake-up
    /// is missed.
    pub fn thread_sleep(&mut self, cadence: Duration) -> &mut Self {
        self.state.set_sleep(cadence);
        self
    }

    /// Delivers exactly one event, blocking until one arrives or the
    /// controller is stopped
    ///
    /// Matching observers — those whose registered mask contains the
    /// delivered atom — are invoked in ascending canonical event order. When
    /// none match, the unexpected-event observer is invoked if present;
    /// otherwise the event is dropped. Returns without delivering anything
    /// once the controller is stopped.
    pub fn run_once(&mut self) -> Result<()> {
        let event = match self.backend.next_event() {
            Ok(Some(event)) => event,
            Ok(None) => return Ok(()),
            Err(err) => {
                // A failing drain cannot make progress; stop and surface.
                self.state.stop();
                return Err(err);
            }
        };

        let atom = event.event();
        let path = event.into_path();

        let mut delivered = false;
        for (mask, observer) in self.observers.iter_mut() {
            if *mask & atom == atom {
                delivered = true;
                let notification = Notification::new(*mask, path.clone());
                if let Err(panic) =
                    panic::catch_unwind(AssertUnwindSafe(|| observer(notification)))
                {
                    report_observer_panic(&mut self.unexpected, atom, &path, panic);
                }
            }
        }

        if !delivered {
            if let Some(observer) = self.unexpected.as_mut() {
                let notification = Notification::new(atom, path.clone());
                if let Err(panic) =
                    panic::catch_unwind(AssertUnwindSafe(|| observer(notification)))
                {
                    error!(
                        "unexpected-event observer panicked on {} for {:?}: {}",
                        atom,
                        path,
                        panic_message(panic.as_ref())
                    );
                }
            }
        }

        Ok(())
    }

    /// Delivers events until the controller is stopped
    ///
    /// Observers may call [`ControllerHandle::stop`] from inside their
    /// callback; the event being delivered is then still delivered in full
    /// before the loop exits. Events remaining in the queue after a stop are
    /// dropped.
    pub fn run(&mut self) -> Result<()> {
        while !self.state.is_stopped() {
            self.run_once()?;
        }
        Ok(())
    }

    /// Requests cooperative termination
    pub fn stop(&self) {
        self.state.stop();
    }

    fn ensure_not_stopped(&self) -> Result<()> {
        if self.state.is_stopped() {
            return Err(Error::InvalidState);
        }
        Ok(())
    }
}

/// Reports a panicking observer through the fallback observer, if any
fn report_observer_panic(
    unexpected: &mut Option<EventObserver>,
    atom: Event,
    path: &Path,
    panic: Box<dyn std::any::Any + Send>,
) {
    error!(
        "observer panicked on {} for {:?}: {}",
        atom,
        path,
        panic_message(panic.as_ref())
    );

    if let Some(observer) = unexpected.as_mut() {
        let notification = Notification::new(atom, path);
        // The fallback may panic too; that one is only logged.
        if panic::catch_unwind(AssertUnwindSafe(|| observer(notification))).is_err() {
            error!("unexpected-event observer panicked while reporting an observer panic");
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Cross-thread control for a running [`NotifyController`]
///
/// Obtained from [`NotifyController::handle`] before the controller moves to
/// its run thread. Handles are cheap to clone and share the controller's
/// state; stopping through any of them stops the one controller.
#[derive(Clone)]
pub struct ControllerHandle {
    state: Arc<WatcherState>,
}

impl ControllerHandle {
    /// Requests cooperative termination
    ///
    /// The run loop finishes delivering the event currently in flight, then
    /// exits. Blocking drains are woken immediately.
    pub fn stop(&self) {
        self.state.stop();
    }

    /// Returns `true` once the controller has been stopped
    pub fn is_stopped(&self) -> bool {
        self.state.is_stopped()
    }

    /// Drops every future event on this path
    pub fn ignore(&self, path: impl Into<PathBuf>) {
        self.state.ignore(path);
    }

    /// Drops the next event on this path, then expires
    pub fn ignore_once(&self, path: impl Into<PathBuf>) {
        self.state.ignore_once(path);
    }
}
