use std::path::{Path, PathBuf};

use crate::events::Event;

/// A subscription request or a normalized kernel event
///
/// Pairs a path with an [`Event`] mask. When passed *into* `watch_*` methods
/// the mask may be a composite (the subscription is decomposed into the atoms
/// the backend can express); when coming *out* of a backend the mask is
/// always a single atom.
///
/// A `FileSystemEvent` can be built from a bare path, in which case it
/// subscribes to [`Event::ALL`]:
///
/// ```
/// use fswatch::{Event, FileSystemEvent};
///
/// let fse = FileSystemEvent::from("/tmp/some-file");
/// assert_eq!(fse.event(), Event::ALL);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSystemEvent {
    path: PathBuf,
    event: Event,
}

impl FileSystemEvent {
    /// Creates a `FileSystemEvent` for the given path and mask
    pub fn new(path: impl Into<PathBuf>, event: Event) -> Self {
        FileSystemEvent {
            path: path.into(),
            event,
        }
    }

    /// The path this event or subscription refers to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The event mask
    pub fn event(&self) -> Event {
        self.event
    }

    pub(crate) fn into_path(self) -> PathBuf {
        self.path
    }
}

impl From<PathBuf> for FileSystemEvent {
    fn from(path: PathBuf) -> Self {
        FileSystemEvent::new(path, Event::ALL)
    }
}

impl From<&PathBuf> for FileSystemEvent {
    fn from(path: &PathBuf) -> Self {
        FileSystemEvent::new(path, Event::ALL)
    }
}

impl From<&Path> for FileSystemEvent {
    fn from(path: &Path) -> Self {
        FileSystemEvent::new(path, Event::ALL)
    }
}

impl From<&str> for FileSystemEvent {
    fn from(path: &str) -> Self {
        FileSystemEvent::new(path, Event::ALL)
    }
}

impl From<String> for FileSystemEvent {
    fn from(path: String) -> Self {
        FileSystemEvent::new(path, Event::ALL)
    }
}

/// The value delivered to observer callbacks
///
/// Carries the same information as [`FileSystemEvent`], but is kept as a
/// separate type so diagnostic fields can be added later without changing
/// what a `FileSystemEvent` means.
///
/// For an observer registered on a composite mask, `event` is the
/// *registered* mask, not the delivered atom; the unexpected-event observer
/// receives the delivered atom instead. See
/// [`NotifyController::on_event`](crate::NotifyController::on_event).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    event: Event,
    path: PathBuf,
}

impl Notification {
    pub(crate) fn new(event: Event, path: impl Into<PathBuf>) -> Self {
        Notification {
            event,
            path: path.into(),
        }
    }

    /// The event mask this notification was matched against
    pub fn event(&self) -> Event {
        self.event
    }

    /// The path the event occurred on
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::FileSystemEvent;
    use crate::events::Event;

    #[test]
    fn from_path_subscribes_to_all() {
        let fse = FileSystemEvent::from("/some/path");
        assert_eq!(fse.event(), Event::ALL);
        assert_eq!(fse.path(), std::path::Path::new("/some/path"));
    }

    #[test]
    fn new_keeps_the_given_mask() {
        let fse = FileSystemEvent::new("/some/path", Event::OPEN | Event::CLOSE);
        assert_eq!(fse.event(), Event::OPEN | Event::CLOSE);
    }
}
