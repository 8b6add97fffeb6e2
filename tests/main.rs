#![cfg(target_os = "linux")]

// End-to-end scenarios against the inotify backend. Fanotify needs
// CAP_SYS_ADMIN and is exercised by its unit tests instead.

use fswatch::{Error, Event, FileSystemEvent, Notification, NotifyController};

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(1);
const GRACE: Duration = Duration::from_millis(300);

#[test]
fn it_should_deliver_close_write_for_a_watched_file() {
    let mut testdir = TestDir::new();
    let (path, _) = testdir.new_file();

    let mut controller = NotifyController::inotify().unwrap();
    let (tx, rx) = mpsc::channel();

    controller
        .watch_file(FileSystemEvent::new(&path, Event::CLOSE_WRITE))
        .unwrap()
        .on_event(Event::CLOSE_WRITE, move |notification| {
            let _ = tx.send(notification);
        });

    let handle = controller.handle();
    let worker = thread::spawn(move || controller.run());

    write_and_close(&path);

    let notification = rx.recv_timeout(TIMEOUT).expect("expected a close_write");
    assert_eq!(notification.event(), Event::CLOSE_WRITE);
    assert_eq!(notification.path(), path);

    handle.stop();
    worker.join().unwrap().unwrap();
}

#[test]
fn it_should_deliver_open_before_close_write() {
    let mut testdir = TestDir::new();
    let (path, _) = testdir.new_file();

    let mut controller = NotifyController::inotify().unwrap();
    let (tx, rx) = mpsc::channel();

    let watch_on = Event::OPEN | Event::CLOSE_WRITE;
    assert_eq!(watch_on & Event::CLOSE_WRITE, Event::CLOSE_WRITE);
    assert_eq!(watch_on & Event::OPEN, Event::OPEN);
    assert_ne!(watch_on & Event::MOVED_FROM, Event::MOVED_FROM);

    controller
        .watch_file(FileSystemEvent::new(&path, watch_on))
        .unwrap()
        .on_events([Event::OPEN, Event::CLOSE_WRITE], move |notification| {
            let _ = tx.send(notification);
        });

    let handle = controller.handle();
    let worker = thread::spawn(move || controller.run());

    write_and_close(&path);

    let first = rx.recv_timeout(TIMEOUT).expect("expected an open");
    assert_eq!(first.event(), Event::OPEN);
    let second = rx.recv_timeout(TIMEOUT).expect("expected a close_write");
    assert_eq!(second.event(), Event::CLOSE_WRITE);

    handle.stop();
    worker.join().unwrap().unwrap();
}

#[test]
fn it_should_not_deliver_events_for_permanently_ignored_paths() {
    let mut testdir = TestDir::new();
    let (path, _) = testdir.new_file();

    let mut controller = NotifyController::inotify().unwrap();
    let (tx, rx) = mpsc::channel::<Notification>();

    controller
        .ignore(&path)
        .watch_file(FileSystemEvent::new(&path, Event::CLOSE))
        .unwrap()
        .on_event(Event::CLOSE, move |notification| {
            let _ = tx.send(notification);
        });

    let handle = controller.handle();
    let worker = thread::spawn(move || controller.run());

    write_and_close(&path);
    write_and_close(&path);

    assert!(rx.recv_timeout(TIMEOUT).is_err());

    handle.stop();
    worker.join().unwrap().unwrap();
}

#[test]
fn it_should_consume_an_ignore_once_entry_exactly_once() {
    let mut testdir = TestDir::new();
    let (path, _) = testdir.new_file();

    let mut controller = NotifyController::inotify().unwrap();
    let (tx, rx) = mpsc::channel();

    controller
        .watch_file(FileSystemEvent::new(&path, Event::OPEN))
        .unwrap()
        .ignore_once(&path)
        .on_event(Event::OPEN, move |notification| {
            let _ = tx.send(notification);
        });

    let handle = controller.handle();
    let worker = thread::spawn(move || controller.run());

    open_and_close(&path);
    thread::sleep(GRACE);
    open_and_close(&path);

    // The first open is suppressed, the second one arrives.
    assert!(rx.recv_timeout(TIMEOUT).is_ok());
    assert!(rx.recv_timeout(GRACE).is_err());

    handle.stop();
    worker.join().unwrap().unwrap();
}

#[test]
fn it_should_stay_silent_after_unwatch() {
    let mut testdir = TestDir::new();
    let (path, _) = testdir.new_file();

    let mut controller = NotifyController::inotify().unwrap();
    let (tx, rx) = mpsc::channel::<Notification>();

    controller
        .watch_file(&path)
        .unwrap()
        .unwatch(&path)
        .unwrap()
        .on_event(Event::ALL, move |notification| {
            let _ = tx.send(notification);
        });

    let handle = controller.handle();
    let worker = thread::spawn(move || controller.run());

    open_and_close(&path);

    assert!(rx.recv_timeout(TIMEOUT).is_err());

    handle.stop();
    worker.join().unwrap().unwrap();
}

#[test]
fn it_should_fall_back_to_the_unexpected_event_observer() {
    let mut testdir = TestDir::new();
    let (path, _) = testdir.new_file();

    let mut controller = NotifyController::inotify().unwrap();
    let (tx, rx) = mpsc::channel();

    controller
        .watch_file(FileSystemEvent::new(&path, Event::OPEN))
        .unwrap()
        .on_unexpected_event(move |notification| {
            let _ = tx.send(notification);
        });

    let handle = controller.handle();
    let worker = thread::spawn(move || controller.run());

    open_and_close(&path);

    let notification = rx.recv_timeout(TIMEOUT).expect("expected the fallback");
    assert_eq!(notification.event(), Event::OPEN);
    assert!(rx.recv_timeout(GRACE).is_err());

    handle.stop();
    worker.join().unwrap().unwrap();
}

#[test]
fn it_should_deliver_the_registered_composite_to_the_observer() {
    let mut testdir = TestDir::new();
    let (path, _) = testdir.new_file();

    let mut controller = NotifyController::inotify().unwrap();
    let (tx, rx) = mpsc::channel();

    controller
        .watch_file(FileSystemEvent::new(&path, Event::CLOSE))
        .unwrap()
        .on_event(Event::CLOSE, move |notification| {
            let _ = tx.send(notification);
        });

    let handle = controller.handle();
    let worker = thread::spawn(move || controller.run());

    write_and_close(&path);

    // A close_write atom arrives, but the observer was registered on the
    // composite and sees that composite.
    let notification = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(notification.event(), Event::CLOSE);
    assert_eq!(notification.path(), path);

    handle.stop();
    worker.join().unwrap().unwrap();
}

#[test]
fn it_should_invoke_overlapping_observers_in_canonical_order() {
    let mut testdir = TestDir::new();
    let (path, _) = testdir.new_file();

    let mut controller = NotifyController::inotify().unwrap();
    let (tx, rx) = mpsc::channel();
    let tx2 = tx.clone();

    controller
        .watch_file(FileSystemEvent::new(&path, Event::CLOSE_WRITE))
        .unwrap()
        .on_event(Event::CLOSE_WRITE, move |notification| {
            let _ = tx.send(notification.event());
        })
        .on_event(Event::CLOSE, move |notification| {
            let _ = tx2.send(notification.event());
        });

    let handle = controller.handle();
    let worker = thread::spawn(move || controller.run());

    write_and_close(&path);

    // Both registrations match the close_write atom; the atom-keyed one
    // sorts below the composite and fires first.
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Event::CLOSE_WRITE);
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Event::CLOSE);

    handle.stop();
    worker.join().unwrap().unwrap();
}

#[test]
fn it_should_observe_stop_with_bounded_latency() {
    let mut testdir = TestDir::new();
    let (path, _) = testdir.new_file();

    let mut controller = NotifyController::inotify().unwrap();
    controller
        .thread_sleep(Duration::from_millis(100))
        .watch_file(&path)
        .unwrap();

    let handle = controller.handle();
    let worker = thread::spawn(move || controller.run());

    // Give the loop time to enter its blocking wait.
    thread::sleep(Duration::from_millis(100));

    let stopped_at = Instant::now();
    handle.stop();
    worker.join().unwrap().unwrap();

    // The wake pipe makes this near-immediate; the 250 ms poll cadence is
    // the fallback bound.
    assert!(stopped_at.elapsed() < Duration::from_millis(500));
}

#[test]
fn it_should_keep_running_when_an_observer_panics() {
    let mut testdir = TestDir::new();
    let (path, _) = testdir.new_file();

    let mut controller = NotifyController::inotify().unwrap();
    let (tx, rx) = mpsc::channel();

    controller
        .watch_file(FileSystemEvent::new(&path, Event::OPEN))
        .unwrap()
        .on_event(Event::OPEN, |_| panic!("observer failure"))
        .on_unexpected_event(move |notification| {
            let _ = tx.send(notification);
        });

    let handle = controller.handle();
    let worker = thread::spawn(move || controller.run());

    open_and_close(&path);

    // The panic is caught and reported through the fallback observer.
    let reported = rx.recv_timeout(TIMEOUT).expect("expected a panic report");
    assert_eq!(reported.event(), Event::OPEN);

    // The loop survived; a later event is still delivered (and reported the
    // same way, since the observer keeps panicking).
    open_and_close(&path);
    assert!(rx.recv_timeout(TIMEOUT).is_ok());

    handle.stop();
    worker.join().unwrap().unwrap();
}

#[test]
fn it_should_not_accept_missing_paths() {
    let mut controller = NotifyController::inotify().unwrap();

    let result = controller.watch_file("/not/existing/file");
    assert!(matches!(result, Err(Error::PathMissing { .. })));

    let result = controller.watch_path_recursively("/not/existing/path/");
    assert!(matches!(result, Err(Error::PathMissing { .. })));
}

#[test]
fn it_should_not_watch_a_directory_as_a_file() {
    let testdir = TestDir::new();

    let mut controller = NotifyController::inotify().unwrap();
    let result = controller.watch_file(testdir.path());
    assert!(matches!(result, Err(Error::NotAFile { .. })));
}

#[test]
fn it_should_not_watch_a_file_as_a_directory() {
    let mut testdir = TestDir::new();
    let (path, _) = testdir.new_file();

    let mut controller = NotifyController::inotify().unwrap();
    let result = controller.watch_path_recursively(&path);
    assert!(matches!(result, Err(Error::NotADirectory { .. })));
}

#[test]
fn it_should_reject_a_mask_with_no_expressible_atom() {
    let mut testdir = TestDir::new();
    let (path, _) = testdir.new_file();

    let mut controller = NotifyController::inotify().unwrap();
    let result = controller.watch_file(FileSystemEvent::new(&path, Event::empty()));
    assert!(matches!(result, Err(Error::UnsupportedEvent { .. })));
}

#[test]
fn it_should_reject_mount_watches_on_inotify() {
    let testdir = TestDir::new();

    let mut controller = NotifyController::inotify().unwrap();
    let result = controller.watch_mount_point(testdir.path());
    assert!(matches!(result, Err(Error::Unsupported { .. })));
}

#[test]
fn it_should_reject_watches_after_stop() {
    let mut testdir = TestDir::new();
    let (path, _) = testdir.new_file();

    let mut controller = NotifyController::inotify().unwrap();
    controller.stop();

    assert!(matches!(
        controller.watch_file(&path),
        Err(Error::InvalidState)
    ));
    assert!(matches!(
        controller.unwatch(&path),
        Err(Error::InvalidState)
    ));
}

#[test]
fn it_should_accept_a_recursive_watch_on_an_empty_directory() {
    let testdir = TestDir::new();
    let empty = testdir.new_directory("empty");

    let mut controller = NotifyController::inotify().unwrap();
    controller.watch_path_recursively(&empty).unwrap();
}

#[test]
fn it_should_watch_every_file_below_a_directory() {
    let mut testdir = TestDir::new();
    let (path_a, _) = testdir.new_file();
    let subdir = testdir.new_directory("sub");
    let path_b = subdir.join("nested.txt");
    File::create(&path_b).unwrap();

    let mut controller = NotifyController::inotify().unwrap();
    let (tx, rx) = mpsc::channel();

    controller
        .watch_path_recursively(FileSystemEvent::new(testdir.path(), Event::OPEN))
        .unwrap()
        .on_event(Event::OPEN, move |notification| {
            let _ = tx.send(notification.path().to_path_buf());
        });

    let handle = controller.handle();
    let worker = thread::spawn(move || controller.run());

    open_and_close(&path_a);
    open_and_close(&path_b);

    let mut seen = vec![
        rx.recv_timeout(TIMEOUT).unwrap(),
        rx.recv_timeout(TIMEOUT).unwrap(),
    ];
    seen.sort();
    let mut expected = vec![path_a, path_b];
    expected.sort();
    assert_eq!(seen, expected);

    handle.stop();
    worker.join().unwrap().unwrap();
}

#[test]
fn it_should_not_pick_up_files_created_after_the_recursive_walk() {
    let mut testdir = TestDir::new();
    let (existing, _) = testdir.new_file();

    let mut controller = NotifyController::inotify().unwrap();
    let (tx, rx) = mpsc::channel();

    controller
        .watch_path_recursively(FileSystemEvent::new(testdir.path(), Event::OPEN))
        .unwrap()
        .on_event(Event::OPEN, move |notification| {
            let _ = tx.send(notification.path().to_path_buf());
        });

    let handle = controller.handle();
    let worker = thread::spawn(move || controller.run());

    let latecomer = testdir.path().join("latecomer.txt");
    File::create(&latecomer).unwrap();

    open_and_close(&latecomer);
    open_and_close(&existing);

    // Only the file that existed during the walk is watched.
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), existing);
    assert!(rx.recv_timeout(GRACE).is_err());

    handle.stop();
    worker.join().unwrap().unwrap();
}

#[test]
fn it_should_skip_a_permanently_ignored_recursive_root_silently() {
    let testdir = TestDir::new();
    let dir = testdir.new_directory("ignored");

    let mut controller = NotifyController::inotify().unwrap();
    controller.ignore(&dir);
    controller.watch_path_recursively(&dir).unwrap();
}

struct TestDir {
    dir: TempDir,
    counter: u32,
}

impl TestDir {
    fn new() -> TestDir {
        TestDir {
            dir: TempDir::new().unwrap(),
            counter: 0,
        }
    }

    fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    fn new_file(&mut self) -> (PathBuf, File) {
        let id = self.counter;
        self.counter += 1;

        let path = self.dir.path().join("file-".to_string() + &id.to_string());
        let file = File::create(&path)
            .unwrap_or_else(|error| panic!("Failed to create temporary file: {}", error));

        (path, file)
    }

    fn new_directory(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::create_dir(&path).unwrap();
        path
    }
}

fn write_and_close(path: &std::path::Path) {
    let mut file = File::options().write(true).open(path).unwrap();
    file.write_all(b"This should trigger a notification.")
        .unwrap();
}

fn open_and_close(path: &std::path::Path) {
    let file = File::open(path).unwrap();
    drop(file);
}
