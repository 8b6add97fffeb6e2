use std::env;
use std::process::exit;
use std::thread;
use std::time::Duration;

use fswatch::{Event, FileSystemEvent, NotifyController};

fn usage() -> ! {
    eprintln!("Usage: file_monitor inotify|fanotify /path/to/file");
    exit(1);
}

fn main() {
    let mut args = env::args().skip(1);
    let backend = args.next().unwrap_or_else(|| usage());
    let path = args.next().unwrap_or_else(|| usage());

    let mut controller = match backend.as_str() {
        "inotify" => NotifyController::inotify(),
        "fanotify" => NotifyController::fanotify(),
        _ => usage(),
    }
    .expect("Failed to initialize the notification backend");

    let watch_on = Event::OPEN | Event::CLOSE_WRITE;

    controller
        .watch_file(FileSystemEvent::new(&path, watch_on))
        .expect("Failed to add file watch")
        .on_events([Event::OPEN, Event::CLOSE_WRITE], |notification| {
            println!(
                "event {} on {}",
                notification.event(),
                notification.path().display()
            );
        });

    let handle = controller.handle();
    let worker = thread::spawn(move || controller.run());

    // Watch for a minute, then shut down.
    thread::sleep(Duration::from_secs(60));
    handle.stop();

    worker
        .join()
        .expect("Event loop panicked")
        .expect("Event loop failed");
}
