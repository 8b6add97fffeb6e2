use crate::events::Event;
use crate::sys::fanotify as ffi;

use super::{fold_from_native, fold_to_native, table_atoms};

/// Per-atom fanotify codes, in canonical atom order
///
/// Fanotify (in the notification class used here) only reports accesses to
/// file content: `attrib`, the move/create/delete family and the self events
/// have no code and cannot be requested through this backend.
const TABLE: [(Event, u64); 5] = [
    (Event::ACCESS, ffi::FAN_ACCESS),
    (Event::MODIFY, ffi::FAN_MODIFY),
    (Event::CLOSE_WRITE, ffi::FAN_CLOSE_WRITE),
    (Event::CLOSE_NOWRITE, ffi::FAN_CLOSE_NOWRITE),
    (Event::OPEN, ffi::FAN_OPEN),
];

/// Builds a `fanotify_mark` mask from the atoms of `event`
///
/// Atoms fanotify cannot express contribute nothing.
pub(crate) fn to_native(event: Event) -> u64 {
    fold_to_native(event, &TABLE)
}

/// Recovers portable atoms from an event-metadata mask
///
/// Fanotify ORs several occurrences into one record; the returned value can
/// therefore contain several atoms. Permission-request and overflow bits are
/// outside the vocabulary and are discarded.
pub(crate) fn from_native(mask: u64) -> Event {
    fold_from_native(mask, &TABLE)
}

/// The atoms fanotify can express
pub(crate) fn supported() -> Event {
    table_atoms(&TABLE)
}
