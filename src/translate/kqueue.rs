use crate::events::Event;
use crate::sys::kqueue as ffi;

use super::{fold_from_native, fold_to_native, table_atoms};

/// Per-atom vnode fflags accepted in subscription masks
///
/// Kqueue's vnode filter is coarser than the vocabulary, so several rows are
/// approximations that share a native bit:
///
/// - `ACCESS` maps to `NOTE_WRITE`: the filter has no read notification, so
///   a write note is the closest observable signal.
/// - `MOVED_FROM` and `MOVED_TO` map to `NOTE_RENAME`: a descriptor-scoped
///   watch cannot tell the two directions apart.
/// - `DELETE_SUB` maps to `NOTE_DELETE`: the filter watches the vnode
///   itself, not directory entries.
const REQUEST_TABLE: [(Event, u32); 8] = [
    (Event::ACCESS, ffi::NOTE_WRITE),
    (Event::MODIFY, ffi::NOTE_WRITE),
    (Event::ATTRIB, ffi::NOTE_ATTRIB),
    (Event::MOVED_FROM, ffi::NOTE_RENAME),
    (Event::MOVED_TO, ffi::NOTE_RENAME),
    (Event::DELETE_SUB, ffi::NOTE_DELETE),
    (Event::DELETE_SELF, ffi::NOTE_DELETE),
    (Event::MOVE_SELF, ffi::NOTE_RENAME),
];

/// Per-fflag atoms for incoming events
///
/// One atom per native bit, so translation of a delivered note is
/// unambiguous: a shared request bit always comes back as the atom that
/// describes what happened to the watched vnode itself.
const DELIVERY_TABLE: [(Event, u32); 4] = [
    (Event::MODIFY, ffi::NOTE_WRITE),
    (Event::ATTRIB, ffi::NOTE_ATTRIB),
    (Event::DELETE_SELF, ffi::NOTE_DELETE),
    (Event::MOVE_SELF, ffi::NOTE_RENAME),
];

/// Builds `EVFILT_VNODE` fflags from the atoms of `event`
///
/// Approximated atoms (see [`REQUEST_TABLE`]) are accepted; atoms with no
/// row (`open`, `close_*`, `create`) contribute nothing.
pub(crate) fn to_native(event: Event) -> u32 {
    fold_to_native(event, &REQUEST_TABLE)
}

/// Recovers portable atoms from delivered fflags
pub(crate) fn from_native(fflags: u32) -> Event {
    fold_from_native(fflags, &DELIVERY_TABLE)
}

/// The atoms kqueue can express faithfully
///
/// Only atoms whose native bit is not shared qualify; the approximated rows
/// of [`REQUEST_TABLE`] can be requested but are delivered as one of these.
pub(crate) fn supported() -> Event {
    table_atoms(&DELIVERY_TABLE)
}
