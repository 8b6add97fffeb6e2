use crate::events::Event;
use crate::sys::inotify as ffi;

use super::{fold_from_native, fold_to_native, table_atoms};

/// Per-atom inotify codes, in canonical atom order
///
/// Inotify is the only backend that expresses the full vocabulary.
const TABLE: [(Event, u32); 12] = [
    (Event::ACCESS, ffi::IN_ACCESS),
    (Event::MODIFY, ffi::IN_MODIFY),
    (Event::ATTRIB, ffi::IN_ATTRIB),
    (Event::CLOSE_WRITE, ffi::IN_CLOSE_WRITE),
    (Event::CLOSE_NOWRITE, ffi::IN_CLOSE_NOWRITE),
    (Event::OPEN, ffi::IN_OPEN),
    (Event::MOVED_FROM, ffi::IN_MOVED_FROM),
    (Event::MOVED_TO, ffi::IN_MOVED_TO),
    (Event::CREATE, ffi::IN_CREATE),
    (Event::DELETE_SUB, ffi::IN_DELETE),
    (Event::DELETE_SELF, ffi::IN_DELETE_SELF),
    (Event::MOVE_SELF, ffi::IN_MOVE_SELF),
];

/// Builds an `inotify_add_watch` mask from the atoms of `event`
pub(crate) fn to_native(event: Event) -> u32 {
    fold_to_native(event, &TABLE)
}

/// Recovers portable atoms from a kernel event mask
///
/// Info bits (`IN_IGNORED`, `IN_ISDIR`, `IN_Q_OVERFLOW`, ...) are not part
/// of the vocabulary and are discarded; the adapter inspects them before
/// translating.
pub(crate) fn from_native(mask: u32) -> Event {
    fold_from_native(mask, &TABLE)
}

/// The atoms inotify can express
pub(crate) fn supported() -> Event {
    table_atoms(&TABLE)
}

#[cfg(test)]
mod tests {
    use super::{from_native, supported, to_native};
    use crate::events::Event;
    use crate::sys::inotify as ffi;

    #[test]
    fn supports_the_whole_vocabulary() {
        assert_eq!(supported(), Event::ALL);
    }

    #[test]
    fn every_supported_atom_round_trips() {
        for atom in supported().atoms() {
            assert_eq!(from_native(to_native(atom)), atom, "{atom}");
        }
    }

    #[test]
    fn composites_or_their_atom_codes() {
        assert_eq!(
            to_native(Event::CLOSE),
            ffi::IN_CLOSE_WRITE | ffi::IN_CLOSE_NOWRITE
        );
        assert_eq!(
            to_native(Event::OPEN | Event::MODIFY),
            ffi::IN_OPEN | ffi::IN_MODIFY
        );
    }

    #[test]
    fn unrecognized_native_bits_are_discarded() {
        assert_eq!(from_native(ffi::IN_IGNORED | ffi::IN_ISDIR), Event::empty());
        assert_eq!(
            from_native(ffi::IN_OPEN | ffi::IN_Q_OVERFLOW),
            Event::OPEN
        );
    }
}
