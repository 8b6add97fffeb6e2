//! Translation between the portable [`Event`](crate::Event) vocabulary and
//! the backends' native masks
//!
//! Each backend has one translator with three operations: `to_native` builds
//! a native mask from the atoms of a portable mask, `from_native` recovers
//! portable atoms from a native mask, and `supported` enumerates the atoms
//! the backend can express. Translation is deliberately lossy in both
//! directions: atoms a backend cannot express contribute nothing to the
//! native mask, and native bits outside the vocabulary are discarded.
//!
//! For every atom in a backend's `supported()` set,
//! `from_native(to_native(atom)) == atom` holds; the tests in each module
//! pin this down.

pub(crate) mod fanotify;
pub(crate) mod inotify;
pub(crate) mod kqueue;

use crate::events::{Event, ATOMS};

/// Folds a portable mask into a native one using a per-atom code table
///
/// Atoms that have no entry in the table are silently dropped.
fn fold_to_native<M>(event: Event, table: &[(Event, M)]) -> M
where
    M: Copy + Default + std::ops::BitOr<Output = M>,
{
    let mut native = M::default();
    for atom in ATOMS {
        if event.contains(atom) {
            if let Some((_, code)) = table.iter().find(|(a, _)| *a == atom) {
                native = native | *code;
            }
        }
    }
    native
}

/// Collects the portable atoms whose native code is fully present in `mask`
///
/// Bits of `mask` not covered by the table are discarded. The result follows
/// the table's order, which every translator keeps canonical.
fn fold_from_native<M>(mask: M, table: &[(Event, M)]) -> Event
where
    M: Copy + std::ops::BitAnd<Output = M> + PartialEq,
{
    let mut event = Event::empty();
    for (atom, code) in table {
        if mask & *code == *code {
            event |= *atom;
        }
    }
    event
}

/// Unions the atoms appearing in a code table
fn table_atoms<M>(table: &[(Event, M)]) -> Event {
    table
        .iter()
        .fold(Event::empty(), |acc, (atom, _)| acc | *atom)
}
