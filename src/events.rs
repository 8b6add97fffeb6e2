use std::fmt;

bitflags! {
    /// Describes what kind of filesystem occurrence an event or a
    /// subscription refers to
    ///
    /// `Event` is a set of flags. Single flags ("atoms") describe one kind of
    /// occurrence, like a file being opened or modified. Flags can be
    /// combined with `|` to form a subscription mask, and a combined value
    /// can be tested with `&`.
    ///
    /// Backends translate these portable flags into whatever their native
    /// notification mechanism understands; see the crate documentation for
    /// which backend supports which flags.
    ///
    /// # Examples
    ///
    /// ```
    /// use fswatch::Event;
    ///
    /// let mask = Event::OPEN | Event::CLOSE_WRITE;
    ///
    /// assert!(mask.contains(Event::OPEN));
    /// assert_eq!(mask & Event::CLOSE_WRITE, Event::CLOSE_WRITE);
    /// ```
    #[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
    pub struct Event: u64 {
        /// File was accessed
        const ACCESS = 1 << 0;

        /// File was modified
        const MODIFY = 1 << 1;

        /// Metadata (permissions, timestamps, ...) changed
        const ATTRIB = 1 << 2;

        /// File opened for writing was closed
        const CLOSE_WRITE = 1 << 3;

        /// File not opened for writing was closed
        const CLOSE_NOWRITE = 1 << 4;

        /// File was opened
        const OPEN = 1 << 5;

        /// File was moved out of a watched directory
        const MOVED_FROM = 1 << 6;

        /// File was moved into a watched directory
        const MOVED_TO = 1 << 7;

        /// File or directory was created in a watched directory
        const CREATE = 1 << 8;

        /// File or directory was deleted from a watched directory
        ///
        /// Rendered as `delete` by [`Event`]'s `Display` implementation.
        const DELETE_SUB = 1 << 9;

        /// The watched file or directory itself was deleted
        const DELETE_SELF = 1 << 10;

        /// The watched file or directory itself was moved
        const MOVE_SELF = 1 << 11;

        /// Any close event
        ///
        /// This constant is simply a convenient combination of
        /// [`CLOSE_WRITE`](Self::CLOSE_WRITE) and
        /// [`CLOSE_NOWRITE`](Self::CLOSE_NOWRITE).
        const CLOSE = Self::CLOSE_WRITE.bits() | Self::CLOSE_NOWRITE.bits();

        /// Any move event
        ///
        /// This constant is simply a convenient combination of
        /// [`MOVED_FROM`](Self::MOVED_FROM) and
        /// [`MOVED_TO`](Self::MOVED_TO).
        const MOVE = Self::MOVED_FROM.bits() | Self::MOVED_TO.bits();

        /// All event atoms combined
        const ALL = Self::ACCESS.bits()
            | Self::MODIFY.bits()
            | Self::ATTRIB.bits()
            | Self::CLOSE_WRITE.bits()
            | Self::CLOSE_NOWRITE.bits()
            | Self::OPEN.bits()
            | Self::MOVED_FROM.bits()
            | Self::MOVED_TO.bits()
            | Self::CREATE.bits()
            | Self::DELETE_SUB.bits()
            | Self::DELETE_SELF.bits()
            | Self::MOVE_SELF.bits();
    }
}

/// The twelve atoms in canonical order
///
/// Rendering, dispatch ordering and mask translation all iterate this table,
/// so the order here is the one observable order in the whole crate.
pub(crate) const ATOMS: [Event; 12] = [
    Event::ACCESS,
    Event::MODIFY,
    Event::ATTRIB,
    Event::CLOSE_WRITE,
    Event::CLOSE_NOWRITE,
    Event::OPEN,
    Event::MOVED_FROM,
    Event::MOVED_TO,
    Event::CREATE,
    Event::DELETE_SUB,
    Event::DELETE_SELF,
    Event::MOVE_SELF,
];

/// Atom names, aligned with [`ATOMS`]
///
/// `DELETE_SUB` keeps the plain `delete` spelling in rendered output.
const ATOM_NAMES: [(Event, &str); 12] = [
    (Event::ACCESS, "access"),
    (Event::MODIFY, "modify"),
    (Event::ATTRIB, "attrib"),
    (Event::CLOSE_WRITE, "close_write"),
    (Event::CLOSE_NOWRITE, "close_nowrite"),
    (Event::OPEN, "open"),
    (Event::MOVED_FROM, "moved_from"),
    (Event::MOVED_TO, "moved_to"),
    (Event::CREATE, "create"),
    (Event::DELETE_SUB, "delete"),
    (Event::DELETE_SELF, "delete_self"),
    (Event::MOVE_SELF, "move_self"),
];

/// Composite aliases, appended after the atoms when rendering
const ALIASES: [(Event, &str); 3] = [
    (Event::CLOSE, "close"),
    (Event::MOVE, "move"),
    (Event::ALL, "all"),
];

impl Event {
    /// Returns an iterator over the atoms contained in `self`, in canonical
    /// order
    pub fn atoms(self) -> impl Iterator<Item = Event> {
        ATOMS.into_iter().filter(move |atom| self.contains(*atom))
    }

    /// Returns `true` if `self` is a single atom
    pub fn is_atom(self) -> bool {
        ATOMS.contains(&self)
    }
}

/// Renders the contained atoms in canonical order, comma-separated
///
/// Composite aliases whose atoms are all present are appended after the
/// atoms, so `Event::ALL` renders as
/// `access,modify,...,move_self,close,move,all`. The empty value renders as
/// the empty string. Operand order never influences the rendering:
/// `A | B` and `B | A` produce the same text.
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut put = |f: &mut fmt::Formatter<'_>, name: &str| -> fmt::Result {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            f.write_str(name)
        };

        for (atom, name) in ATOM_NAMES {
            if self.contains(atom) {
                put(f, name)?;
            }
        }
        for (alias, name) in ALIASES {
            if self.contains(alias) {
                put(f, name)?;
            }
        }

        Ok(())
    }
}
