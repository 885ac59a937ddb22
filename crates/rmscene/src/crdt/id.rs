//! The `(author, sequence)` identifier that keys every element.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An immutable CRDT identifier: `(author, sequence)`.
///
/// Ordered lexicographically, author first. On the wire it is one byte of
/// author followed by a varuint sequence number.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CrdtId {
    pub part1: u8,
    pub part2: u64,
}

/// Sentinel id marking the head/tail boundary of a sequence.
pub const END_MARKER: CrdtId = CrdtId::new(0, 0);

impl CrdtId {
    pub const fn new(part1: u8, part2: u64) -> Self {
        Self { part1, part2 }
    }

    /// Returns `true` for the `(0, 0)` sentinel.
    #[inline]
    pub fn is_end(&self) -> bool {
        *self == END_MARKER
    }

    /// The id `cycles` steps later in the same author's sequence.
    #[inline]
    pub fn tick(self, cycles: u64) -> Self {
        Self::new(self.part1, self.part2.saturating_add(cycles))
    }
}

impl fmt::Display for CrdtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.part1, self.part2)
    }
}
