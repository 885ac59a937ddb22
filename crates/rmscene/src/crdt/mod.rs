//! CRDT building blocks: identifiers, last-writer-wins values and sequences.
//!
//! Only the ordering side of the CRDT is implemented. Files are single-writer
//! snapshots, so there is no merge logic.

pub mod id;
pub mod lww;
pub mod sequence;

pub use id::{CrdtId, END_MARKER};
pub use lww::Lww;
pub use sequence::{CrdtSequence, CrdtSequenceItem};
