//! Last-writer-wins register values.

use serde::{Deserialize, Serialize};

use super::CrdtId;

/// A value paired with the timestamp of the write that produced it.
///
/// Identity is by both fields. Merging is out of scope; the timestamp is
/// carried so the value round-trips unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lww<T> {
    pub timestamp: CrdtId,
    pub value: T,
}

impl<T> Lww<T> {
    pub fn new(timestamp: CrdtId, value: T) -> Self {
        Self { timestamp, value }
    }

    /// Picks the value written later. Ties keep `self`.
    pub fn latest(self, other: Self) -> Self {
        if other.timestamp > self.timestamp {
            other
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_uses_timestamp_and_value() {
        let a = Lww::new(CrdtId::new(1, 2), "x");
        assert_eq!(a, Lww::new(CrdtId::new(1, 2), "x"));
        assert_ne!(a, Lww::new(CrdtId::new(1, 3), "x"));
        assert_ne!(a, Lww::new(CrdtId::new(1, 2), "y"));
    }

    #[test]
    fn latest_prefers_greater_timestamp() {
        let a = Lww::new(CrdtId::new(1, 2), 1);
        let b = Lww::new(CrdtId::new(1, 5), 2);
        assert_eq!(a.clone().latest(b.clone()).value, 2);
        assert_eq!(b.latest(a).value, 2);
    }
}
