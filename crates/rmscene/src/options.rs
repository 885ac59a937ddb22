//! Encoder configuration.

use serde::{Deserialize, Serialize};

/// Smallest format version whose line items use the 14-byte point layout.
pub const LINE_V2_THRESHOLD: u8 = 2;

/// Options for [`crate::encode`] and [`crate::scene_stream::write_blocks`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Target format version. `None` keeps every line block's decoded
    /// version; otherwise lines are written as version 2 from
    /// [`LINE_V2_THRESHOLD`] on and as version 1 below it.
    pub format_version: Option<u8>,
}

impl WriteOptions {
    pub fn with_format_version(version: u8) -> Self {
        Self { format_version: Some(version) }
    }
}
