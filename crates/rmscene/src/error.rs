//! Error types shared across the scene layers.

use crate::crdt::CrdtId;
use crate::tagged_block::FrameError;

/// Structural errors in the decoded scene graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    /// A tree edge names a parent that has not been declared.
    #[error("missing parent node {0}")]
    MissingParent(CrdtId),
    /// A neighbour or group reference that resolves to nothing.
    #[error("dangling reference to {0}")]
    DanglingReference(CrdtId),
    /// Node metadata for a node that was never declared.
    #[error("unknown node {0}")]
    UnknownNode(CrdtId),
    #[error("node {0} declared twice")]
    DuplicateNode(CrdtId),
    /// The neighbour links contain a cycle; lists the unresolved items.
    #[error("cyclic sequence order among {0:?}")]
    CyclicOrder(Vec<CrdtId>),
    /// A group is reachable more than once while walking the tree.
    #[error("group {0} appears more than once in the tree")]
    RepeatedGroup(CrdtId),
}

/// Errors returned by [`crate::decode`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Errors returned by [`crate::encode`].
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}
