//! Depth-first traversal with an explicit stack.

use std::collections::HashSet;

use super::SceneTree;
use crate::crdt::{CrdtId, CrdtSequenceItem};
use crate::error::SceneError;
use crate::scene_items::{GlyphRange, Line, SceneItem};

/// A drawable leaf of the tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Leaf<'a> {
    Line(&'a Line),
    GlyphRange(&'a GlyphRange),
}

/// A leaf together with where it sits in the tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneLeaf<'a> {
    /// The group whose child sequence holds the leaf.
    pub group: CrdtId,
    pub item_id: CrdtId,
    pub item: Leaf<'a>,
}

/// Iterator returned by [`SceneTree::walk`].
///
/// Children are visited in their logical order, sub-groups in place. The
/// first error ends the iteration.
pub struct Walk<'a> {
    tree: &'a SceneTree,
    start: Option<CrdtId>,
    stack: Vec<(CrdtId, &'a CrdtSequenceItem<SceneItem>)>,
    seen: HashSet<CrdtId>,
    done: bool,
}

impl<'a> Walk<'a> {
    pub(super) fn new(tree: &'a SceneTree, start: CrdtId) -> Self {
        Self {
            tree,
            start: Some(start),
            stack: Vec::new(),
            seen: HashSet::new(),
            done: false,
        }
    }

    fn expand(&mut self, node_id: CrdtId) -> Result<(), SceneError> {
        if !self.seen.insert(node_id) {
            return Err(SceneError::RepeatedGroup(node_id));
        }
        let tree = self.tree;
        let group = tree
            .get(&node_id)
            .ok_or(SceneError::DanglingReference(node_id))?;
        let items = group.children.ordered_items()?;
        self.stack
            .extend(items.into_iter().rev().map(|item| (node_id, item)));
        Ok(())
    }

    fn fail(&mut self, err: SceneError) -> Option<Result<SceneLeaf<'a>, SceneError>> {
        self.done = true;
        self.stack.clear();
        Some(Err(err))
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = Result<SceneLeaf<'a>, SceneError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(start) = self.start.take() {
            if let Err(err) = self.expand(start) {
                return self.fail(err);
            }
        }
        while let Some((group, item)) = self.stack.pop() {
            let leaf = match &item.value {
                None => continue,
                Some(SceneItem::Group(node_id)) => {
                    if let Err(err) = self.expand(*node_id) {
                        return self.fail(err);
                    }
                    continue;
                }
                Some(SceneItem::Line(line)) => Leaf::Line(line),
                Some(SceneItem::GlyphRange(glyph)) => Leaf::GlyphRange(glyph),
            };
            return Some(Ok(SceneLeaf {
                group,
                item_id: item.item_id,
                item: leaf,
            }));
        }
        self.done = true;
        None
    }
}
