//! The scene tree: an arena of groups keyed by node id.
//!
//! Groups refer to sub-groups by id, never by ownership, so forward
//! references between blocks are resolved by lookup once the whole stream
//! has been folded in.

mod walk;

use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;
use tracing::{debug, error};

use crate::crdt::{CrdtId, CrdtSequenceItem};
use crate::error::SceneError;
use crate::scene_items::{Group, SceneItem, Text};
use crate::scene_stream::{Block, BlockData, TreeEdge};
use crate::text::ordered_chars;

pub use walk::{Leaf, SceneLeaf, Walk};

/// Node id of the implicit root group.
pub const ROOT_ID: CrdtId = CrdtId::new(0, 1);

#[derive(Debug, Clone, PartialEq)]
pub struct SceneTree {
    nodes: IndexMap<CrdtId, Group>,
    /// Declared parent of every node except the root.
    parents: HashMap<CrdtId, CrdtId>,
    pub root_text: Option<Text>,
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneTree {
    /// A tree holding only the root group.
    pub fn new() -> Self {
        let mut nodes = IndexMap::new();
        nodes.insert(ROOT_ID, Group::new(ROOT_ID));
        Self {
            nodes,
            parents: HashMap::new(),
            root_text: None,
        }
    }

    pub fn root(&self) -> &Group {
        &self.nodes[&ROOT_ID]
    }

    pub fn get(&self, node_id: &CrdtId) -> Option<&Group> {
        self.nodes.get(node_id)
    }

    pub fn get_mut(&mut self, node_id: &CrdtId) -> Option<&mut Group> {
        self.nodes.get_mut(node_id)
    }

    pub fn contains(&self, node_id: &CrdtId) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Groups in declaration order, root first.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.nodes.values()
    }

    pub fn parent_of(&self, node_id: &CrdtId) -> Option<CrdtId> {
        self.parents.get(node_id).copied()
    }

    /// Groups ordered so every group comes after its current parent.
    ///
    /// Siblings keep declaration order. Edge updates can move a group under
    /// one declared after it, or into a loop that never reaches the root;
    /// the latter fails with [`SceneError::CyclicOrder`].
    pub fn groups_parents_first(&self) -> Result<Vec<&Group>, SceneError> {
        let mut children: HashMap<CrdtId, Vec<&Group>> = HashMap::new();
        for group in self.nodes.values().skip(1) {
            let parent = self
                .parent_of(&group.node_id)
                .ok_or(SceneError::MissingParent(group.node_id))?;
            children.entry(parent).or_default().push(group);
        }

        let mut out = Vec::with_capacity(self.nodes.len());
        let mut queue = VecDeque::from([self.root()]);
        while let Some(group) = queue.pop_front() {
            out.push(group);
            if let Some(kids) = children.remove(&group.node_id) {
                queue.extend(kids);
            }
        }

        if out.len() != self.nodes.len() {
            let mut stuck: Vec<CrdtId> = children
                .into_values()
                .flatten()
                .map(|g| g.node_id)
                .collect();
            stuck.sort();
            return Err(SceneError::CyclicOrder(stuck));
        }
        Ok(out)
    }

    /// Declares `node_id` as a new group under `parent_id`.
    pub fn add_node(&mut self, node_id: CrdtId, parent_id: CrdtId) -> Result<(), SceneError> {
        if !self.nodes.contains_key(&parent_id) {
            return Err(SceneError::MissingParent(parent_id));
        }
        if self.nodes.contains_key(&node_id) {
            return Err(SceneError::DuplicateNode(node_id));
        }
        self.nodes.insert(node_id, Group::new(node_id));
        self.parents.insert(node_id, parent_id);
        Ok(())
    }

    /// Adds a child item to the group `parent_id`.
    ///
    /// A [`SceneItem::Group`] value may name a group that is declared later;
    /// [`SceneTree::validate`] checks it once everything is in.
    pub fn add_item(
        &mut self,
        parent_id: CrdtId,
        item: CrdtSequenceItem<SceneItem>,
    ) -> Result<(), SceneError> {
        let parent = self
            .nodes
            .get_mut(&parent_id)
            .ok_or(SceneError::MissingParent(parent_id))?;
        parent.children.add(item);
        Ok(())
    }

    /// Checks that every child sequence orders and every group reference
    /// resolves.
    pub fn validate(&self) -> Result<(), SceneError> {
        for group in self.nodes.values() {
            for item in group.children.ordered_items()? {
                if let Some(SceneItem::Group(id)) = &item.value {
                    if !self.nodes.contains_key(id) {
                        return Err(SceneError::DanglingReference(*id));
                    }
                }
            }
        }
        if let Some(text) = &self.root_text {
            ordered_chars(&text.items)?;
        }
        Ok(())
    }

    /// Depth-first iterator over the lines and glyph ranges of the tree.
    pub fn walk(&self) -> Walk<'_> {
        Walk::new(self, ROOT_ID)
    }

    /// Like [`SceneTree::walk`], starting at `node_id`.
    pub fn walk_from(&self, node_id: CrdtId) -> Walk<'_> {
        Walk::new(self, node_id)
    }

    // ── Assembly ────────────────────────────────────────────────────────────

    fn apply(&mut self, data: &BlockData) -> Result<(), SceneError> {
        match data {
            BlockData::SceneTree(edge) => self.apply_edge(edge),
            BlockData::TreeNode(meta) => {
                let node = self
                    .nodes
                    .get_mut(&meta.node_id)
                    .ok_or(SceneError::UnknownNode(meta.node_id))?;
                node.label = meta.label.clone();
                node.visible = meta.visible.clone();
                node.anchor_id = meta.anchor_id.clone();
                node.anchor_type = meta.anchor_type.clone();
                node.anchor_threshold = meta.anchor_threshold.clone();
                node.anchor_origin_x = meta.anchor_origin_x.clone();
                Ok(())
            }
            BlockData::SceneGroupItem(b) => {
                self.add_item(b.parent_id, b.item.clone().map(SceneItem::Group))
            }
            BlockData::SceneLineItem(b) => {
                self.add_item(b.parent_id, b.item.clone().map(SceneItem::Line))
            }
            BlockData::SceneGlyphItem(b) => {
                self.add_item(b.parent_id, b.item.clone().map(SceneItem::GlyphRange))
            }
            BlockData::SceneTextItem(b) => {
                debug!(item = %b.item.item_id, "text item ignored in scene tree");
                Ok(())
            }
            BlockData::RootText(rt) => {
                if self.root_text.is_some() {
                    error!(block = %rt.block_id, "root text set twice, keeping the later one");
                }
                self.root_text = Some(rt.value.clone());
                Ok(())
            }
            BlockData::AuthorIds(_)
            | BlockData::MigrationInfo(_)
            | BlockData::PageInfo(_)
            | BlockData::SceneInfo(_)
            | BlockData::Unreadable(_) => Ok(()),
        }
    }

    fn apply_edge(&mut self, edge: &TreeEdge) -> Result<(), SceneError> {
        if edge.is_update && self.nodes.contains_key(&edge.tree_id) {
            if !self.nodes.contains_key(&edge.parent_id) {
                return Err(SceneError::MissingParent(edge.parent_id));
            }
            debug!(node = %edge.tree_id, parent = %edge.parent_id, "tree edge update");
            self.parents.insert(edge.tree_id, edge.parent_id);
            return Ok(());
        }
        self.add_node(edge.tree_id, edge.parent_id)
    }
}

/// Folds a block stream into a tree, in stream order, then validates it.
pub fn build_tree(blocks: &[Block]) -> Result<SceneTree, SceneError> {
    let mut tree = SceneTree::new();
    for block in blocks {
        tree.apply(&block.data)?;
    }
    tree.validate()?;
    Ok(tree)
}
