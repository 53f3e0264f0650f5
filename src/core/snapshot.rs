//! # Snapshot Module / 快照模块
//!
//! A [`Snapshot`] is the serializable, behavior-free projection of a realized
//! tree. Nodes live in a flat pre-order arena and are addressed by [`NodeId`],
//! which is the stable addressing scheme used by selections and engine events.
//!
//! [`Snapshot`] 是已实现测试树的可序列化、不含行为的投影。节点以先序方式存放在扁平数组中，
//! 通过 [`NodeId`] 寻址，选择集和引擎事件都使用这一稳定的寻址方式。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

use crate::core::error::ConfigError;
use crate::core::models::{Bug, ExplorationKind, ItemKind, Metadata};
use crate::core::tree::TestItem;

/// Address of a node within a [`Snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub kind: ItemKind,
    pub metadata: Metadata,
    pub exploration_seed: u64,
    pub exploration_kind: Option<ExplorationKind>,
    #[serde(default)]
    pub bugs: Vec<Bug>,
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub children: Vec<NodeId>,
}

impl SnapshotNode {
    pub fn is_case(&self) -> bool {
        self.kind == ItemKind::Case
    }

    pub fn is_variation(&self) -> bool {
        self.kind == ItemKind::Variation
    }
}

/// Deserialized nodes are checked before they become a [`Snapshot`]: ids are
/// pre-order, so every child id is larger than its parent's and parent and
/// child links agree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RawSnapshot")]
pub struct Snapshot {
    nodes: Vec<SnapshotNode>,
}

#[derive(Deserialize)]
struct RawSnapshot {
    nodes: Vec<SnapshotNode>,
}

impl TryFrom<RawSnapshot> for Snapshot {
    type Error = ConfigError;

    fn try_from(raw: RawSnapshot) -> Result<Self, ConfigError> {
        let nodes = raw.nodes;
        let invalid = |node: usize, reason: String| ConfigError::InvalidSnapshot { node, reason };

        for (index, node) in nodes.iter().enumerate() {
            match node.parent {
                None if index == 0 => {}
                None => return Err(invalid(index, "only the root may lack a parent".to_string())),
                Some(parent) if index == 0 => {
                    return Err(invalid(index, format!("root has parent {}", parent)));
                }
                Some(parent) => {
                    if parent.0 >= index {
                        return Err(invalid(index, format!("parent {} does not precede it", parent)));
                    }
                    if !nodes[parent.0].children.contains(&NodeId(index)) {
                        return Err(invalid(index, format!("parent {} does not list it", parent)));
                    }
                }
            }

            if node.is_variation() && !node.children.is_empty() {
                return Err(invalid(index, "a variation cannot have children".to_string()));
            }
            let mut previous = index;
            for child in &node.children {
                if child.0 <= previous || child.0 >= nodes.len() {
                    return Err(invalid(index, format!("child {} is out of order or range", child)));
                }
                if nodes[child.0].parent != Some(NodeId(index)) {
                    return Err(invalid(index, format!("child {} names another parent", child)));
                }
                previous = child.0;
            }
        }
        Ok(Snapshot { nodes })
    }
}

impl Snapshot {
    /// Flattens a tree, realizing every node on the way.
    ///
    /// # Errors
    /// Propagates configuration errors raised while realizing children.
    pub fn capture(root: &TestItem) -> Result<Self, ConfigError> {
        let mut snapshot = Snapshot { nodes: Vec::new() };
        snapshot.push(root, None)?;
        Ok(snapshot)
    }

    fn push(&mut self, item: &TestItem, parent: Option<NodeId>) -> Result<NodeId, ConfigError> {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SnapshotNode {
            kind: item.kind(),
            metadata: item.metadata().clone(),
            exploration_seed: item.exploration_seed(),
            exploration_kind: item.exploration_kind(),
            bugs: item.bugs().to_vec(),
            parent,
            children: Vec::new(),
        });
        for child in item.children()? {
            let child_id = self.push(child, Some(id))?;
            self.nodes[id.0].children.push(child_id);
        }
        Ok(id)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&SnapshotNode> {
        self.nodes.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SnapshotNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn is_case(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(SnapshotNode::is_case)
    }

    pub fn is_variation(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(SnapshotNode::is_variation)
    }

    /// Every variation, in execution order.
    pub fn variations(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.iter().filter(|(_, n)| n.is_variation()).map(|(id, _)| id)
    }

    /// All nodes below `id`, in pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Metadata from the root down to `id`.
    pub fn metadata_chain(&self, id: NodeId) -> Vec<&Metadata> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.get(current) else { break };
            chain.push(&node.metadata);
            cursor = node.parent;
        }
        chain.reverse();
        chain
    }

    pub fn path(&self, id: NodeId) -> String {
        self.metadata_chain(id)
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Looks a node up by its slash-separated path of names.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        self.iter()
            .map(|(id, _)| id)
            .find(|&id| self.path(id) == path)
    }

    /// Two snapshot nodes denote the same item iff their metadata chains match.
    /// 当且仅当两个快照节点的元数据链一致时，它们表示同一个测试项。
    pub fn same_item(&self, id: NodeId, other: &Snapshot, other_id: NodeId) -> bool {
        self.get(id).is_some()
            && other.get(other_id).is_some()
            && self.metadata_chain(id) == other.metadata_chain(other_id)
    }

    /// Whether `id` addresses `item` in the live tree.
    pub fn matches_item(&self, id: NodeId, item: &TestItem) -> bool {
        let chain = item.metadata_chain();
        let ours = self.metadata_chain(id);
        self.get(id).is_some_and(|n| n.kind == item.kind())
            && ours.len() == chain.len()
            && ours.iter().zip(&chain).all(|(a, b)| *a == b)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parses a snapshot, rejecting structurally invalid node links.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl Index<NodeId> for Snapshot {
    type Output = SnapshotNode;

    fn index(&self, id: NodeId) -> &SnapshotNode {
        &self.nodes[id.0]
    }
}
