use std::collections::HashMap;

use serde_json::{json, Value};
use ustr::Ustr;

use crate::row::Row;

/**
Arena representation of the compiled lineage hierarchy.

Nodes live in a single vec and refer to each other through `NodeHandle`
values, which are just indices into that vec.  Each node keeps its ordered
child handles plus an id-keyed index so the compiler can find "the child
with this id under this parent" without scanning.

Node ids are unique within their parent's scope only.  The same table
referenced by two datapoints exists twice in the arena (once under each
datapoint) but shares one id, which is what lets the view collapse both
records into a single drawn node with two incoming edges.
*/

/// Wrapped u32 index of a `LineageNode` in its `LineageTree`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(u32);

impl NodeHandle {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// The edge connecting a node to its parent.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeInfo {
    pub edge_type: String,
    pub properties: Row,
}

#[derive(Clone, Debug)]
pub struct LineageNode {
    pub id: String,
    pub level: Ustr,
    pub display_name: String,
    /// Non-null row fields merged from every row that reached this node.
    pub attributes: Row,
    pub parent: Option<NodeHandle>,
    /// `None` only for the root.
    pub edge: Option<EdgeInfo>,
    children: Vec<NodeHandle>,
    child_index: HashMap<String, NodeHandle>,
}

impl LineageNode {
    fn new(id: &str, level: Ustr, display_name: &str, parent: Option<NodeHandle>) -> Self {
        LineageNode {
            id: id.to_string(),
            level,
            display_name: display_name.to_string(),
            attributes: Row::new(),
            parent,
            edge: None,
            children: vec![],
            child_index: HashMap::new(),
        }
    }

    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    pub fn is_expandable(&self) -> bool {
        !self.children.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct LineageTree {
    nodes: Vec<LineageNode>,
}

impl LineageTree {
    pub fn new(root_level: Ustr, root_id: &str) -> Self {
        LineageTree {
            nodes: vec![LineageNode::new(root_id, root_level, root_id, None)],
        }
    }

    pub fn root(&self) -> NodeHandle {
        NodeHandle(0)
    }

    pub fn get(&self, handle: NodeHandle) -> &LineageNode {
        // Handles are only minted by this tree, so the index is always valid.
        &self.nodes[handle.index()]
    }

    pub(crate) fn get_mut(&mut self, handle: NodeHandle) -> &mut LineageNode {
        &mut self.nodes[handle.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // There is always a root.
        false
    }

    pub fn child(&self, parent: NodeHandle, id: &str) -> Option<NodeHandle> {
        self.get(parent).child_index.get(id).copied()
    }

    /// Return the child of `parent` with `id`, creating it with empty
    /// attributes if it doesn't exist yet.
    pub(crate) fn ensure_child(
        &mut self,
        parent: NodeHandle,
        id: &str,
        level: Ustr,
        display_name: &str,
        edge_type: &str,
    ) -> (NodeHandle, bool) {
        if let Some(existing) = self.child(parent, id) {
            return (existing, false);
        }

        let handle = NodeHandle(self.nodes.len() as u32);
        let mut node = LineageNode::new(id, level, display_name, Some(parent));
        node.edge = Some(EdgeInfo {
            edge_type: edge_type.to_string(),
            properties: Row::new(),
        });
        self.nodes.push(node);

        let parent_node = self.get_mut(parent);
        parent_node.children.push(handle);
        parent_node.child_index.insert(id.to_string(), handle);
        (handle, true)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &LineageNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeHandle(i as u32), node))
    }

    /// Pre-order traversal starting at the root.
    pub fn depth_first(&self) -> Vec<NodeHandle> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(handle) = stack.pop() {
            order.push(handle);
            stack.extend(self.get(handle).children.iter().rev());
        }
        order
    }

    /// Every parent/child edge as `(parent id, child id, edge)`.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &EdgeInfo)> {
        self.nodes.iter().filter_map(move |node| {
            let parent = node.parent?;
            let edge = node.edge.as_ref()?;
            Some((self.get(parent).id.as_str(), node.id.as_str(), edge))
        })
    }

    /// Canonical nested JSON form with children sorted by id, used to compare
    /// trees irrespective of row order.
    pub fn to_json(&self) -> Value {
        self.node_to_json(self.root())
    }

    fn node_to_json(&self, handle: NodeHandle) -> Value {
        let node = self.get(handle);
        let mut children: Vec<&NodeHandle> = node.children.iter().collect();
        children.sort_by(|a, b| self.get(**a).id.cmp(&self.get(**b).id));
        json!({
            "id": node.id,
            "type": node.level.as_str(),
            "display_name": node.display_name,
            "attributes": node.attributes,
            "edge": node.edge.as_ref().map(|e| json!({
                "edge_type": e.edge_type,
                "properties": e.properties,
            })),
            "children": children
                .into_iter()
                .map(|c| self.node_to_json(*c))
                .collect::<Vec<Value>>(),
        })
    }
}
