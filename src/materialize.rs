//! Split a compiled `LineageTree` into what is drawn up front and what is
//! handed to the client for lazy expansion.
//!
//! The view is keyed by node id, not by tree record: a table referenced from
//! two datapoints is two records in the tree but one drawn node, so records
//! sharing an id are merged here (children unioned, attributes merged in
//! traversal order).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use ustr::Ustr;

use crate::row::Row;
use crate::schema::HierarchySchema;
use crate::theme::{NodeView, StyleProvider};
use crate::tree::LineageTree;

/// Everything the client needs to draw a node.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct NodeDescriptor {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub expandable: bool,
    pub auto_expand: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ViewEdge {
    pub from: String,
    pub to: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct InitialGraph {
    pub nodes: Vec<NodeDescriptor>,
    pub edges: Vec<ViewEdge>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct EdgeMeta {
    pub edge_type: String,
    pub properties: Row,
}

/// Parent id → child id → descriptor, for every node with children.
pub type HiddenMap = BTreeMap<String, BTreeMap<String, NodeDescriptor>>;

/// Source id → target id → edge type and properties, for every tree edge.
pub type EdgeMetadata = BTreeMap<String, BTreeMap<String, EdgeMeta>>;

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct MaterializedView {
    pub root: String,
    pub initial: InitialGraph,
    /// Initial nodes whose children are all part of the initial graph.
    pub initially_expanded: Vec<String>,
    pub hidden: HiddenMap,
    pub edges: EdgeMetadata,
    /// Tooltip text by node id; nodes without a tooltip are omitted.
    pub titles: BTreeMap<String, String>,
}

impl MaterializedView {
    pub fn children_of(&self, id: &str) -> Option<&BTreeMap<String, NodeDescriptor>> {
        self.hidden.get(id)
    }

    pub fn edge_meta(&self, from: &str, to: &str) -> Option<&EdgeMeta> {
        self.edges.get(from)?.get(to)
    }

    /// Descriptor for any node id, looked up from the initial graph or from
    /// the hidden map entry of one of its parents.
    pub fn descriptor(&self, id: &str) -> Option<&NodeDescriptor> {
        self.initial
            .nodes
            .iter()
            .find(|n| n.id == id)
            .or_else(|| self.hidden.values().find_map(|children| children.get(id)))
    }
}

struct MergedNode {
    level: Ustr,
    display_name: String,
    attributes: Row,
    children: Vec<String>,
}

pub fn materialize(
    tree: &LineageTree,
    schema: &HierarchySchema,
    initial_levels: &[Ustr],
    styles: &dyn StyleProvider,
) -> MaterializedView {
    let _span = info_span!("materialize", nodes = tree.len()).entered();

    // ## Merge tree records by id
    let mut merged: Vec<MergedNode> = vec![];
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    for handle in tree.depth_first() {
        let node = tree.get(handle);
        let slot = *by_id.entry(node.id.as_str()).or_insert_with(|| {
            merged.push(MergedNode {
                level: node.level,
                display_name: node.display_name.clone(),
                attributes: Row::new(),
                children: vec![],
            });
            merged.len() - 1
        });
        let entry = &mut merged[slot];
        for (k, v) in &node.attributes {
            entry.attributes.insert(k.clone(), v.clone());
        }
        for child in node.children() {
            let child_id = &tree.get(*child).id;
            if !entry.children.contains(child_id) {
                entry.children.push(child_id.clone());
            }
        }
    }

    let mut ids: Vec<&str> = vec![""; merged.len()];
    for (id, slot) in &by_id {
        ids[*slot] = id;
    }

    let descriptor = |slot: usize| -> NodeDescriptor {
        let node = &merged[slot];
        let view = NodeView {
            id: ids[slot],
            display_name: &node.display_name,
            attributes: &node.attributes,
            child_count: node.children.len(),
        };
        NodeDescriptor {
            id: ids[slot].to_string(),
            label: styles.label_for(&node.level, &view),
            node_type: node.level.to_string(),
            expandable: !node.children.is_empty(),
            auto_expand: schema
                .level(&node.level)
                .map(|l| l.auto_expand())
                .unwrap_or(false),
        }
    };

    // ## Hidden map, titles and the initial graph
    let initial_set: BTreeSet<&str> = merged
        .iter()
        .enumerate()
        .filter(|(_, n)| initial_levels.contains(&n.level))
        .map(|(slot, _)| ids[slot])
        .collect();

    let mut view = MaterializedView {
        root: tree.get(tree.root()).id.clone(),
        ..MaterializedView::default()
    };
    for (slot, node) in merged.iter().enumerate() {
        let id = ids[slot];
        let node_view = NodeView {
            id,
            display_name: &node.display_name,
            attributes: &node.attributes,
            child_count: node.children.len(),
        };
        let title = styles.tooltip_for(&node.level, &node_view);
        if !title.is_empty() {
            view.titles.insert(id.to_string(), title);
        }

        if initial_set.contains(id) {
            view.initial.nodes.push(descriptor(slot));
            if !node.children.is_empty()
                && node.children.iter().all(|c| initial_set.contains(c.as_str()))
            {
                view.initially_expanded.push(id.to_string());
            }
        }

        if !node.children.is_empty() {
            let children = node
                .children
                .iter()
                .map(|c| (c.clone(), descriptor(by_id[c.as_str()])))
                .collect();
            view.hidden.insert(id.to_string(), children);
        }
    }

    // ## Edge metadata
    let mut initial_edges = BTreeSet::new();
    for (from, to, edge) in tree.edges() {
        let meta = view
            .edges
            .entry(from.to_string())
            .or_default()
            .entry(to.to_string())
            .or_insert_with(|| EdgeMeta {
                edge_type: edge.edge_type.clone(),
                properties: Row::new(),
            });
        for (k, v) in &edge.properties {
            meta.properties.insert(k.clone(), v.clone());
        }

        if initial_set.contains(from) && initial_set.contains(to) {
            initial_edges.insert(ViewEdge {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
    }
    view.initial.edges = initial_edges.into_iter().collect();

    info!(
        initial_nodes = view.initial.nodes.len(),
        hidden_parents = view.hidden.len(),
        "materialized view"
    );
    view
}
