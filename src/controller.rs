/**
Client-side expansion state machine.

The controller owns the live view: which node ids are drawn, which
parent → child edges are drawn, and which parents currently have their
children materialized.  It never draws anything itself; all drawing goes
through a `RenderBackend`, which in the generated document is the embedded
SVG renderer and in tests is `MemoryBackend`.

### Node states

- hidden: not drawn.
- visible-collapsed: drawn, has children, not in the expanded set.
- visible-expanded: drawn and its children have been added to the view.

### Auto-expand cascade

Expanding a parent adds its children synchronously.  Children flagged
`auto_expand` that have children of their own are not expanded right away;
they are queued and expanded on the next `tick()`, mirroring the browser
where the renderer has to place the new nodes before their positions can be
queried.  A queued cascade re-checks state when it fires: if its parent was
collapsed or the child has disappeared in the meantime it does nothing.

### Shared nodes

The same id can be a child of several parents (a table used by two
datapoints).  Under `CollapsePolicy::RefCounted` every drawn node counts the
expanded parents currently showing it and is only removed when that count
drops to zero, so collapsing one datapoint never yanks a table that another
expanded datapoint still shows.  `CollapsePolicy::ById` removes children by
id regardless, which can leave an expanded parent with missing children.
*/
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::layout::{LayoutConfig, Position};
use crate::materialize::{MaterializedView, NodeDescriptor};
use crate::schema::DEFAULT_EDGE_TYPE;
use crate::theme::{EdgeStyle, NodeStyle, StyleProvider};

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CollapsePolicy {
    #[default]
    RefCounted,
    ById,
}

/// A node as handed to the renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawnNode {
    pub id: String,
    pub label: String,
    pub node_type: String,
    pub title: Option<String>,
    pub style: NodeStyle,
    /// `None` lets the renderer pick a position.
    pub position: Option<Position>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrawnEdge {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub style: EdgeStyle,
}

/// What the controller needs from whatever draws the graph.
pub trait RenderBackend {
    fn add_node(&mut self, node: DrawnNode);
    fn add_edge(&mut self, edge: DrawnEdge);
    /// Remove nodes along with every edge touching them.
    fn remove_nodes(&mut self, ids: &[String]);
    fn remove_edges(&mut self, edges: &[(String, String)]);
    fn position(&self, id: &str) -> Option<Position>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickOutcome {
    Expanded,
    Collapsed,
    Ignored,
}

#[derive(Clone, Debug)]
struct VisibleNode {
    node_type: String,
    /// Expanded parents currently showing this node, plus one if pinned.
    refs: usize,
}

pub struct ExpansionController<'v> {
    view: &'v MaterializedView,
    styles: &'v dyn StyleProvider,
    layout: &'v LayoutConfig,
    policy: CollapsePolicy,
    visible: BTreeMap<String, VisibleNode>,
    edges: BTreeSet<(String, String)>,
    expanded: BTreeSet<String>,
    /// (parent, child) cascades due on the next tick.
    pending: VecDeque<(String, String)>,
}

impl<'v> ExpansionController<'v> {
    pub fn new(
        view: &'v MaterializedView,
        styles: &'v dyn StyleProvider,
        layout: &'v LayoutConfig,
        policy: CollapsePolicy,
    ) -> Self {
        ExpansionController {
            view,
            styles,
            layout,
            policy,
            visible: BTreeMap::new(),
            edges: BTreeSet::new(),
            expanded: BTreeSet::new(),
            pending: VecDeque::new(),
        }
    }

    /// Draw the initial graph.  Initial nodes that aren't shown by an
    /// initially expanded parent (the root, at least) are pinned so that no
    /// collapse can remove them.
    pub fn mount(&mut self, backend: &mut dyn RenderBackend) {
        let view = self.view;
        for node in &view.initial.nodes {
            self.visible.insert(
                node.id.clone(),
                VisibleNode {
                    node_type: node.node_type.clone(),
                    refs: 0,
                },
            );
            backend.add_node(self.drawn_node(node, None));
        }

        for parent in &view.initially_expanded {
            self.expanded.insert(parent.clone());
            for child in self.children_ids(parent) {
                if let Some(v) = self.visible.get_mut(&child) {
                    v.refs += 1;
                }
            }
        }
        for v in self.visible.values_mut() {
            if v.refs == 0 {
                v.refs = 1;
            }
        }

        for edge in &view.initial.edges {
            self.link(&edge.from, &edge.to, backend);
        }
        debug!(
            nodes = self.visible.len(),
            edges = self.edges.len(),
            "mounted initial graph"
        );
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.visible.contains_key(id)
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    pub fn is_expandable(&self, id: &str) -> bool {
        self.view.children_of(id).map_or(false, |c| !c.is_empty())
    }

    pub fn visible_nodes(&self) -> Vec<String> {
        self.visible.keys().cloned().collect()
    }

    pub fn visible_edges(&self) -> Vec<(String, String)> {
        self.edges.iter().cloned().collect()
    }

    pub fn expanded_parents(&self) -> Vec<String> {
        self.expanded.iter().cloned().collect()
    }

    pub fn has_pending_cascades(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Toggle a visible node.  Clicks on hidden or leaf nodes are ignored.
    pub fn click(&mut self, id: &str, backend: &mut dyn RenderBackend) -> ClickOutcome {
        if !self.is_visible(id) {
            return ClickOutcome::Ignored;
        }
        if self.is_expanded(id) {
            self.collapse(id, backend);
            ClickOutcome::Collapsed
        } else if self.expand(id, backend) {
            ClickOutcome::Expanded
        } else {
            ClickOutcome::Ignored
        }
    }

    /// Reveal the children of `parent_id`.  Returns false (and changes
    /// nothing) if it is already expanded, not expandable or not visible.
    pub fn expand(&mut self, parent_id: &str, backend: &mut dyn RenderBackend) -> bool {
        if self.is_expanded(parent_id) || !self.is_visible(parent_id) {
            return false;
        }
        let view = self.view;
        let children = match view.children_of(parent_id) {
            Some(children) if !children.is_empty() => children,
            _ => return false,
        };

        let parent_pos = backend.position(parent_id).unwrap_or_default();
        let fresh: Vec<&NodeDescriptor> = children
            .values()
            .filter(|c| !self.is_visible(&c.id))
            .collect();
        for (index, child) in fresh.iter().enumerate() {
            let pos = self
                .layout
                .place(parent_pos, &child.node_type, index, fresh.len());
            self.visible.insert(
                child.id.clone(),
                VisibleNode {
                    node_type: child.node_type.clone(),
                    refs: 0,
                },
            );
            backend.add_node(self.drawn_node(child, Some(pos)));
        }

        for child in children.values() {
            if let Some(v) = self.visible.get_mut(&child.id) {
                v.refs += 1;
            }
            // Children that were already drawn still get linked to this
            // parent.
            self.link(parent_id, &child.id, backend);
        }
        self.expanded.insert(parent_id.to_string());

        for child in children.values() {
            if child.auto_expand && child.expandable && !self.is_expanded(&child.id) {
                self.pending
                    .push_back((parent_id.to_string(), child.id.clone()));
            }
        }

        debug!(
            parent = parent_id,
            added = fresh.len(),
            children = children.len(),
            "expanded"
        );
        true
    }

    /// Hide the children of `parent_id`, collapsing expanded children first.
    /// Returns false if it wasn't expanded.
    pub fn collapse(&mut self, parent_id: &str, backend: &mut dyn RenderBackend) -> bool {
        // Leave the expanded set first so that an id cycle can't recurse
        // back into this parent.
        if !self.expanded.remove(parent_id) {
            return false;
        }
        let child_ids = self.children_ids(parent_id);

        let mut removed = vec![];
        let mut unlinked = vec![];
        for child in &child_ids {
            let last_reference = match self.policy {
                CollapsePolicy::RefCounted => self.visible.get(child).map_or(false, |v| v.refs <= 1),
                CollapsePolicy::ById => self.is_visible(child),
            };
            if !last_reference {
                if let Some(v) = self.visible.get_mut(child) {
                    v.refs = v.refs.saturating_sub(1);
                }
                if self.edges.remove(&(parent_id.to_string(), child.clone())) {
                    unlinked.push((parent_id.to_string(), child.clone()));
                }
                continue;
            }

            if self.is_expanded(child) {
                self.collapse(child, backend);
            }
            // The recursive collapse may have already removed it through an
            // id cycle.
            if self.visible.remove(child).is_some() {
                removed.push(child.clone());
            }
        }

        if !unlinked.is_empty() {
            backend.remove_edges(&unlinked);
        }
        if !removed.is_empty() {
            self.edges
                .retain(|(from, to)| !removed.contains(from) && !removed.contains(to));
            backend.remove_nodes(&removed);
        }

        debug!(
            parent = parent_id,
            removed = removed.len(),
            kept = unlinked.len(),
            "collapsed"
        );
        true
    }

    /// Run one deferred scheduling tick: fire every cascade that was queued
    /// before this call.  Cascades queued by those expansions wait for the
    /// next tick.  Returns how many nodes were expanded.
    pub fn tick(&mut self, backend: &mut dyn RenderBackend) -> usize {
        let due: Vec<(String, String)> = self.pending.drain(..).collect();
        let mut fired = 0;
        for (parent, child) in due {
            if !self.is_expanded(&parent) || !self.is_visible(&child) {
                trace!(parent = %parent, child = %child, "stale cascade skipped");
                continue;
            }
            if self.expand(&child, backend) {
                fired += 1;
            }
        }
        fired
    }

    /// Tick until no cascades remain.
    pub fn settle(&mut self, backend: &mut dyn RenderBackend) -> usize {
        let mut fired = 0;
        // Every tick either expands a new parent or drains the queue, so this
        // is bounded by the number of parents.
        for _ in 0..=self.view.hidden.len() {
            if self.pending.is_empty() {
                break;
            }
            fired += self.tick(backend);
        }
        fired
    }

    /// Expand every visible, collapsed node of `node_type`.
    pub fn expand_all_of_type(&mut self, node_type: &str, backend: &mut dyn RenderBackend) -> usize {
        let targets: Vec<String> = self
            .visible
            .iter()
            .filter(|(id, v)| v.node_type == node_type && !self.expanded.contains(*id))
            .map(|(id, _)| id.clone())
            .collect();
        let mut fired = 0;
        for id in &targets {
            if self.expand(id, backend) {
                fired += 1;
            }
        }
        fired
    }

    fn children_ids(&self, parent_id: &str) -> Vec<String> {
        self.view
            .children_of(parent_id)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn drawn_node(&self, node: &NodeDescriptor, position: Option<Position>) -> DrawnNode {
        DrawnNode {
            id: node.id.clone(),
            label: node.label.clone(),
            node_type: node.node_type.clone(),
            title: self.view.titles.get(&node.id).cloned(),
            style: self.styles.style_for(&node.node_type).for_node(node.expandable),
            position,
        }
    }

    fn link(&mut self, from: &str, to: &str, backend: &mut dyn RenderBackend) {
        if !self.edges.insert((from.to_string(), to.to_string())) {
            return;
        }
        let (style, label) = match self.view.edge_meta(from, to) {
            Some(meta) => {
                let style = self.styles.edge_style_for(&meta.edge_type);
                let label = style.label(&meta.properties);
                (style, label)
            }
            None => (self.styles.edge_style_for(DEFAULT_EDGE_TYPE), None),
        };
        backend.add_edge(DrawnEdge {
            from: from.to_string(),
            to: to.to_string(),
            label,
            style,
        });
    }
}

/// Headless backend that records what it was asked to draw.  Nodes added
/// without a position are placed at the origin.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    pub nodes: BTreeMap<String, DrawnNode>,
    pub edges: BTreeMap<(String, String), DrawnEdge>,
    positions: BTreeMap<String, Position>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }

    /// Stand-in for the user dragging a node somewhere.
    pub fn move_node(&mut self, id: &str, position: Position) {
        self.positions.insert(id.to_string(), position);
    }
}

impl RenderBackend for MemoryBackend {
    fn add_node(&mut self, node: DrawnNode) {
        self.positions
            .insert(node.id.clone(), node.position.unwrap_or_default());
        self.nodes.insert(node.id.clone(), node);
    }

    fn add_edge(&mut self, edge: DrawnEdge) {
        self.edges
            .insert((edge.from.clone(), edge.to.clone()), edge);
    }

    fn remove_nodes(&mut self, ids: &[String]) {
        for id in ids {
            self.nodes.remove(id);
            self.positions.remove(id);
        }
        self.edges
            .retain(|(from, to), _| !ids.contains(from) && !ids.contains(to));
    }

    fn remove_edges(&mut self, edges: &[(String, String)]) {
        for edge in edges {
            self.edges.remove(edge);
        }
    }

    fn position(&self, id: &str) -> Option<Position> {
        self.positions.get(id).copied()
    }
}
