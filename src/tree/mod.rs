//! The node arena.
//!
//! Every built view and widget lives in one [`NodeStore`] owned by a single
//! [`Tree`](crate::Tree). Nodes refer to each other by [`NodeId`]; ids are
//! derived from structural paths, so rebuilding a subtree overwrites entries in
//! place instead of allocating new ones.

pub(crate) mod builder;
pub(crate) mod dispose;

use core::fmt::Write as _;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use canopy_core::{Context, NodeId, Path, View, Widget};
use serde_json::Value;

use crate::TreeError;

/// What a node holds.
#[derive(Debug)]
pub(crate) enum NodeKind {
    /// A view and, when stateful, its context. The view is taken out while it
    /// is being rebuilt.
    View {
        view: Option<Box<dyn View>>,
        context: Option<Arc<dyn Context>>,
    },
    /// A widget whose children have been handed to the builder.
    Widget(Box<dyn Widget>),
}

/// A built view or widget.
#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) id: NodeId,
    /// Child slot in the parent, inherited by a view's content.
    pub(crate) index: usize,
    pub(crate) parent_path: Path,
    /// A view has at most one child.
    pub(crate) children: Vec<NodeId>,
    pub(crate) memo_hash: Option<u64>,
    pub(crate) kind: NodeKind,
    pub(crate) ancestor_context: Option<Arc<dyn Context>>,
}

impl Node {
    pub(crate) const fn is_view(&self) -> bool {
        matches!(self.kind, NodeKind::View { .. })
    }

    pub(crate) fn widget(&self) -> Option<&dyn Widget> {
        match &self.kind {
            NodeKind::Widget(widget) => Some(widget.as_ref()),
            NodeKind::View { .. } => None,
        }
    }

    pub(crate) const fn context(&self) -> Option<&Arc<dyn Context>> {
        match &self.kind {
            NodeKind::View { context, .. } => context.as_ref(),
            NodeKind::Widget(_) => None,
        }
    }

    fn label(&self) -> (&'static str, &str) {
        match &self.kind {
            NodeKind::View { view, .. } => (
                "View",
                view.as_deref().map_or("<building>", |view| view.type_name()),
            ),
            NodeKind::Widget(widget) => ("Widget", widget.type_name()),
        }
    }
}

/// Id-indexed storage for the live tree.
#[derive(Debug, Default)]
pub(crate) struct NodeStore {
    nodes: HashMap<NodeId, Node>,
    parents: HashMap<NodeId, NodeId>,
    root: Option<NodeId>,
}

impl NodeStore {
    pub(crate) fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) const fn root(&self) -> Option<&NodeId> {
        self.root.as_ref()
    }

    pub(crate) fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Inserts or overwrites `node`, recording its parent edge.
    pub(crate) fn insert(&mut self, node: Node, parent: Option<&NodeId>) {
        if let Some(parent) = parent {
            self.parents.insert(node.id.clone(), parent.clone());
        }
        self.nodes.insert(node.id.clone(), node);
    }

    /// Removes a node and its parent edge. Children are left alone.
    pub(crate) fn remove(&mut self, id: &NodeId) -> Option<Node> {
        self.parents.remove(id);
        if self.root.as_ref() == Some(id) {
            self.root = None;
        }
        self.nodes.remove(id)
    }

    pub(crate) fn parent_of(&self, id: &NodeId) -> Option<&NodeId> {
        self.parents.get(id)
    }

    /// Takes the view out of a view node so it can be rebuilt.
    pub(crate) fn take_view(&mut self, id: &NodeId) -> Option<Box<dyn View>> {
        match &mut self.nodes.get_mut(id)?.kind {
            NodeKind::View { view, .. } => view.take(),
            NodeKind::Widget(_) => None,
        }
    }

    /// Puts a view back into a node emptied by [`NodeStore::take_view`].
    ///
    /// Does nothing if the node is gone or already holds a view.
    pub(crate) fn restore_view(&mut self, id: &NodeId, restored: Box<dyn View>) {
        if let Some(Node {
            kind: NodeKind::View { view: slot @ None, .. },
            ..
        }) = self.nodes.get_mut(id)
        {
            *slot = Some(restored);
        }
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Every id below `id`, excluding `id` itself.
    pub(crate) fn descendants(&self, id: &NodeId) -> HashSet<NodeId> {
        let mut found = HashSet::new();
        let mut pending = self
            .get(id)
            .map(|node| node.children.clone())
            .unwrap_or_default();
        while let Some(next) = pending.pop() {
            if let Some(node) = self.get(&next) {
                pending.extend(node.children.iter().cloned());
            }
            found.insert(next);
        }
        found
    }

    /// Position of `id`'s output inside the widget-only forest.
    pub(crate) fn widget_indices(&self, id: &NodeId) -> Result<Vec<usize>, TreeError> {
        let node = self
            .get(id)
            .ok_or_else(|| TreeError::NotFound(id.clone()))?;
        Ok(node.parent_path.widget_indices(node.index))
    }

    /// The nearest widget at or below `id`, following view children.
    pub(crate) fn resolve_widget(&self, id: &NodeId) -> Option<&dyn Widget> {
        let mut node = self.get(id)?;
        loop {
            match &node.kind {
                NodeKind::Widget(widget) => return Some(widget.as_ref()),
                NodeKind::View { .. } => node = self.get(node.children.first()?)?,
            }
        }
    }

    /// Widget-only snapshot of the subtree at `id`.
    ///
    /// Views collapse into their single child. `Ok(None)` means the subtree
    /// produced no widget at all.
    pub(crate) fn snapshot(&self, id: &NodeId) -> Result<Option<Value>, TreeError> {
        let node = self
            .get(id)
            .ok_or_else(|| TreeError::NotFound(id.clone()))?;
        let widget = match &node.kind {
            NodeKind::View { .. } => {
                return match node.children.first() {
                    Some(child) => self.snapshot(child),
                    None => Ok(None),
                };
            }
            NodeKind::Widget(widget) => widget,
        };

        let mut children = Vec::with_capacity(node.children.len());
        for child in &node.children {
            let snapshot = self
                .snapshot(child)?
                .ok_or_else(|| TreeError::EmptyWidgetChild {
                    parent: id.clone(),
                    child: child.clone(),
                })?;
            children.push(snapshot);
        }

        let attached = widget
            .attached_props()
            .iter()
            .map(|attached| {
                let values = node
                    .children
                    .iter()
                    .map(|child| {
                        self.resolve_widget(child)
                            .and_then(|child| child.attached_value(widget.type_name(), &attached.name))
                            .cloned()
                            .unwrap_or(Value::Null)
                    })
                    .collect();
                (attached.prop.clone(), Value::Array(values))
            })
            .collect();

        Ok(Some(widget.serialize(children, attached)))
    }

    /// Indented `id:Kind:Type` listing of the tree.
    pub(crate) fn dump(&self) -> String {
        let mut out = String::new();
        if let Some(root) = &self.root {
            self.dump_node(root, 0, &mut out);
        }
        out
    }

    fn dump_node(&self, id: &NodeId, depth: usize, out: &mut String) {
        let Some(node) = self.get(id) else {
            return;
        };
        let (kind, type_name) = node.label();
        let _ = writeln!(out, "{:depth$}{id}:{kind}:{type_name}", "");
        for child in &node.children {
            self.dump_node(child, depth + 1, out);
        }
    }
}
