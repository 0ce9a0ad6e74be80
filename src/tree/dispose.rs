//! Releasing views and contexts of removed nodes.

use std::collections::HashSet;

use canopy_core::NodeId;

use super::{NodeKind, NodeStore};

/// Disposes and removes `id`, then recurses into its children.
///
/// When `id` equals `skip` the node itself survives but its children are still
/// destroyed; children never inherit `skip`. Returns the number of nodes
/// removed. Missing ids are a no-op, so every view and context is disposed at
/// most once.
pub(crate) fn destroy(store: &mut NodeStore, id: &NodeId, skip: Option<&NodeId>) -> usize {
    let children = if skip == Some(id) {
        match store.get(id) {
            Some(node) => node.children.clone(),
            None => return 0,
        }
    } else {
        let Some(node) = store.remove(id) else {
            return 0;
        };
        if let NodeKind::View { view, context } = node.kind {
            if let Some(mut view) = view {
                view.dispose();
            }
            if let Some(context) = context {
                context.dispose();
            }
        }
        node.children
    };

    let removed = usize::from(skip != Some(id));
    children
        .iter()
        .fold(removed, |count, child| count + destroy(store, child, None))
}

/// Destroys every id in `previous` that is absent from `current`.
pub(crate) fn destroy_removed(
    store: &mut NodeStore,
    previous: &HashSet<NodeId>,
    current: &HashSet<NodeId>,
    skip: Option<&NodeId>,
) -> usize {
    previous
        .difference(current)
        .map(|id| destroy(store, id, skip))
        .sum()
}

/// Destroys every node no longer reachable from the root.
///
/// A build that fails part way leaves freshly inserted nodes that no parent
/// lists as a child. Without a root every node is unreachable.
pub(crate) fn destroy_unreachable(store: &mut NodeStore) -> usize {
    let reachable = match store.root().cloned() {
        Some(root) => {
            let mut reachable = store.descendants(&root);
            reachable.insert(root);
            reachable
        }
        None => HashSet::new(),
    };
    let orphans = store
        .ids()
        .filter(|id| !reachable.contains(*id))
        .cloned()
        .collect::<Vec<_>>();
    orphans.iter().map(|id| destroy(store, id, None)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Node;
    use canopy_core::{Content, Context, Path, View};
    use core::any::Any;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        views: AtomicUsize,
        contexts: AtomicUsize,
    }

    struct Probe(Arc<Counters>);

    impl Context for Probe {
        fn reset(&self) {}

        fn dispose(&self) {
            self.0.contexts.fetch_add(1, Ordering::SeqCst);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Disposable(Arc<Counters>);

    impl View for Disposable {
        fn build(&mut self) -> futures::future::BoxFuture<'_, anyhow::Result<Content>> {
            Box::pin(async { Ok(Content::Empty) })
        }

        fn dispose(&mut self) {
            self.0.views.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn view(id: &str, children: &[&str], counters: &Arc<Counters>) -> Node {
        Node {
            id: NodeId::from(id),
            index: 0,
            parent_path: Path::new(),
            children: children.iter().map(|c| NodeId::from(*c)).collect(),
            memo_hash: None,
            kind: NodeKind::View {
                view: Some(Box::new(Disposable(counters.clone()))),
                context: Some(Arc::new(Probe(counters.clone()))),
            },
            ancestor_context: None,
        }
    }

    /// a > b > c, a > d
    fn chain(counters: &Arc<Counters>) -> NodeStore {
        let mut store = NodeStore::default();
        store.insert(view("a", &["b", "d"], counters), None);
        store.insert(view("b", &["c"], counters), Some(&NodeId::from("a")));
        store.insert(view("c", &[], counters), Some(&NodeId::from("b")));
        store.insert(view("d", &[], counters), Some(&NodeId::from("a")));
        store.set_root(NodeId::from("a"));
        store
    }

    #[test]
    fn destroy_disposes_whole_subtree() {
        let counters = Arc::new(Counters::default());
        let mut store = chain(&counters);
        assert_eq!(destroy(&mut store, &NodeId::from("a"), None), 4);
        assert_eq!(store.len(), 0);
        assert!(store.root().is_none());
        assert_eq!(counters.views.load(Ordering::SeqCst), 4);
        assert_eq!(counters.contexts.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn skipped_node_survives_but_children_do_not() {
        let counters = Arc::new(Counters::default());
        let mut store = chain(&counters);
        assert_eq!(
            destroy(&mut store, &NodeId::from("b"), Some(&NodeId::from("b"))),
            1
        );
        assert!(store.contains(&NodeId::from("b")));
        assert!(!store.contains(&NodeId::from("c")));
        assert_eq!(counters.views.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_sets_are_disposed_exactly_once() {
        let counters = Arc::new(Counters::default());
        let mut store = chain(&counters);
        let previous = ["b", "c", "d"].into_iter().map(NodeId::from).collect();
        let current = ["d"].into_iter().map(NodeId::from).collect();

        assert_eq!(destroy_removed(&mut store, &previous, &current, None), 2);
        assert_eq!(destroy_removed(&mut store, &previous, &current, None), 0);
        assert_eq!(counters.views.load(Ordering::SeqCst), 2);
        assert_eq!(counters.contexts.load(Ordering::SeqCst), 2);
        assert!(store.contains(&NodeId::from("d")));
    }

    #[test]
    fn unreachable_nodes_are_swept() {
        let counters = Arc::new(Counters::default());
        let mut store = chain(&counters);
        store.insert(view("orphan", &["leaf"], &counters), Some(&NodeId::from("b")));
        store.insert(view("leaf", &[], &counters), Some(&NodeId::from("orphan")));

        assert_eq!(destroy_unreachable(&mut store), 2);
        assert_eq!(store.len(), 4);
        assert_eq!(counters.views.load(Ordering::SeqCst), 2);
        assert_eq!(counters.contexts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn without_a_root_everything_is_unreachable() {
        let counters = Arc::new(Counters::default());
        let mut store = chain(&counters);
        store.remove(&NodeId::from("a"));
        assert_eq!(destroy_unreachable(&mut store), 3);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn missing_ids_are_ignored() {
        let mut store = NodeStore::default();
        assert_eq!(destroy(&mut store, &NodeId::from("ghost"), None), 0);
    }
}
