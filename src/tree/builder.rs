//! Recursive construction of nodes from views and widgets.
//!
//! A [`Builder`] borrows the node store for the duration of one pass. The
//! caller must hold the tree's writer lock for as long as the builder lives.

use core::panic::AssertUnwindSafe;
use std::panic;
use std::sync::Arc;

use canopy_core::{
    Content, ContentFormatter, Context, ContextFactory, Formatted, NodeId, Path, PathSegment,
    View, ViewError, Widget, compute_memo_hash, generate_id,
};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use super::dispose::{destroy_removed, destroy_unreachable};
use super::{Node, NodeKind, NodeStore};
use crate::scheduler::RefreshQueue;
use crate::{ChangeEvent, TreeError, patch};

/// Flags threaded through one build pass.
#[derive(Debug, Clone, Copy, Default)]
struct Mode {
    /// This exact view was asked to refresh and must not be skipped.
    refreshing: bool,
    /// Memoization is bypassed for the whole subtree.
    hot_reload: bool,
}

impl Mode {
    /// Mode handed to children: only the hot reload flag propagates.
    const fn descend(self) -> Self {
        Self {
            refreshing: false,
            hot_reload: self.hot_reload,
        }
    }
}

/// A view whose build failed, handed back to the caller.
#[derive(Debug)]
pub(crate) struct Rejected {
    pub(crate) id: NodeId,
    pub(crate) error: TreeError,
    pub(crate) view: Box<dyn View>,
}

pub(crate) struct Builder<'a> {
    store: &'a mut NodeStore,
    formatter: &'a dyn ContentFormatter,
    contexts: &'a dyn ContextFactory,
    queue: &'a RefreshQueue,
    id_length: usize,
}

impl<'a> Builder<'a> {
    pub(crate) fn new(
        store: &'a mut NodeStore,
        formatter: &'a dyn ContentFormatter,
        contexts: &'a dyn ContextFactory,
        queue: &'a RefreshQueue,
        id_length: usize,
    ) -> Self {
        Self {
            store,
            formatter,
            contexts,
            queue,
            id_length,
        }
    }

    /// Builds the whole tree from `root` and records it as the store's root.
    ///
    /// On failure the root view is handed back and every node built so far is
    /// disposed, so the build can be retried.
    pub(crate) async fn build_root(&mut self, root: Box<dyn View>) -> Result<NodeId, Rejected> {
        match self
            .build_view_keeping(root, Path::new(), 0, None, None, Mode::default())
            .await
        {
            Ok(id) => {
                self.store.set_root(id.clone());
                Ok(id)
            }
            Err(rejected) => {
                destroy_unreachable(self.store);
                Err(rejected)
            }
        }
    }

    /// Rebuilds the view at `id` in place and diffs its widget output.
    ///
    /// The view itself is always rebuilt; its descendants still honor their
    /// own memoization unless `hot_reload` is set.
    pub(crate) async fn refresh(&mut self, id: &NodeId, hot_reload: bool) -> Result<ChangeEvent, TreeError> {
        let node = self
            .store
            .get(id)
            .ok_or_else(|| TreeError::NotFound(id.clone()))?;
        if !node.is_view() {
            return Err(TreeError::NotAView(id.clone()));
        }
        let index = node.index;
        let parent_path = node.parent_path.clone();
        let ancestor = node.ancestor_context.clone();
        let parent = self.store.parent_of(id).cloned();
        let indices = self.store.widget_indices(id)?;
        let before = self.store.snapshot(id)?;

        let view = self
            .store
            .take_view(id)
            .ok_or_else(|| TreeError::NotAView(id.clone()))?;
        let mode = Mode {
            refreshing: true,
            hot_reload,
        };
        let rebuilt = match self
            .build_view_keeping(view, parent_path, index, parent.as_ref(), ancestor, mode)
            .await
        {
            Ok(rebuilt) => rebuilt,
            Err(Rejected { error, view, .. }) => {
                self.store.restore_view(id, view);
                let swept = destroy_unreachable(self.store);
                tracing::debug!(view = %id, swept, %error, "refresh failed, view restored");
                return Err(error);
            }
        };
        // Ids are structural, so the parent's edge to `rebuilt` is already in place.
        if parent.is_none() {
            self.store.set_root(rebuilt.clone());
        }

        let after = self.store.snapshot(&rebuilt)?;
        let patch = patch::diff(
            &before.unwrap_or(Value::Null),
            &after.unwrap_or(Value::Null),
        );
        tracing::debug!(view = %rebuilt, ops = patch.len(), hot_reload, "view refreshed");
        Ok(ChangeEvent {
            view_id: rebuilt,
            indices,
            patch,
        })
    }

    /// Builds a nested view. A view that fails to build is disposed unless
    /// an older node still holds its id.
    fn build_view<'s>(
        &'s mut self,
        view: Box<dyn View>,
        path: Path,
        index: usize,
        parent: Option<&'s NodeId>,
        ancestor: Option<Arc<dyn Context>>,
        mode: Mode,
    ) -> BoxFuture<'s, Result<NodeId, TreeError>> {
        async move {
            match self
                .build_view_keeping(view, path, index, parent, ancestor, mode)
                .await
            {
                Ok(id) => Ok(id),
                Err(Rejected { id, error, mut view }) => {
                    if !self.store.contains(&id) {
                        view.dispose();
                    }
                    Err(error)
                }
            }
        }
        .boxed()
    }

    fn build_view_keeping<'s>(
        &'s mut self,
        mut view: Box<dyn View>,
        mut path: Path,
        index: usize,
        parent: Option<&'s NodeId>,
        ancestor: Option<Arc<dyn Context>>,
        mode: Mode,
    ) -> BoxFuture<'s, Result<NodeId, Rejected>> {
        async move {
            let parent_path = path.clone();
            path.push(PathSegment::view(view.type_name(), view.key(), index));
            let id = generate_id(&path, self.id_length);
            view.set_id(id.clone());

            let memo_hash = view
                .dependencies()
                .map(|deps| compute_memo_hash(id.as_str(), &deps));
            let previous = self.store.get(&id);
            let previous_context = previous.and_then(Node::context).cloned();
            let reused = previous.and_then(|previous| {
                let unchanged = memo_hash.is_some() && previous.memo_hash == memo_hash;
                (unchanged && !mode.refreshing && !mode.hot_reload)
                    .then(|| previous.children.first().cloned())
            });
            let previous_descendants = previous.map(|_| self.store.descendants(&id));

            let (child, context) = if let Some(child) = reused {
                tracing::trace!(view = %id, "dependencies unchanged, reusing subtree");
                (Ok(child), previous_context)
            } else if view.is_stateless() {
                let content = run_build(view.as_mut()).await;
                let child = self
                    .build_content(content, path, index, &id, ancestor.clone(), mode.descend())
                    .await;
                (child, None)
            } else {
                let fresh = previous_context.is_none();
                let context = previous_context.unwrap_or_else(|| {
                    self.contexts
                        .create(self.queue.handle_for(id.clone()), ancestor.clone())
                });
                view.before_build(context.clone());
                let content = run_build(view.as_mut()).await;
                let child = self
                    .build_content(content, path, index, &id, Some(context.clone()), mode.descend())
                    .await;
                view.after_build();
                context.reset();
                if child.is_err() && fresh {
                    context.dispose();
                }
                (child, Some(context))
            };
            let child = match child {
                Ok(child) => child,
                Err(error) => return Err(Rejected { id, error, view }),
            };

            self.store.insert(
                Node {
                    id: id.clone(),
                    index,
                    parent_path,
                    children: child.into_iter().collect(),
                    memo_hash,
                    kind: NodeKind::View {
                        view: Some(view),
                        context,
                    },
                    ancestor_context: ancestor,
                },
                parent,
            );

            if let Some(previous) = previous_descendants {
                let current = self.store.descendants(&id);
                let skip = (mode.refreshing && !mode.hot_reload).then_some(&id);
                let disposed = destroy_removed(self.store, &previous, &current, skip);
                if disposed > 0 {
                    tracing::debug!(view = %id, disposed, "disposed superseded nodes");
                }
            }
            Ok(id)
        }
        .boxed()
    }

    fn build_widget<'s>(
        &'s mut self,
        mut widget: Box<dyn Widget>,
        mut path: Path,
        index: usize,
        parent: &'s NodeId,
        ancestor: Option<Arc<dyn Context>>,
        mode: Mode,
    ) -> BoxFuture<'s, Result<NodeId, TreeError>> {
        async move {
            let parent_path = path.clone();
            path.push(PathSegment::widget(widget.type_name(), widget.key(), index));
            let id = generate_id(&path, self.id_length);
            widget.set_id(id.clone());

            let mut children = Vec::new();
            for (slot, child) in widget.take_children().into_iter().enumerate() {
                let built = self
                    .build_content(child, path.clone(), slot, &id, ancestor.clone(), mode)
                    .await?;
                children.extend(built);
            }

            self.store.insert(
                Node {
                    id: id.clone(),
                    index,
                    parent_path,
                    children,
                    memo_hash: None,
                    kind: NodeKind::Widget(widget),
                    ancestor_context: ancestor,
                },
                Some(parent),
            );
            Ok(id)
        }
        .boxed()
    }

    /// Resolves `content` into a child node. `Ok(None)` prunes the branch.
    fn build_content<'s>(
        &'s mut self,
        content: Content,
        path: Path,
        index: usize,
        parent: &'s NodeId,
        ancestor: Option<Arc<dyn Context>>,
        mode: Mode,
    ) -> BoxFuture<'s, Result<Option<NodeId>, TreeError>> {
        async move {
            let formatted = match content {
                Content::Empty => return Ok(None),
                Content::View(view) => Formatted::View(view),
                Content::Widget(widget) => Formatted::Widget(widget),
                other => {
                    if !self.formatter.can_handle(&other) {
                        return Err(TreeError::UnsupportedContent { kind: other.kind() });
                    }
                    match self.formatter.format(other) {
                        Some(formatted) => formatted,
                        None => return Ok(None),
                    }
                }
            };
            let id = match formatted {
                Formatted::View(view) => {
                    self.build_view(view, path, index, Some(parent), ancestor, mode)
                        .await?
                }
                Formatted::Widget(widget) => {
                    self.build_widget(widget, path, index, parent, ancestor, mode)
                        .await?
                }
            };
            Ok(Some(id))
        }
        .boxed()
    }
}

/// Runs one view's build step, turning errors and panics into error content.
async fn run_build(view: &mut dyn View) -> Content {
    let name = view.type_name();
    let started = panic::catch_unwind(AssertUnwindSafe(move || {
        let view = view;
        view.build()
    }));
    let outcome = match started {
        Ok(pending) => AssertUnwindSafe(pending).catch_unwind().await,
        Err(payload) => Err(payload),
    };
    match outcome {
        Ok(Ok(content)) => content,
        Ok(Err(error)) => {
            tracing::warn!(view = name, error = %error, "view build failed");
            Content::Error(ViewError::from_error(name, &error))
        }
        Err(payload) => {
            let error = ViewError::from_panic(name, payload.as_ref());
            tracing::warn!(view = name, error = %error.message, "view build panicked");
            Content::Error(error)
        }
    }
}
