//! The engine facade.

use core::fmt;
use std::slice;
use std::sync::{Arc, Mutex, PoisonError};

use async_channel::Receiver;
use canopy_core::{
    ContentFormatter, ContextFactory, DefaultFormatter, HookContextFactory, NodeId, View,
};
use serde_json::Value;
use smol::Task;

use crate::change::{ChangeEvent, ChangeStream, Subscribers};
use crate::scheduler::{RefreshQueue, next_batch};
use crate::tree::NodeStore;
use crate::tree::builder::{Builder, Rejected};
use crate::tree::dispose::destroy;
use crate::{TreeConfig, TreeError};

/// A reconciled view tree.
///
/// All mutation of the node store happens under one asynchronous writer lock,
/// taken by [`Tree::build`], the batch scheduler and the explicit refresh
/// operations. Readers such as [`Tree::serialized_forest`] take the same lock
/// and therefore only ever observe committed state.
///
/// Refresh requests from contexts go through a background task that
/// collects them for [`TreeConfig::batch_window`], deduplicates them and
/// publishes one `Vec<ChangeEvent>` per batch to every [`Tree::subscribe`]r.
pub struct Tree {
    inner: Arc<Inner>,
    scheduler: Mutex<Option<Task<()>>>,
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

struct Inner {
    state: smol::lock::Mutex<TreeState>,
    queue: RefreshQueue,
    subscribers: Subscribers,
    formatter: Box<dyn ContentFormatter>,
    contexts: Box<dyn ContextFactory>,
    config: TreeConfig,
}

struct TreeState {
    store: NodeStore,
    /// Present until the first build consumes it.
    root_view: Option<Box<dyn View>>,
    disposed: bool,
}

impl TreeState {
    const fn ensure_live(&self) -> Result<(), TreeError> {
        if self.disposed {
            Err(TreeError::Disposed)
        } else {
            Ok(())
        }
    }

    fn root(&self) -> Result<NodeId, TreeError> {
        self.ensure_live()?;
        self.store.root().cloned().ok_or(TreeError::NotBuilt)
    }
}

impl Inner {
    fn builder<'a>(&'a self, store: &'a mut NodeStore) -> Builder<'a> {
        Builder::new(
            store,
            self.formatter.as_ref(),
            self.contexts.as_ref(),
            &self.queue,
            self.config.id_length,
        )
    }

    async fn apply_batch(&self, ids: Vec<NodeId>) {
        let mut state = self.state.lock().await;
        if state.disposed {
            return;
        }

        let mut changes = Vec::with_capacity(ids.len());
        for id in ids {
            if !state.store.contains(&id) {
                tracing::debug!(view = %id, "skipping refresh of removed node");
                continue;
            }
            match self.builder(&mut state.store).refresh(&id, false).await {
                Ok(change) => changes.push(change),
                Err(error) => tracing::error!(view = %id, %error, "refresh failed"),
            }
        }

        if !changes.is_empty() {
            self.subscribers.publish(&changes);
            tracing::trace!(
                changes = changes.len(),
                subscribers = self.subscribers.len(),
                "published change batch"
            );
        }
    }
}

async fn run_scheduler(inner: Arc<Inner>, receiver: Receiver<NodeId>) {
    while let Some(batch) = next_batch(&receiver, inner.config.batch_window).await {
        inner.apply_batch(batch).await;
    }
    tracing::debug!("refresh scheduler stopped");
}

impl Tree {
    /// Creates a tree for `root` and starts its refresh scheduler.
    ///
    /// Nothing is built until [`Tree::build`] is awaited. Out-of-range
    /// settings in `config` are clamped, see [`TreeConfig::sanitized`].
    pub fn new(
        root: impl View,
        formatter: impl ContentFormatter,
        contexts: impl ContextFactory,
        config: TreeConfig,
    ) -> Self {
        let config = config.sanitized();
        let (queue, receiver) = RefreshQueue::new();
        let inner = Arc::new(Inner {
            state: smol::lock::Mutex::new(TreeState {
                store: NodeStore::default(),
                root_view: Some(Box::new(root)),
                disposed: false,
            }),
            queue,
            subscribers: Subscribers::default(),
            formatter: Box::new(formatter),
            contexts: Box::new(contexts),
            config,
        });
        let scheduler = smol::spawn(run_scheduler(inner.clone(), receiver));
        Self {
            inner,
            scheduler: Mutex::new(Some(scheduler)),
        }
    }

    /// A tree using [`DefaultFormatter`], [`HookContextFactory`] and the
    /// default configuration.
    pub fn with_defaults(root: impl View) -> Self {
        Self::with_config(root, TreeConfig::default())
    }

    /// A tree using the bundled collaborators and `config`.
    pub fn with_config(root: impl View, config: TreeConfig) -> Self {
        Self::new(root, DefaultFormatter, HookContextFactory, config)
    }

    /// The configuration this tree runs with.
    #[must_use]
    pub fn config(&self) -> &TreeConfig {
        &self.inner.config
    }

    /// Performs the initial full build.
    ///
    /// # Errors
    ///
    /// [`TreeError::AlreadyBuilt`] after a successful build,
    /// [`TreeError::Disposed`] after teardown, and
    /// [`TreeError::UnsupportedContent`] when the formatter rejects produced
    /// content. A failed build can be retried.
    pub async fn build(&self) -> Result<(), TreeError> {
        let mut state = self.inner.state.lock().await;
        state.ensure_live()?;
        let root = state.root_view.take().ok_or(TreeError::AlreadyBuilt)?;

        let built = self.inner.builder(&mut state.store).build_root(root).await;
        let id = match built {
            Ok(id) => id,
            Err(Rejected { error, view, .. }) => {
                state.root_view = Some(view);
                return Err(error);
            }
        };
        tracing::info!(root = %id, nodes = state.store.len(), "tree built");
        tracing::trace!("node tree:\n{}", state.store.dump());
        Ok(())
    }

    /// Queues a partial rebuild of the view `id`.
    ///
    /// Requests are coalesced with others arriving in the same batch window.
    /// Ids that no longer exist when the batch runs are skipped, and requests
    /// after [`Tree::dispose`] are dropped.
    pub fn request_refresh(&self, id: impl Into<NodeId>) {
        self.inner.queue.request(id.into());
    }

    /// Rebuilds the view `id` immediately and publishes the change.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotFound`] or [`TreeError::NotAView`] when `id` does not
    /// name a live view.
    pub async fn refresh(&self, id: &NodeId) -> Result<ChangeEvent, TreeError> {
        self.refresh_with(Some(id), false).await
    }

    /// Rebuilds the whole tree bypassing memoization.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotBuilt`] before [`Tree::build`].
    pub async fn hot_reload(&self) -> Result<ChangeEvent, TreeError> {
        let change = self.refresh_with(None, true).await?;
        tracing::info!(ops = change.patch.len(), "hot reload applied");
        Ok(change)
    }

    async fn refresh_with(
        &self,
        id: Option<&NodeId>,
        hot_reload: bool,
    ) -> Result<ChangeEvent, TreeError> {
        let mut state = self.inner.state.lock().await;
        let root = state.root()?;
        let id = id.unwrap_or(&root);
        let change = self
            .inner
            .builder(&mut state.store)
            .refresh(id, hot_reload)
            .await?;
        self.inner.subscribers.publish(slice::from_ref(&change));
        Ok(change)
    }

    /// The current widget-only output.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotBuilt`] before the first build,
    /// [`TreeError::EmptyForest`] when the root produced no widget, and
    /// [`TreeError::EmptyWidgetChild`] when a widget child resolved to nothing.
    pub async fn serialized_forest(&self) -> Result<Value, TreeError> {
        let state = self.inner.state.lock().await;
        let root = state.root()?;
        state.store.snapshot(&root)?.ok_or(TreeError::EmptyForest)
    }

    /// Forwards an interaction to the widget `widget_id`.
    ///
    /// Returns whether the widget had a handler named `name`.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotFound`], [`TreeError::NotAWidget`], or
    /// [`TreeError::Interaction`] when the handler rejects `args`.
    pub async fn dispatch_interaction(
        &self,
        widget_id: &NodeId,
        name: &str,
        args: &[Value],
    ) -> Result<bool, TreeError> {
        let state = self.inner.state.lock().await;
        state.ensure_live()?;
        let node = state
            .store
            .get(widget_id)
            .ok_or_else(|| TreeError::NotFound(widget_id.clone()))?;
        let widget = node
            .widget()
            .ok_or_else(|| TreeError::NotAWidget(widget_id.clone()))?;
        let handled = widget.handlers().invoke(name, args)?;
        tracing::debug!(widget = %widget_id, name, handled, "interaction dispatched");
        Ok(handled)
    }

    /// A stream of change batches. Ends when the tree is disposed.
    pub fn subscribe(&self) -> ChangeStream {
        self.inner.subscribers.subscribe()
    }

    /// Whether a node with `id` is currently live.
    ///
    /// # Errors
    ///
    /// [`TreeError::Disposed`] after teardown.
    pub async fn contains(&self, id: &NodeId) -> Result<bool, TreeError> {
        let state = self.inner.state.lock().await;
        state.ensure_live()?;
        Ok(state.store.contains(id))
    }

    /// An indented `id:Kind:Type` listing of every node.
    ///
    /// # Errors
    ///
    /// [`TreeError::Disposed`] after teardown.
    pub async fn debug_tree(&self) -> Result<String, TreeError> {
        let state = self.inner.state.lock().await;
        state.ensure_live()?;
        Ok(state.store.dump())
    }

    /// Tears the tree down.
    ///
    /// Stops accepting refresh requests, disposes every view and context,
    /// ends all change streams and stops the scheduler. Calling it again is a
    /// no-op.
    pub async fn dispose(&self) {
        self.inner.queue.close();
        {
            let mut state = self.inner.state.lock().await;
            if !state.disposed {
                state.disposed = true;
                state.root_view = None;
                let removed = state
                    .store
                    .root()
                    .cloned()
                    .map_or(0, |root| destroy(&mut state.store, &root, None));
                tracing::info!(removed, "tree disposed");
            }
        }
        self.inner.subscribers.close();

        let scheduler = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(scheduler) = scheduler {
            scheduler.cancel().await;
        }
    }
}
