//! Per-view state storage that outlives individual builds.

use alloc::sync::Arc;
use core::any::Any;
use core::fmt;

/// Mutable per-view storage bound to one node id across rebuilds.
///
/// The engine only needs the lifecycle half of a context: it resets the
/// context after every build so call-order based lookups replay identically,
/// and disposes it exactly once when the node is removed. Views reach the
/// concrete type through [`Context::as_any`].
pub trait Context: Send + Sync + 'static {
    /// Rewinds any per-build cursor.
    fn reset(&self);

    /// Releases all resources. Called exactly once.
    fn dispose(&self);

    /// Exposes the concrete context for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn Context")
    }
}

/// A cloneable callback that re-enqueues the owning view for rebuild.
#[derive(Clone)]
pub struct RefreshHandle(Arc<dyn Fn() + Send + Sync>);

impl_debug!(RefreshHandle);

impl RefreshHandle {
    /// Wraps a refresh callback.
    pub fn new(callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    /// A handle that does nothing when invoked.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Requests a rebuild of the owning view.
    pub fn request(&self) {
        (self.0)();
    }
}

/// Creates contexts for stateful views.
pub trait ContextFactory: Send + Sync + 'static {
    /// Creates a fresh context wired to `refresh`, chained to `ancestor`.
    fn create(&self, refresh: RefreshHandle, ancestor: Option<Arc<dyn Context>>) -> Arc<dyn Context>;
}

impl<F> ContextFactory for F
where
    F: Fn(RefreshHandle, Option<Arc<dyn Context>>) -> Arc<dyn Context> + Send + Sync + 'static,
{
    fn create(&self, refresh: RefreshHandle, ancestor: Option<Arc<dyn Context>>) -> Arc<dyn Context> {
        self(refresh, ancestor)
    }
}
