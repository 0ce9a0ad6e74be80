//! The view contract.
//!
//! A view is the unit of reconciliation: it has an identity assigned by the
//! engine, an optional key, lifecycle hooks around its build step and an
//! optional list of dependencies that lets the engine skip rebuilding it.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::type_name;
use core::fmt;

use futures::future::{BoxFuture, FutureExt};

use crate::{Content, Context, NodeId, memo::Dep, path::short_type_name};

/// A content-producing component.
///
/// Only [`View::build`] is required. Stateful views receive their context in
/// [`View::before_build`] and should keep it until [`View::after_build`].
pub trait View: Send + Sync + 'static {
    /// Short type name used in structural paths.
    fn type_name(&self) -> &'static str {
        short_type_name(type_name::<Self>())
    }

    /// Optional key distinguishing siblings of the same type.
    fn key(&self) -> Option<&str> {
        None
    }

    /// Receives the id the engine derived for this view.
    fn set_id(&mut self, _id: NodeId) {}

    /// Stateless views are built without a context.
    fn is_stateless(&self) -> bool {
        false
    }

    /// Declared dependencies. `Some` opts the view into memoization.
    fn dependencies(&self) -> Option<Vec<Dep>> {
        None
    }

    /// Binds the view's context before the build step.
    fn before_build(&mut self, _context: Arc<dyn Context>) {}

    /// Produces the view's content. May suspend.
    fn build(&mut self) -> BoxFuture<'_, anyhow::Result<Content>>;

    /// Releases the per-build binding.
    fn after_build(&mut self) {}

    /// Releases resources held by the view. Called exactly once.
    fn dispose(&mut self) {}
}

impl fmt::Debug for dyn View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("type", &self.type_name())
            .field("key", &self.key())
            .finish()
    }
}

/// A stateless view backed by a closure.
pub struct FnView<F> {
    name: &'static str,
    key: Option<alloc::string::String>,
    f: F,
}

impl<F> fmt::Debug for FnView<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnView")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<F> FnView<F>
where
    F: Fn() -> Content + Send + Sync + 'static,
{
    /// Creates a stateless view named `name`.
    pub const fn new(name: &'static str, f: F) -> Self {
        Self { name, key: None, f }
    }

    /// Sets the sibling key.
    #[must_use]
    pub fn key(mut self, key: impl Into<alloc::string::String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

impl<F> View for FnView<F>
where
    F: Fn() -> Content + Send + Sync + 'static,
{
    fn type_name(&self) -> &'static str {
        self.name
    }

    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn is_stateless(&self) -> bool {
        true
    }

    fn build(&mut self) -> BoxFuture<'_, anyhow::Result<Content>> {
        let content = (self.f)();
        async move { Ok(content) }.boxed()
    }
}

impl<V: View> From<V> for Content {
    fn from(view: V) -> Self {
        Self::View(Box::new(view))
    }
}
