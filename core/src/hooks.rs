//! The bundled hook-style [`Context`].
//!
//! State slots are indexed by call order: the n-th `use_state` call during a
//! build always returns the n-th slot. The engine resets the cursor after each
//! build so the order replays on the next one.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::{Any, TypeId, type_name};
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::{Context, ContextFactory, RefreshHandle};

type Slot = Arc<dyn Any + Send + Sync>;

/// A hook context bound to one view node.
pub struct HookContext {
    refresh: RefreshHandle,
    ancestor: Option<Arc<dyn Context>>,
    slots: Mutex<Vec<Slot>>,
    cursor: AtomicUsize,
    provided: Mutex<HashMap<TypeId, Slot>>,
    cleanups: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    disposed: Arc<AtomicBool>,
}

impl fmt::Debug for HookContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl HookContext {
    /// Creates a context that requests refreshes through `refresh`.
    #[must_use]
    pub fn new(refresh: RefreshHandle, ancestor: Option<Arc<dyn Context>>) -> Self {
        Self {
            refresh,
            ancestor,
            slots: Mutex::new(Vec::new()),
            cursor: AtomicUsize::new(0),
            provided: Mutex::new(HashMap::new()),
            cleanups: Mutex::new(Vec::new()),
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Downcasts a type-erased context.
    #[must_use]
    pub fn from_dyn(context: &Arc<dyn Context>) -> Option<&Self> {
        context.as_any().downcast_ref::<Self>()
    }

    /// Returns the state slot for the current call position.
    ///
    /// `init` only runs the first time the slot is reached.
    ///
    /// # Panics
    ///
    /// Panics if the slot at this position was created with a different type,
    /// which means hooks were called in a different order than last build.
    pub fn use_state<T>(&self, init: impl FnOnce() -> T) -> State<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let position = self.cursor.fetch_add(1, Ordering::SeqCst);
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if position == slots.len() {
            slots.push(Arc::new(Mutex::new(init())));
        }
        let slot = slots[position].clone();
        drop(slots);

        let cell = slot.downcast::<Mutex<T>>().unwrap_or_else(|_| {
            panic!(
                "hook order changed: slot {position} is not `{}`",
                type_name::<T>()
            )
        });
        State {
            cell,
            refresh: self.refresh.clone(),
            disposed: self.disposed.clone(),
        }
    }

    /// Makes `value` visible to descendants through [`HookContext::consume`].
    pub fn provide<T: Send + Sync + 'static>(&self, value: T) {
        self.provided
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Finds the nearest provided `T`, starting with this context.
    #[must_use]
    pub fn consume<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let local = self
            .provided
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<T>())
            .cloned();
        if let Some(found) = local {
            return found.downcast::<T>().ok();
        }
        let ancestor = self.ancestor.as_ref()?;
        Self::from_dyn(ancestor)?.consume::<T>()
    }

    /// Registers a callback run once when the context is disposed.
    pub fn on_dispose(&self, cleanup: impl FnOnce() + Send + 'static) {
        self.cleanups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(cleanup));
    }

    /// Requests a rebuild of the owning view unless disposed.
    pub fn request_refresh(&self) {
        if !self.is_disposed() {
            self.refresh.request();
        }
    }

    /// Whether [`Context::dispose`] has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Context for HookContext {
    fn reset(&self) {
        self.cursor.store(0, Ordering::SeqCst);
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let cleanups = core::mem::take(
            &mut *self.cleanups.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for cleanup in cleanups {
            cleanup();
        }
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A handle to one state slot of a [`HookContext`].
///
/// Setting the value requests a rebuild of the owning view. Once the context
/// is disposed the value can still be read and written but no rebuild is
/// requested.
pub struct State<T> {
    cell: Arc<Mutex<T>>,
    refresh: RefreshHandle,
    disposed: Arc<AtomicBool>,
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            refresh: self.refresh.clone(),
            disposed: self.disposed.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("State")
            .field(&*self.cell.lock().unwrap_or_else(PoisonError::into_inner))
            .finish()
    }
}

impl<T: Clone> State<T> {
    /// Returns a copy of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.cell
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the value and requests a rebuild.
    pub fn set(&self, value: T) {
        *self.cell.lock().unwrap_or_else(PoisonError::into_inner) = value;
        self.notify();
    }

    /// Mutates the value in place and requests a rebuild.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut *self.cell.lock().unwrap_or_else(PoisonError::into_inner));
        self.notify();
    }

    fn notify(&self) {
        if !self.disposed.load(Ordering::SeqCst) {
            self.refresh.request();
        }
    }
}

/// Creates a [`HookContext`] for every stateful view.
#[derive(Debug, Clone, Copy, Default)]
pub struct HookContextFactory;

impl ContextFactory for HookContextFactory {
    fn create(&self, refresh: RefreshHandle, ancestor: Option<Arc<dyn Context>>) -> Arc<dyn Context> {
        Arc::new(HookContext::new(refresh, ancestor))
    }
}
