//! Per-widget interaction handlers.
//!
//! Every widget instance carries a [`Handlers`] table mapping an interaction
//! name to a typed closure. The table is filled while the widget is
//! constructed, so dispatching an interaction is a lookup followed by a call.
//!
//! - [`Handlers::on`] registers a handler that takes no arguments.
//! - [`Handlers::on_value`] registers a handler that decodes its first
//!   argument into `T`.
//! - [`Handlers::on_args`] registers a handler over the raw argument list.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::InteractionError;

type HandlerFn = Arc<dyn Fn(&[Value]) -> Result<(), InteractionError> + Send + Sync>;

/// A name-indexed table of interaction handlers.
#[derive(Clone, Default)]
pub struct Handlers {
    table: BTreeMap<String, HandlerFn>,
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.table.keys()).finish()
    }
}

impl Handlers {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler that ignores its arguments.
    pub fn on(&mut self, name: impl Into<String>, handler: impl Fn() + Send + Sync + 'static) {
        self.table.insert(
            name.into(),
            Arc::new(move |_: &[Value]| {
                handler();
                Ok(())
            }),
        );
    }

    /// Registers a handler whose first argument decodes into `T`.
    pub fn on_value<T, F>(&mut self, name: impl Into<String>, handler: F)
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let name = name.into();
        let event = name.clone();
        self.table.insert(
            name,
            Arc::new(move |args: &[Value]| {
                let raw = args.first().ok_or_else(|| InteractionError::MissingArgument {
                    name: event.clone(),
                })?;
                let value = T::deserialize(raw).map_err(|source| {
                    InteractionError::InvalidArgument {
                        name: event.clone(),
                        source,
                    }
                })?;
                handler(value);
                Ok(())
            }),
        );
    }

    /// Registers a handler over the raw argument list.
    pub fn on_args<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&[Value]) -> Result<(), InteractionError> + Send + Sync + 'static,
    {
        self.table.insert(name.into(), Arc::new(handler));
    }

    /// Invokes the handler registered under `name`.
    ///
    /// Returns `Ok(false)` when no such handler exists.
    ///
    /// # Errors
    ///
    /// Propagates the handler's [`InteractionError`].
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<bool, InteractionError> {
        let Some(handler) = self.table.get(name) else {
            return Ok(false);
        };
        handler(args)?;
        Ok(true)
    }

    /// Whether a handler is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Registered interaction names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.table.keys().map(String::as_str).collect()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
