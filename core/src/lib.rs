//! # Canopy Core
//!
//! Collaborator contracts and leaf algorithms for the Canopy reconciliation
//! engine. The engine itself lives in the `canopy` crate; this crate defines
//! what it consumes:
//!
//! - [`View`]: a content-producing unit with identity and lifecycle hooks.
//! - [`Widget`]: a structural, serializable output node, with [`Element`] as a
//!   generic implementation.
//! - [`Content`] and [`ContentFormatter`]: what a view produces and how values
//!   that are neither views nor widgets get turned into one.
//! - [`Context`] and [`ContextFactory`]: per-view state storage that survives
//!   rebuilds, with [`HookContext`] as the bundled implementation.
//! - [`generate_id`] and [`compute_memo_hash`]: deterministic node identity and
//!   memoization fingerprints.

extern crate alloc;

#[macro_use]
mod macros;

pub mod content;
pub mod context;
pub mod error;
pub mod handler;
pub mod hooks;
pub mod id;
pub mod memo;
pub mod path;
pub mod view;
pub mod widget;

pub use content::{Content, ContentFormatter, DefaultFormatter, Formatted};
pub use context::{Context, ContextFactory, RefreshHandle};
pub use error::{InteractionError, ViewError};
pub use handler::Handlers;
pub use hooks::{HookContext, HookContextFactory, State};
pub use id::{DEFAULT_ID_LENGTH, NodeId, generate_id};
pub use memo::{Dep, compute_memo_hash, stable_hash};
pub use path::{Path, PathSegment};
pub use view::{FnView, View};
pub use widget::{AttachedProp, Element, Props, Widget, WidgetBase};
