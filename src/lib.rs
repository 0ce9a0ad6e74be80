#![doc = include_str!("../README.md")]
#![allow(clippy::multiple_crate_versions)]

/// Change events and the subscriber stream.
pub mod change;
/// Engine configuration loaded from the environment or a host file.
pub mod config;
pub mod error;
pub mod logging;
pub mod patch;
pub mod scheduler;
pub(crate) mod tree;
mod widget_tree;

pub use change::{ChangeEvent, ChangeStream};
pub use config::TreeConfig;
#[doc(inline)]
pub use error::{ConfigError, PatchError, TreeError};
pub use patch::{Patch, PatchOp, diff};
pub use scheduler::RefreshQueue;
pub use widget_tree::Tree;

#[doc(inline)]
pub use canopy_core::{
    Content, ContentFormatter, Context, ContextFactory, DefaultFormatter, Dep, Element, FnView,
    Formatted, HookContext, HookContextFactory, NodeId, RefreshHandle, State, View, ViewError,
    Widget,
};
pub use tracing as log;

pub mod prelude {
    //! The types most hosts need, importable at once.
    //!
    //! ```rust
    //! use canopy::prelude::*;
    //!
    //! let tree = Tree::with_defaults(FnView::new("App", || Content::Empty));
    //! assert_eq!(tree.config(), &TreeConfig::default());
    //! ```
    pub use super::{ChangeEvent, ChangeStream, Patch, PatchOp, Tree, TreeConfig, TreeError};
    pub use canopy_core::{
        AttachedProp, Content, ContentFormatter, Context, ContextFactory, DefaultFormatter, Dep,
        Element, FnView, Formatted, HookContext, HookContextFactory, NodeId, RefreshHandle, State,
        View, ViewError, Widget, WidgetBase,
    };
}
