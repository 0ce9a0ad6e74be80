//! Engine errors.

use canopy_core::{InteractionError, NodeId};

/// Contract errors raised by [`Tree`](crate::Tree) operations.
///
/// None of these are retried. Per-view build failures never show up here: they
/// are captured and rendered in place of the failing view.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// No node with this id exists.
    #[error("node `{0}` does not exist")]
    NotFound(NodeId),
    /// The id resolves to a widget where a view was required.
    #[error("node `{0}` is not a view")]
    NotAView(NodeId),
    /// The id resolves to a view where a widget was required.
    #[error("node `{0}` is not a widget")]
    NotAWidget(NodeId),
    /// A widget child resolved to no widget at serialization time.
    #[error("child `{child}` of widget `{parent}` does not resolve to a widget")]
    EmptyWidgetChild {
        /// The widget being serialized.
        parent: NodeId,
        /// The offending child.
        child: NodeId,
    },
    /// The operation needs a completed build.
    #[error("the tree has not been built yet")]
    NotBuilt,
    /// [`Tree::build`](crate::Tree::build) was called twice.
    #[error("the tree has already been built")]
    AlreadyBuilt,
    /// The tree was torn down.
    #[error("the tree has been disposed")]
    Disposed,
    /// The root resolved to no widget at all.
    #[error("the tree produced no widgets")]
    EmptyForest,
    /// Content that no formatter accepts.
    #[error("no formatter accepts {kind} content")]
    UnsupportedContent {
        /// [`Content::kind`](canopy_core::Content::kind) of the rejected value.
        kind: &'static str,
    },
    /// A widget handler failed.
    #[error(transparent)]
    Interaction(#[from] InteractionError),
}

/// Errors raised while applying a [`Patch`](crate::Patch).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    /// The pointer is not empty and does not start with `/`.
    #[error("invalid JSON pointer `{0}`")]
    InvalidPointer(String),
    /// A parent location along the pointer does not exist.
    #[error("path `{0}` does not exist")]
    PathNotFound(String),
    /// An array index is malformed or out of bounds.
    #[error("invalid array index in `{0}`")]
    InvalidIndex(String),
    /// The parent location is a scalar.
    #[error("cannot descend into a scalar at `{0}`")]
    NotAContainer(String),
}

/// Errors raised while loading a [`TreeConfig`](crate::TreeConfig).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set but does not parse.
    #[error("`{name}` must be an unsigned integer, got `{value}`")]
    Malformed {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
    /// The id length is outside the supported range.
    #[error("id length {0} is outside 4..=32")]
    IdLength(usize),
}
