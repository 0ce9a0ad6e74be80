//! Errors surfaced by collaborators.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::any::Any;

use serde::Serialize;

/// A captured failure of a single view's build step.
///
/// The engine never propagates a view failure past the view that raised it.
/// Instead the error is stored as content and rendered in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("view `{view}` failed to build: {message}")]
pub struct ViewError {
    /// Type name of the view that failed.
    pub view: String,
    /// Top level message.
    pub message: String,
    /// Messages of the underlying causes, outermost first.
    pub chain: Vec<String>,
    /// Whether the failure was a panic rather than a returned error.
    pub panicked: bool,
}

impl ViewError {
    /// Captures an error returned from a view's build step.
    #[must_use]
    pub fn from_error(view: &str, error: &anyhow::Error) -> Self {
        Self {
            view: view.into(),
            message: error.to_string(),
            chain: error.chain().skip(1).map(ToString::to_string).collect(),
            panicked: false,
        }
    }

    /// Captures a panic raised while building a view.
    #[must_use]
    pub fn from_panic(view: &str, payload: &(dyn Any + Send)) -> Self {
        Self {
            view: view.into(),
            message: panic_message(payload),
            chain: Vec::new(),
            panicked: true,
        }
    }
}

/// Extracts the message of a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Errors raised while dispatching an interaction to a widget handler.
#[derive(Debug, thiserror::Error)]
pub enum InteractionError {
    /// The handler expected an argument that was not supplied.
    #[error("missing argument `{name}`")]
    MissingArgument {
        /// Name of the interaction.
        name: String,
    },
    /// The supplied argument did not decode into the handler's type.
    #[error("invalid argument for `{name}`: {source}")]
    InvalidArgument {
        /// Name of the interaction.
        name: String,
        /// Decoding failure.
        source: serde_json::Error,
    },
    /// The handler itself reported a failure.
    #[error("handler failed: {0}")]
    Handler(String),
}
