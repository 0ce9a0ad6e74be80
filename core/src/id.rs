//! Deterministic node identity.

use alloc::string::String;
use core::{borrow::Borrow, fmt};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::path::Path;

/// Number of characters kept from the encoded digest.
pub const DEFAULT_ID_LENGTH: usize = 10;

/// A short, stable identifier derived from a node's structural path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wraps an existing id string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives the id of the node at `path`.
///
/// The canonical path string is hashed with SHA-256, encoded as standard
/// base64, stripped of everything but ASCII alphanumerics, lowercased and cut
/// to `len` characters. Equal paths always produce equal ids. Collisions are
/// possible in principle and are not detected.
#[must_use]
pub fn generate_id(path: &Path, len: usize) -> NodeId {
    let digest = Sha256::digest(path.to_string().as_bytes());
    let id = STANDARD
        .encode(digest)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(len)
        .collect::<String>();
    NodeId(id)
}
