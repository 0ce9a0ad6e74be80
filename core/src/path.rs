//! Structural paths through the view/widget hierarchy.
//!
//! A [`Path`] is the stack of [`PathSegment`]s leading from the root to a node.
//! It is only ever used to derive a node's [`NodeId`](crate::id::NodeId); the
//! engine never stores a path as identity.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// One hop in a structural path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    type_name: String,
    key: Option<String>,
    index: usize,
    is_widget: bool,
}

impl PathSegment {
    /// Creates a segment for a view.
    #[must_use]
    pub fn view(type_name: impl Into<String>, key: Option<&str>, index: usize) -> Self {
        Self {
            type_name: type_name.into(),
            key: key.map(String::from),
            index,
            is_widget: false,
        }
    }

    /// Creates a segment for a widget.
    #[must_use]
    pub fn widget(type_name: impl Into<String>, key: Option<&str>, index: usize) -> Self {
        Self {
            type_name: type_name.into(),
            key: key.map(String::from),
            index,
            is_widget: true,
        }
    }

    /// The short type name of the node this segment points at.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The user supplied key, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Position among the parent's children.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Whether this segment points at a widget.
    #[must_use]
    pub const fn is_widget(&self) -> bool {
        self.is_widget
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}:{key}", self.type_name),
            None => write!(f, "{}:{}", self.type_name, self.index),
        }
    }
}

/// An ordered stack of segments from the root to the current node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<PathSegment>);

impl Path {
    /// Creates an empty path.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Pushes a segment onto the end of the path.
    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    /// Removes the deepest segment.
    pub fn pop(&mut self) -> Option<PathSegment> {
        self.0.pop()
    }

    /// The deepest segment.
    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the root path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates segments root first.
    pub fn iter(&self) -> impl Iterator<Item = &PathSegment> {
        self.0.iter()
    }

    /// Computes the position of a node inside the widget-only forest.
    ///
    /// `self` is the node's parent path and `index` its own index. Views are
    /// elided: for every widget ancestor we record the index of the hop taken
    /// out of it. A view inherits its index from the slot it fills, so the
    /// index recorded under a widget is always the widget's child slot.
    #[must_use]
    pub fn widget_indices(&self, index: usize) -> Vec<usize> {
        let mut indices = Vec::new();
        let mut previous = index;
        for segment in self.0.iter().rev() {
            if segment.is_widget {
                indices.push(previous);
            }
            previous = segment.index;
        }
        indices.reverse();
        indices
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(">")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Strips module path and generic arguments from [`core::any::type_name`] output.
#[must_use]
pub fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefers_key_over_index() {
        let mut path = Path::new();
        path.push(PathSegment::view("App", None, 0));
        path.push(PathSegment::widget("Stack", Some("main"), 3));
        path.push(PathSegment::view("Counter", None, 1));
        assert_eq!(path.to_string(), "App:0>Stack:main>Counter:1");
    }

    #[test]
    fn widget_indices_skip_views() {
        // App(view) > Stack(widget) > [_, Counter(view, slot 1)] > Text(widget)
        let mut path = Path::new();
        path.push(PathSegment::view("App", None, 0));
        path.push(PathSegment::widget("Stack", None, 0));
        assert_eq!(path.widget_indices(1), vec![1]);

        path.push(PathSegment::view("Counter", None, 1));
        assert_eq!(path.widget_indices(1), vec![1]);

        path.push(PathSegment::widget("Text", None, 1));
        path.push(PathSegment::view("Inner", None, 2));
        assert_eq!(path.widget_indices(2), vec![1, 2]);
    }

    #[test]
    fn root_has_no_widget_indices() {
        assert!(Path::new().widget_indices(0).is_empty());
    }

    #[test]
    fn short_type_name_strips_modules_and_generics() {
        assert_eq!(short_type_name("my_app::views::Counter"), "Counter");
        assert_eq!(
            short_type_name("my_app::Wrapper<alloc::string::String>"),
            "Wrapper"
        );
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
