//! What a view produces, and how raw values become widgets.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use serde_json::Value;

use crate::{Element, View, ViewError, Widget};

/// The output of a view's build step, or a structural child of a widget.
#[derive(Debug, Default)]
pub enum Content {
    /// Nothing. The branch is pruned.
    #[default]
    Empty,
    /// A view to build recursively.
    View(Box<dyn View>),
    /// A widget to build recursively.
    Widget(Box<dyn Widget>),
    /// A raw value left to the [`ContentFormatter`].
    Value(Value),
    /// A captured view failure left to the [`ContentFormatter`].
    Error(ViewError),
}

impl Content {
    /// Short description of the variant, used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::View(_) => "view",
            Self::Widget(_) => "widget",
            Self::Value(_) => "value",
            Self::Error(_) => "error",
        }
    }

    /// Returns `true` for [`Content::Empty`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.into()))
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<Value> for Content {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<ViewError> for Content {
    fn from(error: ViewError) -> Self {
        Self::Error(error)
    }
}

impl From<Box<dyn View>> for Content {
    fn from(view: Box<dyn View>) -> Self {
        Self::View(view)
    }
}

impl From<Box<dyn Widget>> for Content {
    fn from(widget: Box<dyn Widget>) -> Self {
        Self::Widget(widget)
    }
}

impl From<Vec<Self>> for Content {
    fn from(children: Vec<Self>) -> Self {
        Element::fragment(children).into()
    }
}

macro_rules! content_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Content {
                fn from(value: $ty) -> Self {
                    Self::Value(Value::from(value))
                }
            }
        )*
    };
}

content_from_scalar!(bool, i32, i64, u32, u64, f64);

/// A [`Content`] that the engine can build directly.
#[derive(Debug)]
pub enum Formatted {
    /// Built with the view algorithm.
    View(Box<dyn View>),
    /// Built with the widget algorithm.
    Widget(Box<dyn Widget>),
}

/// Policy turning arbitrary content into a view or widget.
pub trait ContentFormatter: Send + Sync + 'static {
    /// Whether this formatter accepts `content`.
    fn can_handle(&self, content: &Content) -> bool;

    /// Formats `content`. `None` prunes the branch.
    fn format(&self, content: Content) -> Option<Formatted>;
}

/// The bundled formatting policy.
///
/// | Content | Result |
/// |---------|--------|
/// | `null`, empty | nothing |
/// | string, number, bool | `Text` element with a `content` prop |
/// | array | `Fragment` element, one child per item |
/// | object | `Json` element with a `value` prop |
/// | error | `Error` element with `message`, `chain` and `panicked` props |
/// | view, widget | passed through |
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFormatter;

impl ContentFormatter for DefaultFormatter {
    fn can_handle(&self, _content: &Content) -> bool {
        true
    }

    fn format(&self, content: Content) -> Option<Formatted> {
        let element = match content {
            Content::Empty | Content::Value(Value::Null) => return None,
            Content::View(view) => return Some(Formatted::View(view)),
            Content::Widget(widget) => return Some(Formatted::Widget(widget)),
            Content::Value(Value::Array(items)) => {
                Element::fragment(items.into_iter().map(Content::Value))
            }
            Content::Value(value @ Value::Object(_)) => Element::new("Json").prop("value", value),
            Content::Value(Value::String(text)) => Element::new("Text").prop("content", text),
            Content::Value(value) => Element::new("Text").prop("content", value.to_string()),
            Content::Error(error) => Element::new("Error")
                .prop("view", error.view)
                .prop("message", error.message)
                .prop("chain", error.chain)
                .prop("panicked", error.panicked),
        };
        Some(Formatted::Widget(Box::new(element)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn format_widget(content: Content) -> Box<dyn Widget> {
        match DefaultFormatter.format(content) {
            Some(Formatted::Widget(widget)) => widget,
            other => panic!("expected a widget, got {other:?}"),
        }
    }

    #[test]
    fn scalars_become_text() {
        let widget = format_widget(Content::from(7));
        assert_eq!(widget.type_name(), "Text");
        assert_eq!(widget.props()[0].1, json!("7"));

        let widget = format_widget(Content::from("hi"));
        assert_eq!(widget.props()[0].1, json!("hi"));
    }

    #[test]
    fn arrays_become_fragments() {
        let mut widget = format_widget(Content::from(json!([1, "a"])));
        assert_eq!(widget.type_name(), "Fragment");
        assert_eq!(widget.take_children().len(), 2);
    }

    #[test]
    fn null_and_empty_are_pruned() {
        assert!(DefaultFormatter.format(Content::Value(Value::Null)).is_none());
        assert!(DefaultFormatter.format(Content::Empty).is_none());
    }

    #[test]
    fn errors_become_error_elements() {
        let error = ViewError {
            view: "Broken".into(),
            message: "boom".into(),
            chain: vec!["cause".into()],
            panicked: false,
        };
        let widget = format_widget(Content::from(error));
        assert_eq!(widget.type_name(), "Error");
        let props = widget.props();
        assert!(props.contains(&("message".into(), json!("boom"))));
        assert!(props.contains(&("chain".into(), json!(["cause"]))));
    }

    #[test]
    fn views_pass_through() {
        let view = crate::FnView::new("Label", || Content::Empty);
        assert!(matches!(
            DefaultFormatter.format(Content::from(view)),
            Some(Formatted::View(_))
        ));
    }
}
