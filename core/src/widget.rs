//! The widget contract and a generic widget.
//!
//! Widgets are the structural nodes that reach the consumer. Instead of
//! reflecting over fields, a widget declares its props explicitly through
//! [`Widget::props`] and the parent-owned props it collects from its children
//! through [`Widget::attached_props`].
//!
//! Most hosts never need a bespoke widget type: [`Element`] covers the common
//! case with a fluent builder.
//!
//! ```
//! use canopy_core::{Content, Element};
//!
//! let card = Element::new("Card")
//!     .key("profile")
//!     .prop("title", "Ada")
//!     .child("Analytical engines")
//!     .on("click", || {});
//! let _content = Content::from(card);
//! ```

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::type_name;
use std::collections::HashMap;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{Content, Handlers, NodeId, path::short_type_name};

/// Ordered prop name/value pairs declared by a widget.
pub type Props = Vec<(Cow<'static, str>, Value)>;

/// A prop that a parent gathers from the attached values of its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedProp {
    /// Prop name on the parent.
    pub prop: Cow<'static, str>,
    /// Attached value name looked up on each child.
    pub name: Cow<'static, str>,
}

impl AttachedProp {
    /// Declares that `prop` collects each child's `name` attached value.
    #[must_use]
    pub const fn new(prop: &'static str, name: &'static str) -> Self {
        Self {
            prop: Cow::Borrowed(prop),
            name: Cow::Borrowed(name),
        }
    }
}

/// State shared by every widget: identity, attached values and handlers.
#[derive(Debug, Clone, Default)]
pub struct WidgetBase {
    id: Option<NodeId>,
    key: Option<String>,
    attached: HashMap<(String, String), Value>,
    handlers: Handlers,
}

impl WidgetBase {
    /// Creates an empty base.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The engine-assigned id, once built.
    #[must_use]
    pub const fn id(&self) -> Option<&NodeId> {
        self.id.as_ref()
    }

    /// Sets the id.
    pub fn set_id(&mut self, id: NodeId) {
        self.id = Some(id);
    }

    /// The sibling key.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Sets the sibling key.
    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = Some(key.into());
    }

    /// Registered handlers.
    #[must_use]
    pub const fn handlers(&self) -> &Handlers {
        &self.handlers
    }

    /// Mutable access to the handler table.
    pub const fn handlers_mut(&mut self) -> &mut Handlers {
        &mut self.handlers
    }

    /// Value attached to this widget by a parent of type `parent_type`.
    #[must_use]
    pub fn attached_value(&self, parent_type: &str, name: &str) -> Option<&Value> {
        self.attached
            .get(&(String::from(parent_type), String::from(name)))
    }

    /// Attaches a value for a parent of type `parent_type` to read.
    pub fn set_attached_value(&mut self, parent_type: &str, name: &str, value: Value) {
        self.attached.insert((parent_type.into(), name.into()), value);
    }
}

/// A structural, serializable output node.
pub trait Widget: Send + Sync + 'static {
    /// Type name emitted as `type` in the snapshot.
    fn type_name(&self) -> &str {
        short_type_name(type_name::<Self>())
    }

    /// Shared widget state.
    fn base(&self) -> &WidgetBase;

    /// Mutable shared widget state.
    fn base_mut(&mut self) -> &mut WidgetBase;

    /// Declared props in emission order.
    fn props(&self) -> Props {
        Vec::new()
    }

    /// Props collected from children's attached values.
    fn attached_props(&self) -> &[AttachedProp] {
        &[]
    }

    /// Hands the structural children to the engine.
    fn take_children(&mut self) -> Vec<Content>;

    /// Sibling key.
    fn key(&self) -> Option<&str> {
        self.base().key()
    }

    /// Engine-assigned id.
    fn id(&self) -> Option<&NodeId> {
        self.base().id()
    }

    /// Receives the id derived by the engine.
    fn set_id(&mut self, id: NodeId) {
        self.base_mut().set_id(id);
    }

    /// Interaction handlers.
    fn handlers(&self) -> &Handlers {
        self.base().handlers()
    }

    /// See [`WidgetBase::attached_value`].
    fn attached_value(&self, parent_type: &str, name: &str) -> Option<&Value> {
        self.base().attached_value(parent_type, name)
    }

    /// See [`WidgetBase::set_attached_value`].
    fn set_attached_value(&mut self, parent_type: &str, name: &str, value: Value) {
        self.base_mut().set_attached_value(parent_type, name, value);
    }

    /// Renders `{id, type, props, events, children}`.
    ///
    /// `children` are the snapshots of the structural children and `attached`
    /// the resolved attached props. Props whose value is `null` are omitted.
    fn serialize(&self, children: Vec<Value>, attached: Props) -> Value {
        let props = self
            .props()
            .into_iter()
            .chain(attached)
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| (name.into_owned(), value))
            .collect::<Map<String, Value>>();

        let mut snapshot = Map::new();
        snapshot.insert(
            "id".into(),
            self.id()
                .map_or(Value::Null, |id| Value::String(id.to_string())),
        );
        snapshot.insert("type".into(), Value::String(self.type_name().into()));
        snapshot.insert("props".into(), Value::Object(props));
        snapshot.insert(
            "events".into(),
            Value::Array(
                self.handlers()
                    .names()
                    .into_iter()
                    .map(|name| Value::String(name.into()))
                    .collect(),
            ),
        );
        snapshot.insert("children".into(), Value::Array(children));
        Value::Object(snapshot)
    }
}

impl core::fmt::Debug for dyn Widget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Widget")
            .field("type", &self.type_name())
            .field("id", &self.id())
            .field("key", &self.key())
            .finish()
    }
}

/// A generic widget assembled with a builder.
#[derive(Debug)]
pub struct Element {
    base: WidgetBase,
    type_name: String,
    props: Props,
    attached_props: Vec<AttachedProp>,
    children: Vec<Content>,
}

impl Element {
    /// Creates an element of type `type_name`.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            base: WidgetBase::new(),
            type_name: type_name.into(),
            props: Vec::new(),
            attached_props: Vec::new(),
            children: Vec::new(),
        }
    }

    /// A transparent container for a list of content.
    #[must_use]
    pub fn fragment(children: impl IntoIterator<Item = Content>) -> Self {
        Self::new("Fragment").children(children)
    }

    /// Sets the sibling key.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.base.set_key(key);
        self
    }

    /// Adds a prop. Values that fail to serialize become `null` and are omitted.
    #[must_use]
    pub fn prop(mut self, name: impl Into<Cow<'static, str>>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.props.push((name.into(), value));
        self
    }

    /// Appends one child.
    #[must_use]
    pub fn child(mut self, child: impl Into<Content>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Appends several children.
    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = Content>) -> Self {
        self.children.extend(children);
        self
    }

    /// Declares an attached prop collected from children.
    #[must_use]
    pub fn attached_prop(mut self, prop: &'static str, name: &'static str) -> Self {
        self.attached_props.push(AttachedProp::new(prop, name));
        self
    }

    /// Attaches a value for a parent of type `parent_type`.
    #[must_use]
    pub fn attach(mut self, parent_type: &str, name: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.base.set_attached_value(parent_type, name, value);
        self
    }

    /// Registers an argument-less interaction handler.
    #[must_use]
    pub fn on(mut self, name: impl Into<String>, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.base.handlers_mut().on(name, handler);
        self
    }

    /// Registers a handler decoding its first argument.
    #[must_use]
    pub fn on_value<T, F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.base.handlers_mut().on_value(name, handler);
        self
    }
}

impl Widget for Element {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn base(&self) -> &WidgetBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WidgetBase {
        &mut self.base
    }

    fn props(&self) -> Props {
        self.props.clone()
    }

    fn attached_props(&self) -> &[AttachedProp] {
        &self.attached_props
    }

    fn take_children(&mut self) -> Vec<Content> {
        core::mem::take(&mut self.children)
    }
}

impl From<Element> for Content {
    fn from(element: Element) -> Self {
        Self::Widget(Box::new(element))
    }
}
