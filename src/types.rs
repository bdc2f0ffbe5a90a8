//! Core types for spark-reconciler.
//!
//! These types define the foundation that everything builds on.
//! Elements describe what the UI should look like, work tags and flags
//! describe what the reconciler knows about each rendered instance.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::state::Hooks;

// =============================================================================
// Keys
// =============================================================================

/// Explicit identity of an element among its siblings.
pub type Key = Rc<str>;

// =============================================================================
// Component
// =============================================================================

/// Render function of a function component.
pub type RenderFn = dyn Fn(&mut Hooks, &Props) -> Node;

/// A function component.
///
/// Two components are the same type only if they share the same render
/// function allocation, so clone a `Component` instead of building a new one
/// for every render.
#[derive(Clone)]
pub struct Component {
    name: &'static str,
    render: Rc<RenderFn>,
}

impl Component {
    /// Create a component from a render function.
    pub fn new(name: &'static str, render: impl Fn(&mut Hooks, &Props) -> Node + 'static) -> Self {
        Self {
            name,
            render: Rc::new(render),
        }
    }

    /// Display name used in logs and errors.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Invoke the component body.
    pub(crate) fn render(&self, hooks: &mut Hooks, props: &Props) -> Node {
        (self.render)(hooks, props)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.render, &other.render)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

// =============================================================================
// Element Type
// =============================================================================

/// What an element renders into.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementType {
    /// Host tag such as `"div"`, materialized by the host adapter.
    Host(Rc<str>),
    /// Function component, rendered by the reconciler.
    Component(Component),
}

impl ElementType {
    /// Human readable label (tag name or component name).
    pub fn label(&self) -> &str {
        match self {
            ElementType::Host(tag) => tag,
            ElementType::Component(component) => component.name(),
        }
    }

    /// Host tag, if this is a host type.
    pub fn host_tag(&self) -> Option<&str> {
        match self {
            ElementType::Host(tag) => Some(tag),
            ElementType::Component(_) => None,
        }
    }
}

// =============================================================================
// Element Ref
// =============================================================================

/// Shared slot that receives the host instance of a host element.
///
/// The slot is filled after the commit that inserted the element and cleared
/// when the element is deleted or the ref moves to another element.
#[derive(Clone, Default)]
pub struct ElementRef {
    slot: Rc<RefCell<Option<Rc<dyn Any>>>>,
}

impl ElementRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current host instance, if attached and of type `T`.
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.slot
            .borrow()
            .as_ref()
            .and_then(|value| value.downcast_ref::<T>().cloned())
    }

    /// Check if an instance is attached.
    pub fn is_attached(&self) -> bool {
        self.slot.borrow().is_some()
    }

    pub(crate) fn attach<T: 'static>(&self, instance: T) {
        *self.slot.borrow_mut() = Some(Rc::new(instance));
    }

    pub(crate) fn detach(&self) {
        self.slot.borrow_mut().take();
    }
}

impl PartialEq for ElementRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}

impl fmt::Debug for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRef")
            .field("attached", &self.is_attached())
            .finish()
    }
}

// =============================================================================
// Prop Value
// =============================================================================

/// A single property value.
#[derive(Clone)]
pub enum PropValue {
    /// Absent value. Also used in diff payloads to mean "remove".
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    /// Nested style mapping (name → value).
    Style(IndexMap<String, String>),
    /// Opaque value, compared by pointer identity.
    Any(Rc<dyn Any>),
}

impl PropValue {
    /// Check if this is the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, PropValue::Null)
    }

    /// String contents, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Style mapping, if this is a style value.
    pub fn as_style(&self) -> Option<&IndexMap<String, String>> {
        match self {
            PropValue::Style(style) => Some(style),
            _ => None,
        }
    }

    /// Downcast an opaque value.
    pub fn downcast<T: 'static>(&self) -> Option<&T> {
        match self {
            PropValue::Any(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Null, PropValue::Null) => true,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Int(a), PropValue::Int(b)) => a == b,
            (PropValue::Float(a), PropValue::Float(b)) => a == b,
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::Style(a), PropValue::Style(b)) => a == b,
            (PropValue::Any(a), PropValue::Any(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => write!(f, "null"),
            PropValue::Bool(v) => write!(f, "{v}"),
            PropValue::Int(v) => write!(f, "{v}"),
            PropValue::Float(v) => write!(f, "{v}"),
            PropValue::Str(v) => write!(f, "{v:?}"),
            PropValue::Style(v) => f.debug_map().entries(v.iter()).finish(),
            PropValue::Any(_) => write!(f, "<any>"),
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => Ok(()),
            PropValue::Bool(v) => write!(f, "{v}"),
            PropValue::Int(v) => write!(f, "{v}"),
            PropValue::Float(v) => write!(f, "{v}"),
            PropValue::Str(v) => write!(f, "{v}"),
            PropValue::Style(v) => {
                let mut first = true;
                for (name, value) in v {
                    if !first {
                        write!(f, ";")?;
                    }
                    first = false;
                    write!(f, "{name}:{value}")?;
                }
                Ok(())
            }
            PropValue::Any(_) => write!(f, "[object]"),
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value as i64)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.into())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value.into())
    }
}

impl From<IndexMap<String, String>> for PropValue {
    fn from(value: IndexMap<String, String>) -> Self {
        PropValue::Style(value)
    }
}

// =============================================================================
// Props
// =============================================================================

/// Element properties: ordered named values plus children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    pub values: IndexMap<String, PropValue>,
    pub children: Node,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a property by name.
    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.values.get(name)
    }

    /// Get a string property by name.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropValue::as_str)
    }

    /// Get an integer property by name.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(PropValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Style mapping, if a `style` prop is present.
    pub fn style(&self) -> Option<&IndexMap<String, String>> {
        self.get("style").and_then(PropValue::as_style)
    }
}

// =============================================================================
// Element
// =============================================================================

/// Immutable description of a desired UI node.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub element_type: ElementType,
    pub key: Option<Key>,
    pub element_ref: Option<ElementRef>,
    pub props: Rc<Props>,
}

impl Element {
    /// Start describing a host element.
    pub fn host(tag: &str) -> ElementBuilder {
        ElementBuilder::new(ElementType::Host(tag.into()))
    }

    /// Start describing a component element.
    pub fn component(component: &Component) -> ElementBuilder {
        ElementBuilder::new(ElementType::Component(component.clone()))
    }
}

/// Builder for [`Element`].
///
/// ```ignore
/// let el = Element::host("div")
///     .key("a")
///     .prop("id", "a")
///     .child("x")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ElementBuilder {
    element_type: ElementType,
    key: Option<Key>,
    element_ref: Option<ElementRef>,
    props: Props,
    children: Vec<Node>,
    single_child: Option<Node>,
}

impl ElementBuilder {
    fn new(element_type: ElementType) -> Self {
        Self {
            element_type,
            key: None,
            element_ref: None,
            props: Props::default(),
            children: Vec::new(),
            single_child: None,
        }
    }

    pub fn key(mut self, key: impl fmt::Display) -> Self {
        self.key = Some(key.to_string().into());
        self
    }

    pub fn element_ref(mut self, element_ref: &ElementRef) -> Self {
        self.element_ref = Some(element_ref.clone());
        self
    }

    pub fn prop(mut self, name: &str, value: impl Into<PropValue>) -> Self {
        self.props.values.insert(name.to_string(), value.into());
        self
    }

    /// Set the `style` prop from name/value pairs.
    pub fn style<'a>(mut self, entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let style = entries
            .into_iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect::<IndexMap<_, _>>();
        self.props.values.insert("style".to_string(), PropValue::Style(style));
        self
    }

    /// Append a child. Children added this way always form a list.
    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append several children.
    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    /// Set `children` to a single value (not wrapped in a list).
    ///
    /// A single string or number becomes text-only content of a host element.
    pub fn content(mut self, child: impl Into<Node>) -> Self {
        self.single_child = Some(child.into());
        self
    }

    pub fn build(self) -> Element {
        let mut props = self.props;
        props.children = match self.single_child {
            Some(child) if self.children.is_empty() => child,
            Some(child) => {
                let mut children = vec![child];
                children.extend(self.children);
                Node::List(children)
            }
            None if self.children.is_empty() => Node::Empty,
            None => Node::List(self.children),
        };
        Element {
            element_type: self.element_type,
            key: self.key,
            element_ref: self.element_ref,
            props: Rc::new(props),
        }
    }
}

impl From<ElementBuilder> for Element {
    fn from(builder: ElementBuilder) -> Self {
        builder.build()
    }
}

// =============================================================================
// Node - child descriptions
// =============================================================================

/// What a component returns and what `props.children` holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Node {
    /// Renders nothing.
    #[default]
    Empty,
    Element(Element),
    /// Text (numbers convert to text). The empty string renders nothing.
    Text(Rc<str>),
    List(Vec<Node>),
}

impl Node {
    /// Text content, if this node is non-empty text.
    pub fn as_text(&self) -> Option<&Rc<str>> {
        match self {
            Node::Text(text) if !text.is_empty() => Some(text),
            _ => None,
        }
    }

    /// Check if this node is text (text-only children of a host element).
    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<ElementBuilder> for Node {
    fn from(builder: ElementBuilder) -> Self {
        Node::Element(builder.build())
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.into())
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(text.into())
    }
}

impl From<Rc<str>> for Node {
    fn from(text: Rc<str>) -> Self {
        Node::Text(text)
    }
}

macro_rules! node_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Node {
                fn from(value: $ty) -> Self {
                    Node::Text(value.to_string().into())
                }
            }
        )*
    };
}

node_from_number!(i32, i64, u32, u64, usize, f64);

impl From<Vec<Node>> for Node {
    fn from(children: Vec<Node>) -> Self {
        Node::List(children)
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(value: Option<T>) -> Self {
        value.map_or(Node::Empty, Into::into)
    }
}

// =============================================================================
// Work Tag
// =============================================================================

/// Kind of a work node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkTag {
    /// Root of the tree, bound to the host container.
    Root,
    /// Host element with its own host instance.
    HostComponent,
    /// Host text instance.
    HostText,
    /// Function component that has rendered at least once.
    FunctionComponent,
    /// Component that has not been rendered yet.
    Indeterminate,
}

impl WorkTag {
    /// Check if this tag owns a host instance.
    #[inline]
    pub fn is_host(self) -> bool {
        matches!(self, WorkTag::HostComponent | WorkTag::HostText)
    }

    /// Check if host children are inserted directly under this tag.
    #[inline]
    pub fn is_host_parent(self) -> bool {
        matches!(self, WorkTag::HostComponent | WorkTag::Root)
    }
}

// =============================================================================
// Effect Flags (bitflags)
// =============================================================================

bitflags::bitflags! {
    /// Pending host mutations for a node, or aggregated for its subtree.
    ///
    /// Combine with bitwise OR: `Flags::PLACEMENT | Flags::UPDATE`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u32 {
        const NONE = 0;
        /// Insert (or move) the host instance.
        const PLACEMENT = 1 << 1;
        /// Apply a property diff or new text.
        const UPDATE = 1 << 2;
        /// Some children are listed in `deletions`.
        const CHILD_DELETION = 1 << 4;
        /// Attach (or re-attach) the element ref.
        const REF = 1 << 9;

        const MUTATION_MASK = Self::PLACEMENT.bits()
            | Self::UPDATE.bits()
            | Self::CHILD_DELETION.bits()
            | Self::REF.bits();
        const LAYOUT_MASK = Self::REF.bits();
    }
}
