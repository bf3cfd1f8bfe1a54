//! The intermediate representation produced by encoding.
//!
//! An IR tree is plain data: it holds no live objects, only primitives,
//! collections of nodes, numeric [`Reference`](NodeKind::Reference)s and
//! [`Tagged`] handler snapshots. Sharing and cycles of the original graph are
//! expressed entirely through ids: an identity-capable value is written once
//! with an [`Id`] and every later occurrence becomes a reference to it.
//!
//! [`Node`] is a cheap-clone handle. Its own pointer identity is unrelated to
//! the ids it carries; it only lets formats such as [`wire`](crate::wire)
//! share identical sub-trees.

use std::{fmt, ops::Deref, sync::Arc};

use crate::{diagnostic, value::Value};

/// An id assigned to an identity-capable value within one encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u64);

impl Id {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self { Self(raw) }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An atomic value with no identity.
#[derive(Debug, Clone)]
pub enum Primitive {
    /// The unit / null value.
    Null,
    /// The "not applicable" sentinel.
    NotApplicable,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A float.
    Float(f64),
    /// A string.
    Str(Arc<str>),
    /// A byte string.
    Bytes(Arc<[u8]>),
}

impl Primitive {
    /// Converts a primitive runtime value, `None` for shared values.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(match value {
            Value::Null => Self::Null,
            Value::NotApplicable => Self::NotApplicable,
            Value::Bool(b) => Self::Bool(*b),
            Value::Int(i) => Self::Int(*i),
            Value::Float(f) => Self::Float(*f),
            Value::Str(s) => Self::Str(Arc::clone(s)),
            Value::Bytes(b) => Self::Bytes(Arc::clone(b)),
            _ => return None,
        })
    }

    /// Converts back into a runtime value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::NotApplicable => Value::NotApplicable,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Int(*i),
            Self::Float(f) => Value::Float(*f),
            Self::Str(s) => Value::Str(Arc::clone(s)),
            Self::Bytes(b) => Value::Bytes(Arc::clone(b)),
        }
    }
}

/// Floats compare by bit pattern so that a `NaN` node equals itself.
impl PartialEq for Primitive {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null)
            | (Self::NotApplicable, Self::NotApplicable) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

/// The kind of a collection node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CollectionKind {
    /// A mutable sequence.
    List,
    /// An immutable sequence.
    Tuple,
    /// A mutable set.
    Set,
    /// An immutable set.
    FrozenSet,
    /// A mutable mapping.
    Map,
}

impl CollectionKind {
    /// All kinds, in wire tag order.
    pub const ALL: [Self; 5] =
        [Self::List, Self::Tuple, Self::Set, Self::FrozenSet, Self::Map];

    /// Returns `true` for kinds whose instances can be filled in place.
    #[must_use]
    pub const fn is_mutable(self) -> bool {
        matches!(self, Self::List | Self::Set | Self::Map)
    }

    /// Returns the name used in textual forms.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Set => "set",
            Self::FrozenSet => "frozenset",
            Self::Map => "map",
        }
    }

    /// Parses a name produced by [`CollectionKind::name`].
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The children of a collection node.
#[derive(Debug, Clone, PartialEq)]
pub enum Elements {
    /// Elements of a sequence or set.
    Items(Vec<Node>),
    /// Key-value entries of a mapping.
    Entries(Vec<(Node, Node)>),
}

impl Elements {
    /// Returns the number of elements or entries.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Items(items) => items.len(),
            Self::Entries(entries) => entries.len(),
        }
    }

    /// Returns `true` if there are no elements or entries.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// A list, tuple, set, frozen set or mapping of nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    /// The collection kind.
    pub kind: CollectionKind,
    /// Present for mutable kinds, and for immutable kinds only when the
    /// collection is referenced elsewhere.
    pub id: Option<Id>,
    /// The children.
    pub elements: Elements,
}

/// An opaque value snapshotted by a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged {
    /// The original value's type name.
    pub type_name: Arc<str>,
    /// The name of the handler that produced `state`.
    pub handler: Arc<str>,
    /// The id assigned to the original value.
    pub id: Option<Id>,
    /// The handler-produced state.
    pub state: Node,
}

/// The shape of an IR node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// An atomic value.
    Primitive(Primitive),
    /// A collection of nodes.
    Collection(Collection),
    /// A back or forward reference to an id-bearing node.
    Reference(Id),
    /// A handler snapshot.
    Tagged(Tagged),
}

/// A shared, immutable IR node.
#[derive(Clone)]
pub struct Node(Arc<NodeKind>);

impl Node {
    /// Wraps `kind` into a node.
    #[must_use]
    pub fn new(kind: NodeKind) -> Self { Self(Arc::new(kind)) }

    /// Creates a primitive node.
    #[must_use]
    pub fn primitive(primitive: Primitive) -> Self {
        Self::new(NodeKind::Primitive(primitive))
    }

    /// Creates a reference node.
    #[must_use]
    pub fn reference(id: Id) -> Self { Self::new(NodeKind::Reference(id)) }

    /// Creates a collection node.
    #[must_use]
    pub fn collection(
        kind: CollectionKind,
        id: Option<Id>,
        elements: Elements,
    ) -> Self {
        Self::new(NodeKind::Collection(Collection { kind, id, elements }))
    }

    /// Creates a tagged node.
    #[must_use]
    pub fn tagged(
        type_name: impl Into<Arc<str>>,
        handler: impl Into<Arc<str>>,
        id: Option<Id>,
        state: Self,
    ) -> Self {
        Self::new(NodeKind::Tagged(Tagged {
            type_name: type_name.into(),
            handler: handler.into(),
            id,
            state,
        }))
    }

    /// Returns the node's shape.
    #[must_use]
    pub fn kind(&self) -> &NodeKind { &self.0 }

    /// Returns the id carried by a collection or tagged node.
    #[must_use]
    pub fn id(&self) -> Option<Id> {
        match &*self.0 {
            NodeKind::Collection(collection) => collection.id,
            NodeKind::Tagged(tagged) => tagged.id,
            NodeKind::Primitive(_) | NodeKind::Reference(_) => None,
        }
    }

    /// Returns `true` if both handles point at the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the node's pointer identity.
    pub(crate) fn address(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }

    /// Returns the direct children, keys before values for mappings.
    #[must_use]
    pub fn children(&self) -> Vec<&Self> {
        match &*self.0 {
            NodeKind::Primitive(_) | NodeKind::Reference(_) => Vec::new(),
            NodeKind::Collection(Collection {
                elements: Elements::Items(items),
                ..
            }) => items.iter().collect(),
            NodeKind::Collection(Collection {
                elements: Elements::Entries(entries),
                ..
            }) => entries.iter().flat_map(|(k, v)| [k, v]).collect(),
            NodeKind::Tagged(tagged) => vec![&tagged.state],
        }
    }

    /// Counts the nodes of the tree, visiting shared sub-trees once per
    /// occurrence.
    #[must_use]
    pub fn node_count(&self) -> usize {
        let mut stack = vec![self];
        let mut count = 0;
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children());
        }
        count
    }

    /// Renders the compact textual form, cut at `limit` characters.
    #[must_use]
    pub fn snapshot(&self, limit: usize) -> String {
        diagnostic::snapshot(format_args!("{self}"), limit)
    }
}

impl Deref for Node {
    type Target = NodeKind;

    fn deref(&self) -> &Self::Target { &self.0 }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0 == *other.0
    }
}

impl From<Primitive> for Node {
    fn from(primitive: Primitive) -> Self { Self::primitive(primitive) }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// The compact form: `list#1[1, @1]`, `map#2{"k": 3}`,
/// `<app::Point via point #3>tuple[1, 2]`.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            NodeKind::Primitive(primitive) => match primitive {
                Primitive::Null => f.write_str("null"),
                Primitive::NotApplicable => f.write_str("n/a"),
                Primitive::Bool(b) => write!(f, "{b}"),
                Primitive::Int(i) => write!(f, "{i}"),
                Primitive::Float(x) => write!(f, "{x:?}"),
                Primitive::Str(s) => write!(f, "{:?}", &**s),
                Primitive::Bytes(b) => write!(f, "b[{} bytes]", b.len()),
            },
            NodeKind::Reference(id) => write!(f, "@{}", id.get()),
            NodeKind::Collection(collection) => {
                f.write_str(collection.kind.name())?;
                if let Some(id) = collection.id {
                    write!(f, "{id}")?;
                }
                match &collection.elements {
                    Elements::Items(items) => {
                        f.write_str("[")?;
                        for (index, item) in items.iter().enumerate() {
                            if index > 0 {
                                f.write_str(", ")?;
                            }
                            write!(f, "{item}")?;
                        }
                        f.write_str("]")
                    }
                    Elements::Entries(entries) => {
                        f.write_str("{")?;
                        for (index, (key, value)) in entries.iter().enumerate()
                        {
                            if index > 0 {
                                f.write_str(", ")?;
                            }
                            write!(f, "{key}: {value}")?;
                        }
                        f.write_str("}")
                    }
                }
            }
            NodeKind::Tagged(tagged) => {
                write!(f, "<{} via {}", tagged.type_name, tagged.handler)?;
                if let Some(id) = tagged.id {
                    write!(f, " {id}")?;
                }
                write!(f, ">{}", tagged.state)
            }
        }
    }
}
