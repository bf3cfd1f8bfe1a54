//! The runtime object graph that the codec walks and rebuilds.
//!
//! [`Value`] is a small dynamic object model. Primitives are plain data with
//! value semantics. Everything else is a shared handle whose sameness is
//! reference identity:
//!
//! - [`ListRef`], [`SetRef`] and [`MapRef`] are mutable collections behind a
//!   [`parking_lot::RwLock`],
//! - [`TupleRef`] is an immutable sequence (tuples and frozen sets),
//! - [`ObjectRef`] is an opaque, type-erased payload that only a registered
//!   [`Handler`](crate::handler::Handler) knows how to snapshot.
//!
//! Cloning a handle never copies the collection; it produces another handle
//! to the same cell. Graphs built from these handles may be cyclic.

use std::{
    any::{Any, TypeId},
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, OnceLock},
};

use fxhash::{FxHashMap, FxHashSet};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Reference identity of a shared value.
///
/// Two handles have the same identity exactly when they point at the same
/// heap cell. An identity is only meaningful while some handle keeps the cell
/// alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity(usize);

impl Identity {
    fn of<T: ?Sized>(ptr: *const T) -> Self { Self(ptr.cast::<()>() as usize) }
}

// =============================================================================
// Collections
// =============================================================================

/// Shared handle to a mutable, ordered sequence.
#[derive(Clone, Default)]
pub struct ListRef(Arc<RwLock<Vec<Value>>>);

impl ListRef {
    /// Creates a list holding `items`.
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self { Self(Arc::new(RwLock::new(items))) }

    /// Locks the list for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<Value>> { self.0.read() }

    /// Locks the list for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<Value>> { self.0.write() }

    /// Appends `value` to the end of the list.
    pub fn push(&self, value: Value) { self.0.write().push(value); }

    /// Returns a handle to the element at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.read().get(index).cloned()
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize { self.0.read().len() }

    /// Returns `true` if the list has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.read().is_empty() }

    /// Copies the current element handles out of the lock.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Value> { self.0.read().clone() }

    /// Returns the reference identity of this list.
    #[must_use]
    pub fn identity(&self) -> Identity { Identity::of(Arc::as_ptr(&self.0)) }

    /// Returns `true` if both handles point at the same list.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Hash-table key comparing with [`Value`]'s `PartialEq`.
#[derive(Clone)]
struct Key(Value);

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool { self.0 == other.0 }
}

// NaN floats never equal themselves, so they never match an existing key and
// each one takes its own slot.
impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) { self.0.hash(state); }
}

/// Insertion-ordered items with a hashed index from key to position.
struct Keyed<T> {
    items: Vec<T>,
    index: FxHashMap<Key, usize>,
}

impl<T> Default for Keyed<T> {
    fn default() -> Self {
        Self { items: Vec::new(), index: FxHashMap::default() }
    }
}

impl<T> Keyed<T> {
    fn position(&self, key: &Value) -> Option<usize> {
        self.index.get(&Key(key.clone())).copied()
    }

    /// Appends `item` under `key`; the caller has checked `key` is absent.
    fn push(&mut self, key: Value, item: T) {
        self.index.insert(Key(key), self.items.len());
        self.items.push(item);
    }
}

/// Shared handle to a mutable set.
///
/// Elements keep insertion order; an element equal (by [`Value`]'s
/// `PartialEq`) to one already present is not inserted again.
#[derive(Clone, Default)]
pub struct SetRef(Arc<RwLock<Keyed<Value>>>);

impl SetRef {
    /// Inserts `value`, returning `false` if an equal element was present.
    pub fn insert(&self, value: Value) -> bool {
        let mut set = self.0.write();
        if set.position(&value).is_some() {
            return false;
        }
        set.push(value.clone(), value);
        true
    }

    /// Returns `true` if an element equal to `value` is present.
    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        self.0.read().position(value).is_some()
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize { self.0.read().items.len() }

    /// Returns `true` if the set has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.read().items.is_empty() }

    /// Copies the current element handles out of the lock.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Value> { self.0.read().items.clone() }

    /// Returns the reference identity of this set.
    #[must_use]
    pub fn identity(&self) -> Identity { Identity::of(Arc::as_ptr(&self.0)) }

    /// Returns `true` if both handles point at the same set.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Shared handle to a mutable key-value mapping.
///
/// Keys may be any [`Value`], including collections; they are hashed the
/// way [`Value`] compares, so mutable keys are looked up by identity.
/// Entries keep insertion order.
#[derive(Clone, Default)]
pub struct MapRef(Arc<RwLock<Keyed<(Value, Value)>>>);

impl MapRef {
    /// Inserts `value` under `key`, returning the value it replaced.
    pub fn insert(&self, key: Value, value: Value) -> Option<Value> {
        let mut entries = self.0.write();
        if let Some(at) = entries.position(&key) {
            return Some(std::mem::replace(&mut entries.items[at].1, value));
        }
        entries.push(key.clone(), (key, value));
        None
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &Value) -> Option<Value> {
        let entries = self.0.read();
        entries.position(key).map(|at| entries.items[at].1.clone())
    }

    /// Returns the value stored under the string key `key`.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<Value> {
        self.get(&Value::from(key))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize { self.0.read().items.len() }

    /// Returns `true` if the mapping has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.read().items.is_empty() }

    /// Copies the current entries out of the lock.
    #[must_use]
    pub fn entries(&self) -> Vec<(Value, Value)> { self.0.read().items.clone() }

    /// Returns the reference identity of this mapping.
    #[must_use]
    pub fn identity(&self) -> Identity { Identity::of(Arc::as_ptr(&self.0)) }

    /// Returns `true` if both handles point at the same mapping.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Shared handle to an immutable sequence, used for tuples and frozen sets.
#[derive(Clone)]
pub struct TupleRef(Arc<[Value]>);

impl TupleRef {
    /// Creates an immutable sequence holding `items`.
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self { Self(items.into()) }

    /// Returns the elements.
    #[must_use]
    pub fn items(&self) -> &[Value] { &self.0 }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Returns `true` if there are no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Returns the reference identity of this sequence.
    #[must_use]
    pub fn identity(&self) -> Identity { Identity::of(Arc::as_ptr(&self.0)) }

    /// Returns `true` if both handles point at the same sequence.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// =============================================================================
// Objects
// =============================================================================

struct Payload {
    type_name: &'static str,
    data: Arc<dyn Any + Send + Sync>,
}

struct ObjectCell {
    /// Type tag known before the payload exists (decode time).
    tag: Arc<str>,
    payload: OnceLock<Payload>,
}

/// Shared handle to an opaque object.
///
/// The payload is type-erased; only handlers that know the concrete type can
/// look inside. A handle whose payload has not been set yet is a
/// *placeholder*: the decoder hands these out for objects that are still
/// being reconstructed and fills them in place once the real payload exists,
/// so every handle issued earlier observes the real object.
#[derive(Clone)]
pub struct ObjectRef(Arc<ObjectCell>);

impl ObjectRef {
    /// Wraps `payload` in a new object.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self::from_arc(Arc::new(payload))
    }

    /// Wraps an already shared payload in a new object.
    #[must_use]
    pub fn from_arc<T: Any + Send + Sync>(data: Arc<T>) -> Self {
        let type_name = std::any::type_name::<T>();
        Self(Arc::new(ObjectCell {
            tag: Arc::from(type_name),
            payload: OnceLock::from(Payload { type_name, data }),
        }))
    }

    /// Creates a placeholder tagged with `type_name`.
    pub(crate) fn pending(type_name: Arc<str>) -> Self {
        Self(Arc::new(ObjectCell { tag: type_name, payload: OnceLock::new() }))
    }

    /// Returns the payload's type name, or the placeholder's tag.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.0.payload.get().map_or(&*self.0.tag, |p| p.type_name)
    }

    /// Returns `true` if this handle is a placeholder with no payload yet.
    #[must_use]
    pub fn is_pending(&self) -> bool { self.0.payload.get().is_none() }

    /// Returns the [`TypeId`] of the payload.
    #[must_use]
    pub fn payload_type_id(&self) -> Option<TypeId> {
        self.0.payload.get().map(|p| (*p.data).type_id())
    }

    /// Returns `true` if the payload is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool { self.downcast_ref::<T>().is_some() }

    /// Borrows the payload as a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.payload.get()?.data.downcast_ref::<T>()
    }

    /// Returns a shared handle to the payload as a `T`.
    #[must_use]
    pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0.payload.get()?.data).downcast::<T>().ok()
    }

    /// Moves `source`'s payload into this placeholder.
    ///
    /// Returns `false` if `source` has no payload or this cell is already
    /// filled.
    pub(crate) fn fill_from(&self, source: &Self) -> bool {
        let Some(payload) = source.0.payload.get() else {
            return false;
        };
        self.0
            .payload
            .set(Payload {
                type_name: payload.type_name,
                data: Arc::clone(&payload.data),
            })
            .is_ok()
    }

    /// Returns the reference identity of this object.
    #[must_use]
    pub fn identity(&self) -> Identity { Identity::of(Arc::as_ptr(&self.0)) }

    /// Returns `true` if both handles point at the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// =============================================================================
// Value
// =============================================================================

/// A node of a runtime object graph.
#[derive(Clone)]
pub enum Value {
    /// The unit / null value.
    Null,
    /// The "not applicable" sentinel.
    NotApplicable,
    /// A boolean.
    Bool(bool),
    /// A signed 64-bit integer.
    Int(i64),
    /// A 64-bit float.
    Float(f64),
    /// An immutable string.
    Str(Arc<str>),
    /// An immutable byte string.
    Bytes(Arc<[u8]>),
    /// A mutable list.
    List(ListRef),
    /// A mutable set.
    Set(SetRef),
    /// A mutable mapping.
    Map(MapRef),
    /// An immutable tuple.
    Tuple(TupleRef),
    /// An immutable set.
    FrozenSet(TupleRef),
    /// An opaque, handler-backed object.
    Object(ObjectRef),
}

impl Value {
    /// Creates a list from `items`.
    pub fn list(items: impl IntoIterator<Item = Self>) -> Self {
        Self::List(ListRef::new(items.into_iter().collect()))
    }

    /// Creates a set from `items`, dropping duplicates.
    pub fn set(items: impl IntoIterator<Item = Self>) -> Self {
        let set = SetRef::default();
        for item in items {
            set.insert(item);
        }
        Self::Set(set)
    }

    /// Creates a mapping from `entries`; later duplicates win.
    pub fn map<K: Into<Self>, V: Into<Self>>(
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        let map = MapRef::default();
        for (key, value) in entries {
            map.insert(key.into(), value.into());
        }
        Self::Map(map)
    }

    /// Creates a tuple from `items`.
    pub fn tuple(items: impl IntoIterator<Item = Self>) -> Self {
        Self::Tuple(TupleRef::new(items.into_iter().collect()))
    }

    /// Creates a frozen set from `items`, dropping duplicates.
    pub fn frozen_set(items: impl IntoIterator<Item = Self>) -> Self {
        Self::FrozenSet(TupleRef::new(dedup(items)))
    }

    /// Wraps `payload` in a new opaque object.
    pub fn object<T: Any + Send + Sync>(payload: T) -> Self {
        Self::Object(ObjectRef::new(payload))
    }

    /// Creates a byte string.
    pub fn bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// Returns the reference identity of shared values, `None` for primitives.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        match self {
            Self::List(list) => Some(list.identity()),
            Self::Set(set) => Some(set.identity()),
            Self::Map(map) => Some(map.identity()),
            Self::Tuple(tuple) | Self::FrozenSet(tuple) => {
                Some(tuple.identity())
            }
            Self::Object(object) => Some(object.identity()),
            _ => None,
        }
    }

    /// Returns `true` for values without identity semantics.
    #[must_use]
    pub const fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Null
                | Self::NotApplicable
                | Self::Bool(_)
                | Self::Int(_)
                | Self::Float(_)
                | Self::Str(_)
                | Self::Bytes(_)
        )
    }

    /// Returns a short type name used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::NotApplicable => "not-applicable",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Tuple(_) => "tuple",
            Self::FrozenSet(_) => "frozenset",
            Self::Object(object) => object.type_name(),
        }
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        if let Self::Bool(b) = self { Some(*b) } else { None }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        if let Self::Int(i) = self { Some(*i) } else { None }
    }

    /// Returns the float, if this is one.
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        if let Self::Float(f) = self { Some(*f) } else { None }
    }

    /// Returns the string, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        if let Self::Str(s) = self { Some(s) } else { None }
    }

    /// Returns the byte string, if this is one.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let Self::Bytes(b) = self { Some(b) } else { None }
    }

    /// Returns the list handle, if this is a list.
    #[must_use]
    pub const fn as_list(&self) -> Option<&ListRef> {
        if let Self::List(list) = self { Some(list) } else { None }
    }

    /// Returns the set handle, if this is a set.
    #[must_use]
    pub const fn as_set(&self) -> Option<&SetRef> {
        if let Self::Set(set) = self { Some(set) } else { None }
    }

    /// Returns the mapping handle, if this is a mapping.
    #[must_use]
    pub const fn as_map(&self) -> Option<&MapRef> {
        if let Self::Map(map) = self { Some(map) } else { None }
    }

    /// Returns the tuple handle, if this is a tuple.
    #[must_use]
    pub const fn as_tuple(&self) -> Option<&TupleRef> {
        if let Self::Tuple(tuple) = self { Some(tuple) } else { None }
    }

    /// Returns the frozen set handle, if this is a frozen set.
    #[must_use]
    pub const fn as_frozen_set(&self) -> Option<&TupleRef> {
        if let Self::FrozenSet(set) = self { Some(set) } else { None }
    }

    /// Returns the object handle, if this is an object.
    #[must_use]
    pub const fn as_object(&self) -> Option<&ObjectRef> {
        if let Self::Object(object) = self { Some(object) } else { None }
    }

    /// Compares two graphs by structure rather than identity.
    ///
    /// Cycles are compared coinductively: a pair of shared values already
    /// under comparison is assumed equal. Objects compare by type name and
    /// placeholder status only, since their payloads are opaque.
    #[must_use]
    pub fn deep_eq(&self, other: &Self) -> bool {
        DeepEq::default().eq(self, other)
    }

    /// Counts the placeholder objects reachable through collections.
    ///
    /// Object payloads are opaque and are not descended into.
    #[must_use]
    pub fn pending_objects(&self) -> usize {
        let mut seen = FxHashSet::default();
        let mut stack = vec![self.clone()];
        let mut pending = 0;

        while let Some(value) = stack.pop() {
            if let Some(identity) = value.identity()
                && !seen.insert(identity)
            {
                continue;
            }

            match &value {
                Self::List(list) => stack.extend(list.snapshot()),
                Self::Set(set) => stack.extend(set.snapshot()),
                Self::Map(map) => {
                    for (key, value) in map.entries() {
                        stack.push(key);
                        stack.push(value);
                    }
                }
                Self::Tuple(tuple) | Self::FrozenSet(tuple) => {
                    stack.extend(tuple.items().iter().cloned());
                }
                Self::Object(object) if object.is_pending() => pending += 1,
                _ => {}
            }
        }

        pending
    }
}

fn dedup(items: impl IntoIterator<Item = Value>) -> Vec<Value> {
    let mut unique = Keyed::default();
    for item in items {
        if unique.position(&item).is_none() {
            unique.push(item.clone(), item);
        }
    }
    unique.items
}

/// Primitives compare by value, mutable collections and objects by
/// identity, immutable collections element-wise.
impl PartialEq for Value {
    #[allow(clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null)
            | (Self::NotApplicable, Self::NotApplicable) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b)) => a.ptr_eq(b),
            (Self::Set(a), Self::Set(b)) => a.ptr_eq(b),
            (Self::Map(a), Self::Map(b)) => a.ptr_eq(b),
            (Self::Tuple(a), Self::Tuple(b))
            | (Self::FrozenSet(a), Self::FrozenSet(b)) => {
                a.ptr_eq(b) || a.items() == b.items()
            }
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Hashes consistently with `PartialEq`: shared mutable values and objects
/// by identity, immutable collections element-wise.
impl Hash for Value {
    #[allow(clippy::float_cmp)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null | Self::NotApplicable => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            // `0.0 == -0.0`, so both zeros hash alike
            Self::Float(x) => {
                let x = if *x == 0.0 { 0.0 } else { *x };
                x.to_bits().hash(state);
            }
            Self::Str(s) => s.hash(state),
            Self::Bytes(b) => b.hash(state),
            Self::Tuple(tuple) | Self::FrozenSet(tuple) => {
                tuple.items().hash(state);
            }
            Self::List(_) | Self::Set(_) | Self::Map(_) | Self::Object(_) => {
                self.identity().hash(state);
            }
        }
    }
}

#[derive(Default)]
struct DeepEq {
    assumed: FxHashSet<(Identity, Identity)>,
}

impl DeepEq {
    /// Records the pair, returning `true` if it was already under comparison.
    fn assumed(&mut self, a: Identity, b: Identity) -> bool {
        !self.assumed.insert((a, b))
    }

    fn eq(&mut self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::List(x), Value::List(y)) => {
                self.assumed(x.identity(), y.identity())
                    || self.all(&x.snapshot(), &y.snapshot())
            }
            (Value::Set(x), Value::Set(y)) => {
                self.assumed(x.identity(), y.identity())
                    || self.all(&x.snapshot(), &y.snapshot())
            }
            (Value::Map(x), Value::Map(y)) => {
                if self.assumed(x.identity(), y.identity()) {
                    return true;
                }
                let (xs, ys) = (x.entries(), y.entries());
                xs.len() == ys.len()
                    && xs.iter().zip(&ys).all(|((k1, v1), (k2, v2))| {
                        self.eq(k1, k2) && self.eq(v1, v2)
                    })
            }
            (Value::Tuple(x), Value::Tuple(y))
            | (Value::FrozenSet(x), Value::FrozenSet(y)) => {
                self.assumed(x.identity(), y.identity())
                    || self.all(x.items(), y.items())
            }
            (Value::Object(x), Value::Object(y)) => {
                x.type_name() == y.type_name()
                    && x.is_pending() == y.is_pending()
            }
            _ => a == b,
        }
    }

    fn all(&mut self, xs: &[Value], ys: &[Value]) -> bool {
        xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.eq(x, y))
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for Value {
    fn from(value: bool) -> Self { Self::Bool(value) }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self { Self::Int(value) }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self { Self::Int(i64::from(value)) }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self { Self::Int(i64::from(value)) }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self { Self::Float(value) }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self { Self::Str(Arc::from(value)) }
}

impl From<String> for Value {
    fn from(value: String) -> Self { Self::Str(Arc::from(value)) }
}

impl From<Arc<str>> for Value {
    fn from(value: Arc<str>) -> Self { Self::Str(value) }
}

impl From<ListRef> for Value {
    fn from(value: ListRef) -> Self { Self::List(value) }
}

impl From<MapRef> for Value {
    fn from(value: MapRef) -> Self { Self::Map(value) }
}

impl From<SetRef> for Value {
    fn from(value: SetRef) -> Self { Self::Set(value) }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self { Self::Object(value) }
}

// =============================================================================
// Debug rendering
// =============================================================================

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render(self, f, &mut Vec::new())
    }
}

macro_rules! debug_via_value {
    ($($ty:ident => $variant:ident),+ $(,)?) => {
        $(
            impl fmt::Debug for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmt::Debug::fmt(&Value::$variant(self.clone()), f)
                }
            }
        )+
    };
}

debug_via_value!(
    ListRef => List,
    SetRef => Set,
    MapRef => Map,
    TupleRef => Tuple,
    ObjectRef => Object,
);

/// `open` holds the shared values on the current rendering path; meeting
/// one again prints `<cycle>` instead of recursing.
fn render(
    value: &Value,
    f: &mut fmt::Formatter<'_>,
    open: &mut Vec<Identity>,
) -> fmt::Result {
    let identity = value.identity();
    if let Some(identity) = identity {
        if open.contains(&identity) {
            return f.write_str("<cycle>");
        }
        open.push(identity);
    }

    let result = match value {
        Value::Null => f.write_str("null"),
        Value::NotApplicable => f.write_str("n/a"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Int(i) => write!(f, "{i}"),
        Value::Float(x) => write!(f, "{x:?}"),
        Value::Str(s) => write!(f, "{:?}", &**s),
        Value::Bytes(b) => write!(f, "b[{} bytes]", b.len()),
        Value::List(list) => render_seq(f, "[", &list.snapshot(), "]", open),
        Value::Set(set) => render_seq(f, "{", &set.snapshot(), "}", open),
        Value::Tuple(tuple) => render_seq(f, "(", tuple.items(), ")", open),
        Value::FrozenSet(set) => {
            render_seq(f, "frozenset{", set.items(), "}", open)
        }
        Value::Map(map) => render_map(f, &map.entries(), open),
        Value::Object(object) if object.is_pending() => {
            write!(f, "<pending {}>", object.type_name())
        }
        Value::Object(object) => write!(f, "<{}>", object.type_name()),
    };

    if identity.is_some() {
        open.pop();
    }
    result
}

fn render_seq(
    f: &mut fmt::Formatter<'_>,
    open_delim: &str,
    items: &[Value],
    close_delim: &str,
    open: &mut Vec<Identity>,
) -> fmt::Result {
    f.write_str(open_delim)?;
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        render(item, f, open)?;
    }
    f.write_str(close_delim)
}

fn render_map(
    f: &mut fmt::Formatter<'_>,
    entries: &[(Value, Value)],
    open: &mut Vec<Identity>,
) -> fmt::Result {
    f.write_str("{")?;
    for (index, (key, value)) in entries.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        render(key, f, open)?;
        f.write_str(": ")?;
        render(value, f, open)?;
    }
    f.write_str("}")
}
