//! The binary wire format: a compact, flat rendering of IR trees.
//!
//! # Layout
//!
//! ```text
//! "RLNK" version:u8 count:varint node*
//! ```
//!
//! Nodes form a table written in post-order, so every child precedes its
//! parent and the last node is the root. Children are referenced by table
//! index. A [`Node`] handle that occurs several times in the tree is written
//! once, so shared sub-trees stay shared after [`from_bytes`].
//!
//! Each node starts with a tag byte:
//!
//! | tag | node | payload |
//! |-----|------|---------|
//! | 0 | null | |
//! | 1 | not-applicable | |
//! | 2 | bool | `u8` |
//! | 3 | int | zigzag varint |
//! | 4 | float | 8 bytes little-endian |
//! | 5 | string | length-prefixed UTF-8 |
//! | 6 | bytes | length-prefixed |
//! | 7 | collection | kind `u8`, optional id, length, child indices |
//! | 8 | reference | id |
//! | 9 | tagged | type, handler, optional id, state index |
//!
//! Mapping children are written as key, value index pairs. Integers use the
//! varints of [`relink_serialize::postcard`].

use std::{io, sync::Arc};

use fxhash::{FxHashMap, FxHashSet};
use relink_serialize::{
    Decoder as _, Encoder as _, PostcardDecoder, PostcardEncoder,
};
use tracing::debug;

use crate::{
    config::{Config, DefaultConfig},
    diagnostic::{self, Path},
    error::{Error, ErrorKind, Result},
    ir::{CollectionKind, Elements, Id, Node, NodeKind, Primitive},
};

/// The first bytes of every payload.
pub const MAGIC: &[u8; 4] = b"RLNK";

/// The layout version this module reads and writes.
pub const VERSION: u8 = 1;

const TAG_NULL: u8 = 0;
const TAG_NOT_APPLICABLE: u8 = 1;
const TAG_BOOL: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_STR: u8 = 5;
const TAG_BYTES: u8 = 6;
const TAG_COLLECTION: u8 = 7;
const TAG_REFERENCE: u8 = 8;
const TAG_TAGGED: u8 = 9;

// =============================================================================
// Writing
// =============================================================================

/// Serializes `node` into the binary wire format.
///
/// # Errors
///
/// Writing to memory cannot fail; an error here means the node table was
/// built incorrectly and is reported as [`ErrorKind::Inconsistent`].
pub fn to_bytes(node: &Node) -> Result<Vec<u8>> {
    let table = post_order(node);
    let index: FxHashMap<usize, usize> = table
        .iter()
        .enumerate()
        .map(|(position, node)| (node.address(), position))
        .collect();

    let mut encoder = PostcardEncoder::new(Vec::new());
    write_table(&mut encoder, &table, &index).map_err(|error| {
        Error::new(
            ErrorKind::Inconsistent,
            &Path::root(),
            format!("failed to write node table: {error}"),
        )
        .with_source(Box::new(error))
    })?;

    let bytes = encoder.into_inner();
    debug!(nodes = table.len(), bytes = bytes.len(), "wrote wire payload");
    Ok(bytes)
}

/// Lists every distinct node handle of the tree, children first.
fn post_order(root: &Node) -> Vec<&Node> {
    let mut seen = FxHashSet::default();
    let mut order = Vec::new();
    let mut stack = vec![(root, false)];

    while let Some((node, expanded)) = stack.pop() {
        if seen.contains(&node.address()) {
            continue;
        }

        if expanded {
            seen.insert(node.address());
            order.push(node);
            continue;
        }

        stack.push((node, true));
        // reversed so the first child is finished first
        stack.extend(
            node.children().into_iter().rev().map(|child| (child, false)),
        );
    }

    order
}

fn write_table(
    encoder: &mut PostcardEncoder<Vec<u8>>,
    table: &[&Node],
    index: &FxHashMap<usize, usize>,
) -> io::Result<()> {
    let position = |node: &Node| {
        index.get(&node.address()).copied().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "child missing from table",
            )
        })
    };

    encoder.emit_raw_bytes(MAGIC)?;
    encoder.emit_u8(VERSION)?;
    encoder.emit_usize(table.len())?;

    for node in table {
        match node.kind() {
            NodeKind::Primitive(primitive) => {
                write_primitive(encoder, primitive)?;
            }
            NodeKind::Reference(id) => {
                encoder.emit_u8(TAG_REFERENCE)?;
                encoder.emit_u64(id.get())?;
            }
            NodeKind::Collection(collection) => {
                encoder.emit_u8(TAG_COLLECTION)?;
                encoder.emit_u8(kind_tag(collection.kind))?;
                encoder.encode(&collection.id.map(Id::get))?;
                encoder.emit_usize(collection.elements.len())?;
                match &collection.elements {
                    Elements::Items(items) => {
                        for item in items {
                            encoder.emit_usize(position(item)?)?;
                        }
                    }
                    Elements::Entries(entries) => {
                        for (key, value) in entries {
                            encoder.emit_usize(position(key)?)?;
                            encoder.emit_usize(position(value)?)?;
                        }
                    }
                }
            }
            NodeKind::Tagged(tagged) => {
                encoder.emit_u8(TAG_TAGGED)?;
                encoder.emit_str(&tagged.type_name)?;
                encoder.emit_str(&tagged.handler)?;
                encoder.encode(&tagged.id.map(Id::get))?;
                encoder.emit_usize(position(&tagged.state)?)?;
            }
        }
    }

    Ok(())
}

fn write_primitive(
    encoder: &mut PostcardEncoder<Vec<u8>>,
    primitive: &Primitive,
) -> io::Result<()> {
    match primitive {
        Primitive::Null => encoder.emit_u8(TAG_NULL),
        Primitive::NotApplicable => encoder.emit_u8(TAG_NOT_APPLICABLE),
        Primitive::Bool(b) => {
            encoder.emit_u8(TAG_BOOL)?;
            encoder.emit_bool(*b)
        }
        Primitive::Int(i) => {
            encoder.emit_u8(TAG_INT)?;
            encoder.emit_i64(*i)
        }
        Primitive::Float(f) => {
            encoder.emit_u8(TAG_FLOAT)?;
            encoder.emit_f64(*f)
        }
        Primitive::Str(s) => {
            encoder.emit_u8(TAG_STR)?;
            encoder.emit_str(s)
        }
        Primitive::Bytes(bytes) => {
            encoder.emit_u8(TAG_BYTES)?;
            encoder.emit_bytes(bytes)
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn kind_tag(kind: CollectionKind) -> u8 {
    CollectionKind::ALL
        .iter()
        .position(|candidate| *candidate == kind)
        .unwrap_or_default() as u8
}

// =============================================================================
// Reading
// =============================================================================

/// Parses a payload produced by [`to_bytes`].
///
/// # Errors
///
/// Returns [`ErrorKind::MalformedNode`] for truncated or corrupted input, an
/// unknown version, a child index that does not point backwards, or trailing
/// bytes; [`ErrorKind::DepthExceeded`] if the tree is taller than the
/// default depth limit; [`ErrorKind::SizeExceeded`] if the tree, with shared
/// sub-trees counted at every occurrence, has more nodes than the default
/// limit.
pub fn from_bytes(bytes: &[u8]) -> Result<Node> {
    from_bytes_with::<DefaultConfig>(bytes)
}

/// Like [`from_bytes`], with the limits of `C`.
///
/// # Errors
///
/// See [`from_bytes`].
pub fn from_bytes_with<C: Config>(bytes: &[u8]) -> Result<Node> {
    Reader::<C>::new(bytes).read()
}

/// Shape of a table entry's tree with shared sub-trees expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Extent {
    /// Leaves are 0.
    height: usize,
    /// Saturating node count.
    size: usize,
}

impl Extent {
    const LEAF: Self = Self { height: 0, size: 1 };

    const fn join(self, child: Self) -> Self {
        Self {
            height: if child.height > self.height {
                child.height
            } else {
                self.height
            },
            size: self.size.saturating_add(child.size),
        }
    }

    /// The extent of a parent over children joined into `self`.
    const fn parent(self) -> Self {
        Self {
            height: self.height + 1,
            size: self.size.saturating_add(1),
        }
    }
}

struct Reader<'a, C> {
    input: &'a [u8],
    decoder: PostcardDecoder<&'a [u8]>,
    table: Vec<Node>,
    extents: Vec<Extent>,
    _config: std::marker::PhantomData<C>,
}

impl<'a, C: Config> Reader<'a, C> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            decoder: PostcardDecoder::new(input),
            table: Vec::new(),
            extents: Vec::new(),
            _config: std::marker::PhantomData,
        }
    }

    fn read(mut self) -> Result<Node> {
        let magic = self.io(|d| d.read_raw_bytes(MAGIC.len()))?;
        if magic != MAGIC {
            return Err(self.malformed("not a relink payload"));
        }

        let version = self.io(|d| d.read_u8())?;
        if version != VERSION {
            return Err(
                self.malformed(&format!("unsupported wire version {version}"))
            );
        }

        let count = self.io(|d| d.read_usize())?;
        if count == 0 {
            return Err(self.malformed("empty node table"));
        }

        // every node takes at least one byte
        let capacity = count.min(self.input.len());
        self.table.reserve(capacity);
        self.extents.reserve(capacity);

        for _ in 0..count {
            let (node, extent) = self.read_node()?;
            self.check(extent)?;
            self.table.push(node);
            self.extents.push(extent);
        }

        let remaining = self.decoder.get_ref().len();
        if remaining != 0 {
            return Err(self.malformed(&format!(
                "{remaining} trailing byte(s) after the root"
            )));
        }

        debug!(nodes = count, bytes = self.input.len(), "read wire payload");
        self.table
            .pop()
            .ok_or_else(|| self.malformed("empty node table"))
    }

    fn check(&self, extent: Extent) -> Result<()> {
        let (kind, message) = if extent.height > C::max_depth() {
            (
                ErrorKind::DepthExceeded,
                format!(
                    "node {} nests deeper than {}",
                    self.table.len(),
                    C::max_depth()
                ),
            )
        } else if extent.size > C::max_nodes() {
            (
                ErrorKind::SizeExceeded,
                format!(
                    "node {} expands to more than {} nodes",
                    self.table.len(),
                    C::max_nodes()
                ),
            )
        } else {
            return Ok(());
        };

        Err(Error::new(kind, &Path::root(), message)
            .with_snapshot(self.snapshot()))
    }

    fn read_node(&mut self) -> Result<(Node, Extent)> {
        let tag = self.io(|d| d.read_u8())?;

        let primitive = match tag {
            TAG_NULL => Primitive::Null,
            TAG_NOT_APPLICABLE => Primitive::NotApplicable,
            TAG_BOOL => Primitive::Bool(self.io(|d| d.read_bool())?),
            TAG_INT => Primitive::Int(self.io(|d| d.read_i64())?),
            TAG_FLOAT => Primitive::Float(self.io(|d| d.read_f64())?),
            TAG_STR => Primitive::Str(Arc::from(self.io(|d| d.read_str())?)),
            TAG_BYTES => {
                Primitive::Bytes(Arc::from(self.io(|d| d.read_bytes())?))
            }

            TAG_REFERENCE => {
                let id = self.io(|d| d.read_u64())?;
                return Ok((Node::reference(Id::new(id)), Extent::LEAF));
            }

            TAG_COLLECTION => return self.read_collection(),

            TAG_TAGGED => {
                let type_name = self.io(|d| d.read_str())?;
                let handler = self.io(|d| d.read_str())?;
                let id = self.io(|d| d.decode::<Option<u64>>())?;
                let (state, extent) = self.child()?;
                let node =
                    Node::tagged(type_name, handler, id.map(Id::new), state);
                return Ok((node, extent.parent()));
            }

            other => {
                return Err(
                    self.malformed(&format!("unknown node tag {other}"))
                );
            }
        };

        Ok((Node::primitive(primitive), Extent::LEAF))
    }

    fn read_collection(&mut self) -> Result<(Node, Extent)> {
        let kind = self.io(|d| d.read_u8())?;
        let Some(&kind) = CollectionKind::ALL.get(usize::from(kind)) else {
            return Err(
                self.malformed(&format!("unknown collection kind {kind}"))
            );
        };
        let id = self.io(|d| d.decode::<Option<u64>>())?.map(Id::new);
        let len = self.io(|d| d.read_usize())?;

        let mut extent = Extent { height: 0, size: 0 };
        let elements = if kind == CollectionKind::Map {
            let mut entries = Vec::with_capacity(len.min(self.table.len()));
            for _ in 0..len {
                let (key, key_extent) = self.child()?;
                let (value, value_extent) = self.child()?;
                extent = extent.join(key_extent).join(value_extent);
                entries.push((key, value));
            }
            Elements::Entries(entries)
        } else {
            let mut items = Vec::with_capacity(len.min(self.table.len()));
            for _ in 0..len {
                let (item, item_extent) = self.child()?;
                extent = extent.join(item_extent);
                items.push(item);
            }
            Elements::Items(items)
        };

        Ok((Node::collection(kind, id, elements), extent.parent()))
    }

    /// Reads a child index, which must point at an earlier node.
    fn child(&mut self) -> Result<(Node, Extent)> {
        let index = self.io(|d| d.read_usize())?;
        match (self.table.get(index), self.extents.get(index)) {
            (Some(node), Some(&extent)) => Ok((node.clone(), extent)),
            _ => Err(self.malformed(&format!(
                "node {} refers to node {index}, which is not before it",
                self.table.len()
            ))),
        }
    }

    fn io<T>(
        &mut self,
        read: impl FnOnce(&mut PostcardDecoder<&'a [u8]>) -> io::Result<T>,
    ) -> Result<T> {
        read(&mut self.decoder).map_err(|error| {
            self.malformed(&format!("node {}: {error}", self.table.len()))
                .with_source(Box::new(error))
        })
    }

    fn malformed(&self, message: &str) -> Error {
        Error::new(ErrorKind::MalformedNode, &Path::root(), message)
            .with_snapshot(self.snapshot())
    }

    /// The bytes where reading stopped.
    fn snapshot(&self) -> String {
        let offset = self.input.len() - self.decoder.get_ref().len();
        diagnostic::snapshot(
            format_args!("at byte {offset}: {:02x?}", self.decoder.get_ref()),
            C::snapshot_limit(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Node { Node::primitive(Primitive::Int(i)) }

    fn sample() -> Node {
        let shared = Node::collection(
            CollectionKind::Tuple,
            None,
            Elements::Items(vec![
                Node::primitive(Primitive::Str(Arc::from("héllo"))),
                Node::primitive(Primitive::Float(-0.5)),
            ]),
        );
        Node::collection(
            CollectionKind::List,
            Some(Id::new(1)),
            Elements::Items(vec![
                shared.clone(),
                shared,
                Node::collection(
                    CollectionKind::Map,
                    Some(Id::new(2)),
                    Elements::Entries(vec![(
                        Node::primitive(Primitive::Bytes(Arc::from(
                            &[1u8, 2][..],
                        ))),
                        Node::reference(Id::new(1)),
                    )]),
                ),
                Node::tagged(
                    "app::Lock",
                    "lock",
                    Some(Id::new(3)),
                    Node::primitive(Primitive::NotApplicable),
                ),
                int(i64::MIN),
            ]),
        )
    }

    #[test]
    fn table_round_trip_keeps_sharing() {
        let node = sample();
        let bytes = to_bytes(&node).unwrap();
        assert_eq!(&bytes[..4], MAGIC);

        let decoded = from_bytes(&bytes).unwrap();
        assert_eq!(decoded, node);

        let NodeKind::Collection(root) = decoded.kind() else {
            panic!("root is not a collection");
        };
        let Elements::Items(items) = &root.elements else {
            panic!("root has no items");
        };
        assert!(items[0].ptr_eq(&items[1]));
    }

    #[test]
    fn shared_nodes_are_written_once() {
        let leaf =
            Node::primitive(Primitive::Str(Arc::from("a long shared string")));
        let once = Node::collection(
            CollectionKind::List,
            None,
            Elements::Items(vec![leaf.clone()]),
        );
        let twice = Node::collection(
            CollectionKind::List,
            None,
            Elements::Items(vec![leaf.clone(), leaf]),
        );

        let once = to_bytes(&once).unwrap();
        let twice = to_bytes(&twice).unwrap();
        // one more child index, nothing else
        assert_eq!(twice.len(), once.len() + 1);
    }

    #[test]
    fn rejects_bad_headers() {
        let error = from_bytes(b"NOPE\x01\x01\x00").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MalformedNode);
        assert_eq!(error.message(), "not a relink payload");

        let error = from_bytes(b"RLNK\x09\x01\x00").unwrap_err();
        assert_eq!(error.message(), "unsupported wire version 9");

        let error = from_bytes(b"RLNK\x01\x00").unwrap_err();
        assert_eq!(error.message(), "empty node table");
    }

    #[test]
    fn rejects_forward_and_self_indices() {
        // a list whose only child is itself
        let error =
            from_bytes(b"RLNK\x01\x01\x07\x00\x00\x01\x00").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MalformedNode);
        assert_eq!(
            error.message(),
            "node 0 refers to node 0, which is not before it"
        );
    }

    #[test]
    fn rejects_truncation_and_trailing_bytes() {
        let bytes = to_bytes(&sample()).unwrap();

        let error = from_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MalformedNode);
        assert!(std::error::Error::source(&error).is_some());

        let mut padded = bytes;
        padded.push(0);
        let error = from_bytes(&padded).unwrap_err();
        assert_eq!(error.message(), "1 trailing byte(s) after the root");
    }

    #[test]
    fn forged_count_does_not_preallocate() {
        let mut bytes = b"RLNK\x01".to_vec();
        bytes.extend(relink_serialize::postcard::encode(&u64::MAX).unwrap());
        bytes.push(TAG_NULL);

        let error = from_bytes(&bytes).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MalformedNode);
    }

    #[derive(Debug, Clone, Copy, Default)]
    struct Shallow;

    impl Config for Shallow {
        fn max_depth() -> usize { 2 }
    }

    #[test]
    fn height_is_bounded() {
        let nested = (0..3).fold(int(0), |inner, _| {
            Node::collection(
                CollectionKind::List,
                None,
                Elements::Items(vec![inner]),
            )
        });
        let bytes = to_bytes(&nested).unwrap();

        let error = from_bytes_with::<Shallow>(&bytes).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::DepthExceeded);
        assert!(from_bytes(&bytes).is_ok());
    }

    /// `levels` lists, each holding its predecessor twice.
    fn doubling(levels: usize) -> Node {
        (0..levels).fold(int(0), |prev, _| {
            Node::collection(
                CollectionKind::List,
                None,
                Elements::Items(vec![prev.clone(), prev]),
            )
        })
    }

    #[test]
    fn expanded_size_is_bounded() {
        let bytes = to_bytes(&doubling(60)).unwrap();
        assert!(bytes.len() < 400);

        let error = from_bytes(&bytes).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::SizeExceeded);
        assert_eq!(
            error.message(),
            "node 22 expands to more than 4194304 nodes"
        );

        let decoded = from_bytes(&to_bytes(&doubling(20)).unwrap()).unwrap();
        assert_eq!(decoded.node_count(), (1 << 21) - 1);
    }

    #[derive(Debug, Clone, Copy, Default)]
    struct Small;

    impl Config for Small {
        fn max_nodes() -> usize { 7 }
    }

    #[test]
    fn size_limit_follows_config() {
        let bytes = to_bytes(&doubling(2)).unwrap();
        assert_eq!(from_bytes_with::<Small>(&bytes).unwrap().node_count(), 7);

        let bytes = to_bytes(&doubling(3)).unwrap();
        let error = from_bytes_with::<Small>(&bytes).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::SizeExceeded);
        assert!(error.snapshot().is_some());
    }
}
