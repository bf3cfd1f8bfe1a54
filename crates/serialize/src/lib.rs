//! Byte-level serialization primitives for relink.
//!
//! This crate provides the low-level half of relink's binary wire format:
//!
//! - [`Encoder`]: emits primitive values to a byte sink
//! - [`Encode`]: types that know how to write themselves through an encoder
//! - [`Decoder`]: reads primitive values back from a byte source
//! - [`Decode`]: types that know how to read themselves through a decoder
//!
//! The only concrete format shipped here is [`postcard`], a compact
//! varint-based layout. The object-graph layer in the `relink` crate builds
//! its flat node table on top of these traits; nothing in this crate knows
//! about object identity.
//!
//! # Example
//!
//! ```
//! use relink_serialize::postcard;
//!
//! let bytes = postcard::encode(&Some(300u64)).unwrap();
//! let value: Option<u64> = postcard::decode(&bytes).unwrap();
//! assert_eq!(value, Some(300));
//! ```

pub mod decode;
pub mod encode;
pub mod postcard;

pub use decode::{Decode, Decoder};
pub use encode::{Encode, Encoder};
pub use postcard::{PostcardDecoder, PostcardEncoder};
