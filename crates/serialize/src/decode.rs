//! Decoding traits and implementations.
//!
//! This module provides the [`Decoder`] trait for byte sources and the
//! [`Decode`] trait for values that can read themselves from one.

use std::io;

/// A source of primitive values.
///
/// Every method reports truncated or invalid input as an [`io::Error`] with
/// [`io::ErrorKind::UnexpectedEof`] or [`io::ErrorKind::InvalidData`]; a
/// decoder never panics on hostile input.
pub trait Decoder {
    // =========================================================================
    // Required methods
    // =========================================================================

    /// Reads a single unsigned byte.
    fn read_u8(&mut self) -> io::Result<u8>;

    /// Reads a 64-bit unsigned integer.
    fn read_u64(&mut self) -> io::Result<u64>;

    /// Reads a 64-bit signed integer.
    fn read_i64(&mut self) -> io::Result<i64>;

    /// Reads exactly `len` raw bytes.
    fn read_raw_bytes(&mut self, len: usize) -> io::Result<Vec<u8>>;

    // =========================================================================
    // Default implementations
    // =========================================================================

    /// Reads a platform-sized unsigned integer stored as a `u64`.
    ///
    /// # Errors
    ///
    /// Fails if the stored value does not fit in `usize`.
    fn read_usize(&mut self) -> io::Result<usize> {
        let v = self.read_u64()?;
        usize::try_from(v).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("length {v} does not fit in usize"),
            )
        })
    }

    /// Reads a boolean; only `0` and `1` are accepted.
    fn read_bool(&mut self) -> io::Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid boolean byte {other:#04x}"),
            )),
        }
    }

    /// Reads a 64-bit float from its IEEE 754 bit pattern.
    fn read_f64(&mut self) -> io::Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Reads a length-prefixed UTF-8 string.
    fn read_str(&mut self) -> io::Result<String> {
        let len = self.read_usize()?;
        let bytes = self.read_raw_bytes(len)?;
        String::from_utf8(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Reads a length-prefixed byte string.
    fn read_bytes(&mut self) -> io::Result<Vec<u8>> {
        let len = self.read_usize()?;
        self.read_raw_bytes(len)
    }

    /// Decodes any [`Decode`] value through this decoder.
    fn decode<T: Decode>(&mut self) -> io::Result<T> { T::decode(self) }
}

/// A value that can be read through a [`Decoder`].
pub trait Decode: Sized {
    /// Reads a value of this type from `decoder`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is truncated or malformed.
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> io::Result<Self>;
}

macro_rules! impl_decode_via {
    ($($ty:ty => $method:ident),+ $(,)?) => {
        $(
            impl Decode for $ty {
                fn decode<D: Decoder + ?Sized>(
                    decoder: &mut D,
                ) -> io::Result<Self> {
                    decoder.$method()
                }
            }
        )+
    };
}

impl_decode_via!(
    u8 => read_u8,
    u64 => read_u64,
    usize => read_usize,
    i64 => read_i64,
    bool => read_bool,
    f64 => read_f64,
);

impl<T: Decode> Decode for Option<T> {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> io::Result<Self> {
        if decoder.read_bool()? {
            Ok(Some(T::decode(decoder)?))
        } else {
            Ok(None)
        }
    }
}
