//! Encoding traits and implementations.
//!
//! This module provides the [`Encoder`] trait for byte sinks and the
//! [`Encode`] trait for values that can write themselves to one.

use std::io;

/// A sink for primitive values.
///
/// Implementors decide the physical layout of each primitive. The default
/// methods are expressed in terms of the required ones, so a format only
/// needs to override them when it has a more compact representation.
pub trait Encoder {
    // =========================================================================
    // Required methods
    // =========================================================================

    /// Emits a single unsigned byte.
    fn emit_u8(&mut self, v: u8) -> io::Result<()>;

    /// Emits a 64-bit unsigned integer.
    fn emit_u64(&mut self, v: u64) -> io::Result<()>;

    /// Emits a 64-bit signed integer.
    fn emit_i64(&mut self, v: i64) -> io::Result<()>;

    /// Emits raw bytes with no length prefix.
    fn emit_raw_bytes(&mut self, s: &[u8]) -> io::Result<()>;

    // =========================================================================
    // Default implementations
    // =========================================================================

    /// Emits a platform-sized unsigned integer as a `u64`.
    #[allow(clippy::cast_possible_truncation)]
    fn emit_usize(&mut self, v: usize) -> io::Result<()> {
        self.emit_u64(v as u64)
    }

    /// Emits a boolean as `0u8` / `1u8`.
    fn emit_bool(&mut self, v: bool) -> io::Result<()> {
        self.emit_u8(u8::from(v))
    }

    /// Emits a 64-bit float by its IEEE 754 bit pattern.
    fn emit_f64(&mut self, v: f64) -> io::Result<()> {
        self.emit_u64(v.to_bits())
    }

    /// Emits a length-prefixed UTF-8 string.
    fn emit_str(&mut self, v: &str) -> io::Result<()> {
        self.emit_usize(v.len())?;
        self.emit_raw_bytes(v.as_bytes())
    }

    /// Emits a length-prefixed byte string.
    fn emit_bytes(&mut self, v: &[u8]) -> io::Result<()> {
        self.emit_usize(v.len())?;
        self.emit_raw_bytes(v)
    }

    /// Encodes any [`Encode`] value through this encoder.
    fn encode<T: Encode + ?Sized>(&mut self, value: &T) -> io::Result<()> {
        value.encode(self)
    }
}

/// A value that can be written through an [`Encoder`].
pub trait Encode {
    /// Writes this value to `encoder`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying sink fails.
    fn encode<E: Encoder + ?Sized>(&self, encoder: &mut E) -> io::Result<()>;
}

macro_rules! impl_encode_via {
    ($($ty:ty => $method:ident),+ $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode<E: Encoder + ?Sized>(
                    &self,
                    encoder: &mut E,
                ) -> io::Result<()> {
                    encoder.$method(*self)
                }
            }
        )+
    };
}

impl_encode_via!(
    u8 => emit_u8,
    u64 => emit_u64,
    usize => emit_usize,
    i64 => emit_i64,
    bool => emit_bool,
    f64 => emit_f64,
);

impl<T: Encode> Encode for Option<T> {
    fn encode<E: Encoder + ?Sized>(&self, encoder: &mut E) -> io::Result<()> {
        match self {
            Some(v) => {
                encoder.emit_bool(true)?;
                v.encode(encoder)
            }
            None => encoder.emit_bool(false),
        }
    }
}
