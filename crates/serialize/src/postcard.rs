//! Postcard-style binary format.
//!
//! [`PostcardEncoder`] and [`PostcardDecoder`] implement [`Encoder`] and
//! [`Decoder`] with a layout similar to the
//! [`postcard`](https://docs.rs/postcard) crate:
//!
//! - unsigned integers wider than a byte use LEB128 varints,
//! - signed integers are zigzag-mapped before varint encoding,
//! - `f64` is written as 8 little-endian bytes,
//! - strings and byte strings carry a varint length prefix.

use std::io::{self, Read, Write};

use crate::{Decode, Decoder, Encode, Encoder};

// =============================================================================
// Varint helpers
// =============================================================================

const MAX_VARINT_U64_BYTES: usize = 10;

/// Writes `value` as a LEB128 varint into `buf`, returning the number of
/// bytes used.
#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn encode_varint_u64(
    mut value: u64,
    buf: &mut [u8; MAX_VARINT_U64_BYTES],
) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}

#[inline]
#[allow(clippy::cast_sign_loss)]
const fn zigzag_encode_i64(v: i64) -> u64 { ((v << 1) ^ (v >> 63)) as u64 }

#[inline]
#[allow(clippy::cast_possible_wrap)]
const fn zigzag_decode_i64(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

// =============================================================================
// PostcardEncoder
// =============================================================================

/// A postcard-style encoder writing to any [`Write`] sink.
#[derive(Debug)]
pub struct PostcardEncoder<W> {
    writer: W,
}

impl<W> PostcardEncoder<W> {
    /// Creates a new encoder wrapping the given writer.
    #[must_use]
    pub const fn new(writer: W) -> Self { Self { writer } }

    /// Returns a reference to the underlying writer.
    #[must_use]
    pub const fn get_ref(&self) -> &W { &self.writer }

    /// Consumes the encoder and returns the underlying writer.
    #[must_use]
    pub fn into_inner(self) -> W { self.writer }
}

impl<W: Write> Encoder for PostcardEncoder<W> {
    fn emit_u8(&mut self, v: u8) -> io::Result<()> {
        self.writer.write_all(&[v])
    }

    fn emit_u64(&mut self, v: u64) -> io::Result<()> {
        let mut buf = [0u8; MAX_VARINT_U64_BYTES];
        let len = encode_varint_u64(v, &mut buf);
        self.writer.write_all(&buf[..len])
    }

    fn emit_i64(&mut self, v: i64) -> io::Result<()> {
        self.emit_u64(zigzag_encode_i64(v))
    }

    fn emit_raw_bytes(&mut self, s: &[u8]) -> io::Result<()> {
        self.writer.write_all(s)
    }

    // fixed width, varints do not help for floats
    fn emit_f64(&mut self, v: f64) -> io::Result<()> {
        self.writer.write_all(&v.to_le_bytes())
    }
}

// =============================================================================
// PostcardDecoder
// =============================================================================

/// A postcard-style decoder reading from any [`Read`] source.
///
/// When the source is a byte slice, [`PostcardDecoder::into_inner`] returns
/// the unread remainder, which callers use to reject trailing garbage.
#[derive(Debug)]
pub struct PostcardDecoder<R> {
    reader: R,
}

impl<R> PostcardDecoder<R> {
    /// Creates a new decoder wrapping the given reader.
    #[must_use]
    pub const fn new(reader: R) -> Self { Self { reader } }

    /// Returns a reference to the underlying reader.
    #[must_use]
    pub const fn get_ref(&self) -> &R { &self.reader }

    /// Consumes the decoder and returns the underlying reader.
    #[must_use]
    pub fn into_inner(self) -> R { self.reader }
}

impl<R: Read> PostcardDecoder<R> {
    fn read_byte(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.reader.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_varint_u64(&mut self) -> io::Result<u64> {
        let mut result = 0u64;
        let mut shift = 0;

        loop {
            let byte = self.read_byte()?;

            if shift >= 64 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "varint too long for u64",
                ));
            }

            result |= u64::from(byte & 0x7F) << shift;

            if byte & 0x80 == 0 {
                return Ok(result);
            }

            shift += 7;
        }
    }
}

impl<R: Read> Decoder for PostcardDecoder<R> {
    fn read_u8(&mut self) -> io::Result<u8> { self.read_byte() }

    fn read_u64(&mut self) -> io::Result<u64> { self.read_varint_u64() }

    fn read_i64(&mut self) -> io::Result<i64> {
        Ok(zigzag_decode_i64(self.read_varint_u64()?))
    }

    fn read_raw_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
        // `take` keeps a forged length from pre-allocating unbounded memory
        let mut buf = Vec::new();
        let limit = u64::try_from(len).unwrap_or(u64::MAX);
        (&mut self.reader).take(limit).read_to_end(&mut buf)?;
        if buf.len() == len {
            Ok(buf)
        } else {
            Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {len} bytes, found {}", buf.len()),
            ))
        }
    }

    fn read_f64(&mut self) -> io::Result<f64> {
        let mut buf = [0u8; 8];
        self.reader.read_exact(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }
}

// =============================================================================
// Convenience functions
// =============================================================================

/// Encodes `value` into a fresh byte vector.
///
/// # Errors
///
/// Only fails if an [`Encode`] implementation reports an error; writing to a
/// `Vec<u8>` itself cannot fail.
pub fn encode<T: Encode + ?Sized>(value: &T) -> io::Result<Vec<u8>> {
    let mut encoder = PostcardEncoder::new(Vec::new());
    value.encode(&mut encoder)?;
    Ok(encoder.into_inner())
}

/// Decodes a `T` from the start of `bytes`.
///
/// Trailing bytes are ignored; use [`PostcardDecoder`] directly to inspect
/// the remainder.
///
/// # Errors
///
/// Fails if `bytes` is truncated or does not hold a valid `T`.
pub fn decode<T: Decode>(bytes: &[u8]) -> io::Result<T> {
    let mut decoder = PostcardDecoder::new(bytes);
    T::decode(&mut decoder)
}
