//! Envelope and primitive encoding shared by the label and object payloads.
//!
//! ```text
//! "ANNO" | version: u8 | kind: u8 | zlib( body )
//! ```
//!
//! Bodies are sequences of unsigned LEB128 varints.

use std::fmt;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};

use crate::error::{AnnotationError, Result};

pub(crate) const MAGIC: &[u8; 4] = b"ANNO";
pub(crate) const VERSION: u8 = 1;

/// Upper bound on decoded elements (labels or object point indices).
pub const MAX_ELEMENTS: usize = 1 << 28;

/// Upper bound on the inflated body size.
const MAX_BODY_BYTES: u64 = 10 * MAX_ELEMENTS as u64;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum PayloadKind {
    Labels = 1,
    Objects = 2,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::Labels => f.write_str("labels"),
            PayloadKind::Objects => f.write_str("objects"),
        }
    }
}

/// A value with its own annotation payload kind.
pub trait Annotation: Sized {
    const KIND: PayloadKind;

    fn write_body(&self, out: &mut Vec<u8>);

    fn read_body(reader: &mut BodyReader<'_>) -> Result<Self>;
}

/// Encodes `value` into a self-describing compressed buffer.
pub fn encode<A: Annotation>(value: &A) -> Result<Vec<u8>> {
    encode_to(value, Vec::new())
}

/// Encodes `value` into `out` and hands the writer back once the
/// compressed stream is complete.
pub fn encode_to<A: Annotation, W: Write>(value: &A, out: W) -> Result<W> {
    let mut body = Vec::new();
    value.write_body(&mut body);
    seal_into(A::KIND, &body, out)
}

fn seal_into<W: Write>(kind: PayloadKind, body: &[u8], mut out: W) -> Result<W> {
    out.write_all(MAGIC)?;
    out.write_all(&[VERSION, kind as u8])?;

    let mut encoder = ZlibEncoder::new(out, Compression::default());
    encoder.write_all(body)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
pub(crate) fn seal(kind: PayloadKind, body: &[u8]) -> Vec<u8> {
    seal_into(kind, body, Vec::new()).unwrap()
}

/// Decodes a buffer produced by [`encode`] for the same annotation type.
pub fn decode<A: Annotation>(bytes: &[u8]) -> Result<A> {
    decode_with_limit(bytes, MAX_ELEMENTS)
}

/// Like [`decode`], but fails with [`AnnotationError::TooLarge`] as soon as
/// the payload declares more than `limit` elements, before allocating them.
/// `limit` never exceeds [`MAX_ELEMENTS`].
pub fn decode_with_limit<A: Annotation>(bytes: &[u8], limit: usize) -> Result<A> {
    let body = open(bytes, A::KIND)?;
    let mut reader = BodyReader::new(&body, limit.min(MAX_ELEMENTS));
    let value = A::read_body(&mut reader)?;
    reader.finish()?;
    Ok(value)
}

fn open(bytes: &[u8], kind: PayloadKind) -> Result<Vec<u8>> {
    let (magic, rest) = bytes.split_at_checked(MAGIC.len()).ok_or(AnnotationError::BadMagic)?;
    if magic != MAGIC {
        return Err(AnnotationError::BadMagic);
    }
    let [version, found, compressed @ ..] = rest else {
        return Err(AnnotationError::Truncated);
    };
    let (version, found) = (*version, *found);
    if version != VERSION {
        return Err(AnnotationError::UnsupportedVersion(version));
    }
    if found != kind as u8 {
        return Err(AnnotationError::WrongKind { expected: kind, found });
    }

    inflate(compressed)
}

/// Inflates a complete zlib stream. A stream that stops before its end
/// marker is truncated; bytes after it are trailing garbage.
fn inflate(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut inflater = Decompress::new(true);
    let mut body = Vec::with_capacity(compressed.len().saturating_mul(4).max(64));
    loop {
        if body.len() == body.capacity() {
            if body.len() as u64 >= MAX_BODY_BYTES {
                return Err(AnnotationError::BodyTooLarge(MAX_BODY_BYTES));
            }
            body.reserve(body.capacity());
        }
        let before = (inflater.total_in(), inflater.total_out());
        let input = &compressed[inflater.total_in() as usize..];
        let status = inflater.decompress_vec(input, &mut body, FlushDecompress::None)?;
        if status == Status::StreamEnd {
            break;
        }
        let stalled = (inflater.total_in(), inflater.total_out()) == before;
        if stalled && body.len() < body.capacity() {
            return Err(AnnotationError::Truncated);
        }
    }

    let trailing = compressed.len() - inflater.total_in() as usize;
    if trailing > 0 {
        return Err(AnnotationError::TrailingBytes(trailing));
    }
    Ok(body)
}

pub(crate) fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

pub(crate) fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub(crate) fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Bounds-checked cursor over an inflated body.
pub struct BodyReader<'a> {
    buf: &'a [u8],
    pos: usize,
    limit: usize,
}

impl<'a> BodyReader<'a> {
    fn new(buf: &'a [u8], limit: usize) -> Self {
        Self { buf, pos: 0, limit }
    }

    /// Fails once a running element total passes the decode limit.
    pub fn check_elements(&self, found: usize) -> Result<()> {
        if found > self.limit {
            return Err(AnnotationError::TooLarge { limit: self.limit, found });
        }
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn varint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = *self.buf.get(self.pos).ok_or(AnnotationError::Truncated)?;
            self.pos += 1;
            let bits = (byte & 0x7f) as u64;
            if shift == 63 && bits > 1 {
                return Err(AnnotationError::Overflow(64));
            }
            value |= bits << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(AnnotationError::Overflow(64))
    }

    pub fn u32(&mut self) -> Result<u32> {
        u32::try_from(self.varint()?).map_err(|_| AnnotationError::Overflow(32))
    }

    /// Reads a count of items that each take at least `min_item_bytes`,
    /// rejecting counts the remaining body could not possibly hold.
    pub fn count(&mut self, min_item_bytes: usize) -> Result<usize> {
        let count = usize::try_from(self.varint()?).map_err(|_| AnnotationError::Truncated)?;
        if count.saturating_mul(min_item_bytes) > self.remaining() {
            return Err(AnnotationError::Truncated);
        }
        Ok(count)
    }

    fn finish(self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            trailing => Err(AnnotationError::TrailingBytes(trailing)),
        }
    }
}
