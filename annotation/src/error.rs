use thiserror::Error;

use crate::codec::PayloadKind;

pub type Result<T> = std::result::Result<T, AnnotationError>;

/// An annotation buffer that does not decode. Decoding never reads past the
/// end of the buffer it was given.
#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("Not an annotation buffer")]
    BadMagic,

    #[error("Unsupported annotation format version {0}")]
    UnsupportedVersion(u8),

    #[error("Expected a {expected} payload but found kind {found}")]
    WrongKind { expected: PayloadKind, found: u8 },

    #[error("Failed to inflate annotation payload")]
    Inflate(#[from] flate2::DecompressError),

    #[error("Failed to write annotation payload")]
    Deflate(#[from] std::io::Error),

    #[error("Inflated annotation payload exceeds {0} bytes")]
    BodyTooLarge(u64),

    #[error("Annotation payload is truncated")]
    Truncated,

    #[error("Annotation payload has {0} unexpected trailing bytes")]
    TrailingBytes(usize),

    #[error("Varint does not fit in {0} bits")]
    Overflow(u32),

    #[error("Label run of length zero")]
    EmptyRun,

    #[error("Object point index {0} is out of range")]
    PointIndex(i64),

    #[error("Annotation declares {found} elements, more than the limit of {limit}")]
    TooLarge { limit: usize, found: usize },
}
