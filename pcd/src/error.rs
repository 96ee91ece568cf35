use thiserror::Error;

pub type Result<T> = std::result::Result<T, PcdError>;

/// A point-cloud file that could not be decoded. Decoding never yields a
/// partially populated cloud alongside one of these.
#[derive(Debug, Error, PartialEq)]
pub enum PcdError {
    #[error("PCD header ended before a DATA line")]
    UnterminatedHeader,

    #[error("PCD header is missing the {0} entry")]
    MissingEntry(&'static str),

    #[error("Invalid value for {key} in PCD header: {value:?}")]
    InvalidEntry { key: &'static str, value: String },

    #[error("PCD header line {line} is not valid UTF-8")]
    NotUtf8 { line: usize },

    #[error("PCD header declares {fields} fields but {key} has {found} entries")]
    FieldArity {
        key: &'static str,
        fields: usize,
        found: usize,
    },

    #[error("Unsupported field type {kind}{size}")]
    UnsupportedFieldType { kind: char, size: usize },

    #[error("Unsupported DATA encoding {0:?}")]
    UnsupportedEncoding(String),

    #[error("Point cloud has no {0} field")]
    MissingField(&'static str),

    #[error("Expected {expected} points but payload holds {found}")]
    PointCountMismatch { expected: usize, found: usize },

    #[error("Expected {expected} payload bytes but found {found}")]
    PayloadLength { expected: usize, found: usize },

    #[error("Point {point} has {found} values, expected {expected}")]
    ShortRecord {
        point: usize,
        expected: usize,
        found: usize,
    },

    #[error("Ascii payload is not valid UTF-8")]
    AsciiNotUtf8,

    #[error("Point {point} has an unparsable value {token:?}")]
    InvalidNumber { point: usize, token: String },

    #[error("Corrupt LZF stream: {0}")]
    Lzf(&'static str),
}
