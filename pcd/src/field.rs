use crate::error::{PcdError, Result};

/// Numeric class of a PCD field, the `TYPE` column of the header.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FieldKind {
    Float,
    Signed,
    Unsigned,
}

impl FieldKind {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "F" | "f" => Some(FieldKind::Float),
            "I" | "i" => Some(FieldKind::Signed),
            "U" | "u" => Some(FieldKind::Unsigned),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            FieldKind::Float => 'F',
            FieldKind::Signed => 'I',
            FieldKind::Unsigned => 'U',
        }
    }
}

/// One declared field: its name, element width in bytes, numeric class,
/// element count, and position inside one point record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub size: usize,
    pub kind: FieldKind,
    pub count: usize,
    /// Byte offset inside a packed binary record.
    pub offset: usize,
    /// Index of the first element among the values of an ascii record.
    pub column: usize,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, size: usize, kind: FieldKind, count: usize) -> Result<Self> {
        let supported = match kind {
            FieldKind::Float => matches!(size, 4 | 8),
            FieldKind::Signed | FieldKind::Unsigned => matches!(size, 1 | 2 | 4 | 8),
        };
        if !supported {
            return Err(PcdError::UnsupportedFieldType {
                kind: kind.code(),
                size,
            });
        }
        Ok(Self {
            name: name.into(),
            size,
            kind,
            count,
            offset: 0,
            column: 0,
        })
    }

    /// Bytes taken by all elements of this field in one point.
    pub fn width(&self) -> usize {
        self.size * self.count
    }

    /// Decodes one little-endian element. `bytes` must be exactly `size` long.
    pub(crate) fn read(&self, bytes: &[u8]) -> f64 {
        match (self.kind, bytes) {
            (FieldKind::Float, &[a, b, c, d]) => f32::from_le_bytes([a, b, c, d]) as f64,
            (FieldKind::Float, &[a, b, c, d, e, f, g, h]) => {
                f64::from_le_bytes([a, b, c, d, e, f, g, h])
            }
            (FieldKind::Signed, &[a]) => i8::from_le_bytes([a]) as f64,
            (FieldKind::Signed, &[a, b]) => i16::from_le_bytes([a, b]) as f64,
            (FieldKind::Signed, &[a, b, c, d]) => i32::from_le_bytes([a, b, c, d]) as f64,
            (FieldKind::Signed, &[a, b, c, d, e, f, g, h]) => {
                i64::from_le_bytes([a, b, c, d, e, f, g, h]) as f64
            }
            (FieldKind::Unsigned, &[a]) => a as f64,
            (FieldKind::Unsigned, &[a, b]) => u16::from_le_bytes([a, b]) as f64,
            (FieldKind::Unsigned, &[a, b, c, d]) => u32::from_le_bytes([a, b, c, d]) as f64,
            (FieldKind::Unsigned, &[a, b, c, d, e, f, g, h]) => {
                u64::from_le_bytes([a, b, c, d, e, f, g, h]) as f64
            }
            // Field widths are validated in `FieldDef::new`.
            _ => f64::NAN,
        }
    }
}
