use glam::Vec3;

use crate::error::{PcdError, Result};
use crate::field::FieldDef;
use crate::header::PcdHeader;
use crate::lzf;

/// Field names accepted for the reflectance column, in priority order.
const REFLECTANCE_FIELDS: [&str; 3] = ["intensity", "reflectance", "i"];

/// The fields the decoder pulls out of every point record.
struct Selection<'h> {
    x: &'h FieldDef,
    y: &'h FieldDef,
    z: &'h FieldDef,
    reflectance: Option<&'h FieldDef>,
    label: Option<&'h FieldDef>,
}

/// Columns collected while walking the payload.
pub(crate) struct Columns {
    pub positions: Vec<Vec3>,
    pub reflectance: Vec<f32>,
    pub labels: Option<Vec<u32>>,
}

impl<'h> Selection<'h> {
    fn new(header: &'h PcdHeader) -> Result<Self> {
        Ok(Self {
            x: header.field("x").ok_or(PcdError::MissingField("x"))?,
            y: header.field("y").ok_or(PcdError::MissingField("y"))?,
            z: header.field("z").ok_or(PcdError::MissingField("z"))?,
            reflectance: REFLECTANCE_FIELDS.iter().find_map(|name| header.field(name)),
            label: header.field("label"),
        })
    }

    /// `capacity` must be bounded by the payload, never by the header.
    fn columns(&self, capacity: usize) -> Columns {
        Columns {
            positions: Vec::with_capacity(capacity),
            reflectance: Vec::with_capacity(capacity),
            labels: self.label.map(|_| Vec::with_capacity(capacity)),
        }
    }

    /// Reads the first element of each selected field through `value`.
    fn push<F>(&self, columns: &mut Columns, mut value: F) -> Result<()>
    where
        F: FnMut(&FieldDef) -> Result<f64>,
    {
        let position = Vec3::new(
            value(self.x)? as f32,
            value(self.y)? as f32,
            value(self.z)? as f32,
        );
        let reflectance = match self.reflectance {
            Some(field) => value(field)? as f32,
            None => 0.0,
        };
        if let (Some(field), Some(labels)) = (self.label, columns.labels.as_mut()) {
            labels.push(value(field)? as u32);
        }
        columns.positions.push(position);
        columns.reflectance.push(reflectance);
        Ok(())
    }
}

/// Bytes `header.points` packed records take. A count whose size does not
/// fit in `usize` cannot match any payload of `found` bytes.
fn packed_length(header: &PcdHeader, found: usize) -> Result<usize> {
    header
        .points
        .checked_mul(header.point_stride())
        .ok_or(PcdError::PayloadLength {
            expected: usize::MAX,
            found,
        })
}

pub(crate) fn read_ascii(header: &PcdHeader, payload: &[u8]) -> Result<Columns> {
    let selection = Selection::new(header)?;
    let text = std::str::from_utf8(payload).map_err(|_| PcdError::AsciiNotUtf8)?;
    let expected = header.values_per_point();
    // Every ascii record takes at least two bytes per value.
    let capacity = header.points.min(payload.len() / (2 * expected).max(1));
    let mut columns = selection.columns(capacity);
    let mut found = 0;

    let records = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));
    for (point, line) in records.enumerate() {
        found += 1;
        if point >= header.points {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < expected {
            return Err(PcdError::ShortRecord {
                point,
                expected,
                found: tokens.len(),
            });
        }
        selection.push(&mut columns, |field| {
            let token = tokens[field.column];
            token.parse::<f64>().map_err(|_| PcdError::InvalidNumber {
                point,
                token: token.to_string(),
            })
        })?;
    }

    if found != header.points {
        return Err(PcdError::PointCountMismatch {
            expected: header.points,
            found,
        });
    }
    Ok(columns)
}

pub(crate) fn read_binary(header: &PcdHeader, payload: &[u8]) -> Result<Columns> {
    let selection = Selection::new(header)?;
    let stride = header.point_stride();
    let expected = packed_length(header, payload.len())?;
    if payload.len() != expected {
        return Err(PcdError::PayloadLength {
            expected,
            found: payload.len(),
        });
    }

    let mut columns = selection.columns(header.points);
    for record in payload.chunks_exact(stride) {
        selection.push(&mut columns, |field| {
            Ok(field.read(&record[field.offset..field.offset + field.size]))
        })?;
    }
    Ok(columns)
}

pub(crate) fn read_binary_compressed(header: &PcdHeader, payload: &[u8]) -> Result<Columns> {
    let selection = Selection::new(header)?;
    let (sizes, rest) = payload.split_at_checked(8).ok_or(PcdError::PayloadLength {
        expected: 8,
        found: payload.len(),
    })?;
    let compressed = u32::from_le_bytes([sizes[0], sizes[1], sizes[2], sizes[3]]) as usize;
    let uncompressed = u32::from_le_bytes([sizes[4], sizes[5], sizes[6], sizes[7]]) as usize;

    let expected = packed_length(header, uncompressed)?;
    if uncompressed != expected {
        return Err(PcdError::PayloadLength {
            expected,
            found: uncompressed,
        });
    }
    let stream = rest.get(..compressed).ok_or(PcdError::PayloadLength {
        expected: 8 + compressed,
        found: payload.len(),
    })?;
    let data = lzf::decompress(stream, uncompressed)?;

    // Decompressed data holds one contiguous block per field.
    let points = header.points;
    let mut columns = selection.columns(points);
    for point in 0..points {
        selection.push(&mut columns, |field| {
            let start = points * field.offset + point * field.width();
            Ok(field.read(&data[start..start + field.size]))
        })?;
    }
    Ok(columns)
}
