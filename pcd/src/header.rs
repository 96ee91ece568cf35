use glam::{DQuat, DVec3};
use tracing::warn;

use crate::error::{PcdError, Result};
use crate::field::{FieldDef, FieldKind};

/// Payload encoding declared by the `DATA` entry.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DataEncoding {
    Ascii,
    Binary,
    BinaryCompressed,
}

impl DataEncoding {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "ascii" => Ok(DataEncoding::Ascii),
            "binary" => Ok(DataEncoding::Binary),
            "binary_compressed" => Ok(DataEncoding::BinaryCompressed),
            other => Err(PcdError::UnsupportedEncoding(other.to_string())),
        }
    }
}

/// Sensor pose at capture time. Double precision, as georeferenced
/// translations do not fit in an `f32`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewpoint {
    pub translation: DVec3,
    pub rotation: DQuat,
}

impl Viewpoint {
    /// Values in header order: `tx ty tz qw qx qy qz`.
    pub fn to_array(&self) -> [f64; 7] {
        let t = self.translation;
        let q = self.rotation;
        [t.x, t.y, t.z, q.w, q.x, q.y, q.z]
    }

    pub fn from_array([tx, ty, tz, qw, qx, qy, qz]: [f64; 7]) -> Self {
        Self {
            translation: DVec3::new(tx, ty, tz),
            // Kept as written, a header may carry a non-unit quaternion.
            rotation: DQuat::from_xyzw(qx, qy, qz, qw),
        }
    }
}

impl Default for Viewpoint {
    fn default() -> Self {
        Self {
            translation: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PcdHeader {
    pub version: Option<String>,
    pub fields: Vec<FieldDef>,
    pub width: usize,
    pub height: usize,
    pub points: usize,
    pub viewpoint: Viewpoint,
    pub encoding: DataEncoding,
    /// Header entries this decoder does not interpret, in file order.
    pub extra: Vec<(String, String)>,
}

impl PcdHeader {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Bytes per packed point record.
    pub fn point_stride(&self) -> usize {
        self.fields.iter().map(FieldDef::width).sum()
    }

    /// Values per ascii point record.
    pub fn values_per_point(&self) -> usize {
        self.fields.iter().map(|f| f.count).sum()
    }
}

#[derive(Default)]
struct RawHeader<'a> {
    version: Option<&'a str>,
    fields: Option<&'a str>,
    size: Option<&'a str>,
    kind: Option<&'a str>,
    count: Option<&'a str>,
    width: Option<&'a str>,
    height: Option<&'a str>,
    viewpoint: Option<&'a str>,
    points: Option<&'a str>,
    data: Option<&'a str>,
    extra: Vec<(String, String)>,
}

/// Splits `bytes` into a parsed header and the offset where the payload starts.
pub(crate) fn parse(bytes: &[u8]) -> Result<(PcdHeader, usize)> {
    let mut raw = RawHeader::default();
    let mut pos = 0;
    let mut line_no = 0;

    while raw.data.is_none() {
        if pos >= bytes.len() {
            return Err(PcdError::UnterminatedHeader);
        }
        let (line, next) = match bytes[pos..].iter().position(|&b| b == b'\n') {
            Some(len) => (&bytes[pos..pos + len], pos + len + 1),
            None => (&bytes[pos..], bytes.len()),
        };
        line_no += 1;
        pos = next;

        let line = std::str::from_utf8(line)
            .map_err(|_| PcdError::NotUtf8 { line: line_no })?
            .trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = match line.split_once(char::is_whitespace) {
            Some((key, value)) => (key, value.trim()),
            None => (line, ""),
        };
        match key {
            "VERSION" => raw.version = Some(value),
            "FIELDS" => raw.fields = Some(value),
            "SIZE" => raw.size = Some(value),
            "TYPE" => raw.kind = Some(value),
            "COUNT" => raw.count = Some(value),
            "WIDTH" => raw.width = Some(value),
            "HEIGHT" => raw.height = Some(value),
            "VIEWPOINT" => raw.viewpoint = Some(value),
            "POINTS" => raw.points = Some(value),
            "DATA" => raw.data = Some(value),
            other => raw.extra.push((other.to_string(), value.to_string())),
        }
    }

    Ok((raw.build()?, pos))
}

impl RawHeader<'_> {
    fn build(self) -> Result<PcdHeader> {
        let encoding = DataEncoding::parse(self.data.ok_or(PcdError::MissingEntry("DATA"))?)?;

        let names: Vec<&str> = self
            .fields
            .ok_or(PcdError::MissingEntry("FIELDS"))?
            .split_whitespace()
            .collect();
        if names.is_empty() {
            return Err(invalid("FIELDS", ""));
        }

        let packed = encoding != DataEncoding::Ascii;
        let sizes: Vec<usize> = match self.size {
            Some(value) => parse_list("SIZE", value, |s| s.parse::<usize>().ok())?,
            None if packed => return Err(PcdError::MissingEntry("SIZE")),
            None => vec![4; names.len()],
        };
        let kinds: Vec<FieldKind> = match self.kind {
            Some(value) => parse_list("TYPE", value, FieldKind::from_code)?,
            None if packed => return Err(PcdError::MissingEntry("TYPE")),
            None => vec![FieldKind::Float; names.len()],
        };
        let counts: Vec<usize> = match self.count {
            Some(value) => parse_list("COUNT", value, |s| s.parse::<usize>().ok().filter(|&c| c > 0))?,
            None => vec![1; names.len()],
        };
        for (key, found) in [("SIZE", sizes.len()), ("TYPE", kinds.len()), ("COUNT", counts.len())] {
            if found != names.len() {
                return Err(PcdError::FieldArity {
                    key,
                    fields: names.len(),
                    found,
                });
            }
        }

        let mut fields = Vec::with_capacity(names.len());
        let (mut offset, mut column) = (0, 0);
        for (((name, size), kind), count) in names.into_iter().zip(sizes).zip(kinds).zip(counts) {
            let mut field = FieldDef::new(name, size, kind, count)?;
            field.offset = offset;
            field.column = column;
            offset += field.width();
            column += field.count;
            fields.push(field);
        }

        let points = parse_scalar("POINTS", self.points.ok_or(PcdError::MissingEntry("POINTS"))?)?;
        let width = self.width.map(|w| parse_scalar("WIDTH", w)).transpose()?.unwrap_or(points);
        let height = self.height.map(|h| parse_scalar("HEIGHT", h)).transpose()?.unwrap_or(1);
        if width.checked_mul(height) != Some(points) {
            warn!(width, height, points, "PCD WIDTH x HEIGHT disagrees with POINTS, using POINTS");
        }

        let viewpoint = match self.viewpoint {
            Some(value) => {
                let values: Vec<f64> = parse_list("VIEWPOINT", value, |s| s.parse::<f64>().ok())?;
                let values: [f64; 7] = values.try_into().map_err(|_| invalid("VIEWPOINT", value))?;
                Viewpoint::from_array(values)
            }
            None => Viewpoint::default(),
        };

        Ok(PcdHeader {
            version: self.version.map(str::to_string),
            fields,
            width,
            height,
            points,
            viewpoint,
            encoding,
            extra: self.extra,
        })
    }
}

fn invalid(key: &'static str, value: &str) -> PcdError {
    PcdError::InvalidEntry {
        key,
        value: value.to_string(),
    }
}

fn parse_scalar(key: &'static str, value: &str) -> Result<usize> {
    value.parse().map_err(|_| invalid(key, value))
}

fn parse_list<T>(key: &'static str, value: &str, parse: impl Fn(&str) -> Option<T>) -> Result<Vec<T>> {
    value
        .split_whitespace()
        .map(|token| parse(token).ok_or_else(|| invalid(key, value)))
        .collect()
}
