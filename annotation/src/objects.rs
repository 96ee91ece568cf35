use serde::{Deserialize, Serialize};

use crate::codec::{Annotation, BodyReader, PayloadKind, put_varint, unzigzag, zigzag};
use crate::error::{AnnotationError, Result};

/// One annotated object instance and the cloud points that belong to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: u32,
    pub class_index: u32,
    pub points: Vec<u32>,
}

/// Encoded as `count`, then per object `id`, `class_index`, `n` and `n`
/// zig-zag deltas between consecutive point indices.
impl Annotation for Vec<ObjectRecord> {
    const KIND: PayloadKind = PayloadKind::Objects;

    fn write_body(&self, out: &mut Vec<u8>) {
        put_varint(out, self.len() as u64);
        for object in self {
            put_varint(out, object.id as u64);
            put_varint(out, object.class_index as u64);
            put_varint(out, object.points.len() as u64);
            let mut prev = 0i64;
            for &point in &object.points {
                put_varint(out, zigzag(point as i64 - prev));
                prev = point as i64;
            }
        }
    }

    fn read_body(reader: &mut BodyReader<'_>) -> Result<Self> {
        let count = reader.count(3)?;
        let mut objects = Vec::with_capacity(count);
        let mut total = 0usize;

        for _ in 0..count {
            let id = reader.u32()?;
            let class_index = reader.u32()?;
            let n = reader.count(1)?;
            total = total.saturating_add(n);
            reader.check_elements(total)?;

            let mut points = Vec::with_capacity(n);
            let mut prev = 0i64;
            for _ in 0..n {
                let point = prev.saturating_add(unzigzag(reader.varint()?));
                let point = u32::try_from(point).map_err(|_| AnnotationError::PointIndex(point))?;
                points.push(point);
                prev = point as i64;
            }
            objects.push(ObjectRecord {
                id,
                class_index,
                points,
            });
        }
        Ok(objects)
    }
}
