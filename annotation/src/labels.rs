use std::ops::Deref;

use crate::codec::{Annotation, BodyReader, PayloadKind, put_varint};
use crate::error::{AnnotationError, Result};

/// Per-point class label ids, index-aligned with a point cloud.
///
/// Encoded as run-length pairs: `runs`, then `runs` times `(label, length)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSequence(Vec<u32>);

impl LabelSequence {
    pub fn new(labels: Vec<u32>) -> Self {
        Self(labels)
    }

    pub fn into_inner(self) -> Vec<u32> {
        self.0
    }

    /// Iterates `(label, run length)` pairs.
    pub fn runs(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.0.chunk_by(|a, b| a == b).map(|run| (run[0], run.len()))
    }
}

impl Deref for LabelSequence {
    type Target = [u32];

    fn deref(&self) -> &[u32] {
        &self.0
    }
}

impl From<Vec<u32>> for LabelSequence {
    fn from(labels: Vec<u32>) -> Self {
        Self(labels)
    }
}

impl Annotation for LabelSequence {
    const KIND: PayloadKind = PayloadKind::Labels;

    fn write_body(&self, out: &mut Vec<u8>) {
        put_varint(out, self.runs().count() as u64);
        for (label, len) in self.runs() {
            put_varint(out, label as u64);
            put_varint(out, len as u64);
        }
    }

    fn read_body(reader: &mut BodyReader<'_>) -> Result<Self> {
        let runs = reader.count(2)?;
        let mut labels = Vec::new();
        for _ in 0..runs {
            let label = reader.u32()?;
            let len = usize::try_from(reader.varint()?).unwrap_or(usize::MAX);
            if len == 0 {
                return Err(AnnotationError::EmptyRun);
            }
            reader.check_elements(labels.len().saturating_add(len))?;
            labels.extend(std::iter::repeat_n(label, len));
        }
        Ok(Self(labels))
    }
}
