use std::collections::BTreeMap;
use std::path::Path;

use annotation::{AnnotationError, LabelSequence, ObjectRecord};
use anyhow::Context;
use serde::Serialize;

#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Summary {
    Labels {
        points: usize,
        /// Label id to number of points carrying it.
        histogram: BTreeMap<u32, usize>,
    },
    Objects {
        objects: usize,
        sizes: Vec<ObjectSize>,
    },
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ObjectSize {
    pub id: u32,
    pub class_index: u32,
    pub points: usize,
}

pub async fn inspect(path: &Path) -> anyhow::Result<Summary> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    summarize(&bytes).with_context(|| format!("Failed to decode {}", path.display()))
}

/// Decodes whichever payload kind the buffer declares.
fn summarize(bytes: &[u8]) -> Result<Summary, AnnotationError> {
    match annotation::decode::<LabelSequence>(bytes) {
        Ok(labels) => Ok(label_summary(&labels)),
        Err(AnnotationError::WrongKind { .. }) => {
            let objects = annotation::decode::<Vec<ObjectRecord>>(bytes)?;
            Ok(object_summary(&objects))
        }
        Err(err) => Err(err),
    }
}

fn label_summary(labels: &LabelSequence) -> Summary {
    let mut histogram = BTreeMap::new();
    for (label, run) in labels.runs() {
        *histogram.entry(label).or_insert(0) += run;
    }
    Summary::Labels {
        points: labels.len(),
        histogram,
    }
}

fn object_summary(objects: &[ObjectRecord]) -> Summary {
    Summary::Objects {
        objects: objects.len(),
        sizes: objects
            .iter()
            .map(|o| ObjectSize {
                id: o.id,
                class_index: o.class_index,
                points: o.points.len(),
            })
            .collect(),
    }
}
