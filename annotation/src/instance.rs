use std::collections::HashMap;

use crate::objects::ObjectRecord;

/// Point index to the position of its owning record in an object list.
///
/// When several records claim the same point the later record wins.
/// Indices at or past the cloud's point count are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceIndex {
    owners: HashMap<u32, usize>,
    collisions: usize,
    skipped: usize,
}

impl InstanceIndex {
    /// An index where no point belongs to any object.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn build(objects: &[ObjectRecord], point_count: usize) -> Self {
        let mut index = Self::default();
        for (instance, object) in objects.iter().enumerate() {
            for &point in &object.points {
                if point as usize >= point_count {
                    index.skipped += 1;
                    continue;
                }
                match index.owners.insert(point, instance) {
                    Some(previous) if previous != instance => index.collisions += 1,
                    _ => {}
                }
            }
        }
        index
    }

    /// Position in the source object list of the record owning `point`.
    pub fn instance_of(&self, point: usize) -> Option<usize> {
        let point = u32::try_from(point).ok()?;
        self.owners.get(&point).copied()
    }

    /// Number of points owned by some object.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Points claimed by more than one record.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Object entries pointing past the end of the cloud.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
