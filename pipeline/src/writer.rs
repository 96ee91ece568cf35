use std::fmt::Write;

use annotation::{InstanceIndex, LabelSequence};
use async_fn_stream::fn_stream;
use bytes::Bytes;
use futures::Stream;
use glam::Vec3;
use pcd::{PointCloud, Viewpoint};

use crate::config::ExportConfig;
use crate::error::{ExportError, Result};

/// Source axes to export axes: `(x, y, z) -> (x, -z, y)`.
pub fn to_display_axes(position: Vec3) -> Vec3 {
    Vec3::new(position.x, -position.z, position.y)
}

/// One exported point, already in export axes.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AnnotatedPoint {
    pub position: Vec3,
    pub reflectance: f32,
    pub label: u32,
    /// Owning object, as a position in the object list.
    pub instance: Option<usize>,
}

/// A cloud joined with labels of the same length and an instance index.
#[derive(Debug, Clone)]
pub struct AnnotatedCloud {
    cloud: PointCloud,
    labels: LabelSequence,
    instances: InstanceIndex,
}

impl AnnotatedCloud {
    pub fn new(cloud: PointCloud, labels: LabelSequence, instances: InstanceIndex) -> Result<Self> {
        if labels.len() != cloud.len() {
            return Err(ExportError::LengthMismatch {
                labels: labels.len(),
                points: cloud.len(),
            });
        }
        Ok(Self {
            cloud,
            labels,
            instances,
        })
    }

    pub fn len(&self) -> usize {
        self.cloud.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cloud.is_empty()
    }

    pub fn viewpoint(&self) -> &Viewpoint {
        self.cloud.viewpoint()
    }

    pub fn instances(&self) -> &InstanceIndex {
        &self.instances
    }

    /// Points in source order.
    pub fn points(&self) -> impl Iterator<Item = AnnotatedPoint> + '_ {
        self.cloud
            .positions
            .iter()
            .zip(&self.cloud.reflectance)
            .zip(self.labels.iter())
            .enumerate()
            .map(|(i, ((&position, &reflectance), &label))| AnnotatedPoint {
                position: to_display_axes(position),
                reflectance,
                label,
                instance: self.instances.instance_of(i),
            })
    }
}

/// Serialises an [`AnnotatedCloud`] as an ascii PCD with
/// `x y z intensity label` fields.
pub struct ExportWriter {
    cloud: AnnotatedCloud,
    points_per_chunk: usize,
}

impl ExportWriter {
    pub fn new(cloud: AnnotatedCloud, config: &ExportConfig) -> Self {
        Self {
            cloud,
            points_per_chunk: config.points_per_chunk.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.cloud.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cloud.is_empty()
    }

    pub fn header(&self) -> String {
        let points = self.cloud.len();
        let viewpoint = self
            .cloud
            .viewpoint()
            .to_array()
            .map(|v| (v + 0.0).to_string())
            .join(" ");
        format!(
            "VERSION .7\n\
             FIELDS x y z intensity label\n\
             SIZE 4 4 4 4 4\n\
             TYPE F F F I I\n\
             COUNT 1 1 1 1 1\n\
             WIDTH {points}\n\
             HEIGHT 1\n\
             POINTS {points}\n\
             VIEWPOINT {viewpoint}\n\
             DATA ascii\n"
        )
    }

    /// The header, then point lines in batches of `points_per_chunk`.
    pub fn into_chunks(self) -> impl Stream<Item = Bytes> {
        fn_stream(|emitter| async move {
            emitter.emit(Bytes::from(self.header())).await;

            let mut batch = String::new();
            let mut pending = 0;
            for point in self.cloud.points() {
                write_point(&mut batch, &point);
                pending += 1;
                if pending == self.points_per_chunk {
                    emitter.emit(Bytes::from(std::mem::take(&mut batch))).await;
                    pending = 0;
                }
            }
            if pending > 0 {
                emitter.emit(Bytes::from(batch)).await;
            }
        })
    }
}

fn write_point(out: &mut String, point: &AnnotatedPoint) {
    // Adding zero turns -0 into 0.
    let Vec3 { x, y, z } = point.position + Vec3::ZERO;
    let _ = writeln!(
        out,
        "{} {} {} {} {}",
        x,
        y,
        z,
        point.reflectance + 0.0,
        point.label
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use annotation::ObjectRecord;
    use futures::StreamExt;

    fn cloud(text: &str) -> PointCloud {
        PointCloud::decode(text.as_bytes()).unwrap()
    }

    fn ascii_cloud(points: &[[f32; 4]]) -> PointCloud {
        let mut text = format!(
            "FIELDS x y z intensity\nPOINTS {}\nVIEWPOINT 0 0 0 1 0 0 0\nDATA ascii\n",
            points.len()
        );
        for [x, y, z, i] in points {
            text += &format!("{x} {y} {z} {i}\n");
        }
        cloud(&text)
    }

    async fn render(writer: ExportWriter) -> Vec<Bytes> {
        writer.into_chunks().collect().await
    }

    fn concat(chunks: &[Bytes]) -> String {
        chunks.iter().map(|c| std::str::from_utf8(c).unwrap()).collect()
    }

    #[tokio::test]
    async fn single_point_scenario() {
        let annotated = AnnotatedCloud::new(
            ascii_cloud(&[[1.0, 2.0, 3.0, 0.5]]),
            LabelSequence::new(vec![7]),
            InstanceIndex::empty(),
        )
        .unwrap();
        let output = concat(&render(ExportWriter::new(annotated, &ExportConfig::default())).await);
        assert_eq!(
            output,
            "VERSION .7\nFIELDS x y z intensity label\nSIZE 4 4 4 4 4\nTYPE F F F I I\n\
             COUNT 1 1 1 1 1\nWIDTH 1\nHEIGHT 1\nPOINTS 1\nVIEWPOINT 0 0 0 1 0 0 0\n\
             DATA ascii\n1 -3 2 0.5 7\n"
        );
    }

    #[tokio::test]
    async fn emits_one_line_per_point_in_order() {
        let points: Vec<[f32; 4]> = (0..10).map(|i| [i as f32, 0.25, -1.5, 1.0]).collect();
        let labels: Vec<u32> = (0..10).rev().collect();
        let annotated =
            AnnotatedCloud::new(ascii_cloud(&points), LabelSequence::new(labels.clone()), InstanceIndex::empty()).unwrap();
        let output = concat(&render(ExportWriter::new(annotated, &ExportConfig::default())).await);

        let lines: Vec<&str> = output.lines().skip(10).collect();
        assert_eq!(lines.len(), 10);
        for (i, line) in lines.iter().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            assert_eq!(fields.len(), 5);
            assert_eq!(fields[0], i.to_string());
            assert_eq!(fields[4], labels[i].to_string());
        }
    }

    #[test]
    fn points_follow_the_axis_convention() {
        let source = [[0.5, -2.0, 7.25, 3.0], [-1.0, 0.0, -0.125, 9.0], [3.0, 4.0, 0.0, 0.0]];
        let annotated =
            AnnotatedCloud::new(ascii_cloud(&source), LabelSequence::new(vec![1, 2, 3]), InstanceIndex::empty()).unwrap();
        for (point, [x, y, z, i]) in annotated.points().zip(source) {
            assert_eq!(point.position.x, x);
            assert_eq!(point.position.y, -z);
            assert_eq!(point.position.z, y);
            assert_eq!(point.reflectance, i);
        }
    }

    #[tokio::test]
    async fn negative_zero_is_written_as_zero() {
        let annotated =
            AnnotatedCloud::new(ascii_cloud(&[[-0.0, 0.0, 0.0, 0.0]]), LabelSequence::new(vec![0]), InstanceIndex::empty())
                .unwrap();
        let output = concat(&render(ExportWriter::new(annotated, &ExportConfig::default())).await);
        assert!(output.ends_with("DATA ascii\n0 0 0 0 0\n"), "{output}");
    }

    #[tokio::test]
    async fn batches_points_into_chunks() {
        let points = vec![[1.0, 1.0, 1.0, 1.0]; 5];
        let annotated =
            AnnotatedCloud::new(ascii_cloud(&points), LabelSequence::new(vec![0; 5]), InstanceIndex::empty()).unwrap();
        let config = ExportConfig::default().with_points_per_chunk(2);
        let chunks = render(ExportWriter::new(annotated, &config)).await;

        assert_eq!(chunks.len(), 4);
        assert!(chunks[0].starts_with(b"VERSION"));
        let per_chunk: Vec<usize> = chunks[1..].iter().map(|c| c.iter().filter(|&&b| b == b'\n').count()).collect();
        assert_eq!(per_chunk, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn empty_cloud_writes_only_the_header() {
        let annotated = AnnotatedCloud::new(ascii_cloud(&[]), LabelSequence::new(Vec::new()), InstanceIndex::empty()).unwrap();
        let chunks = render(ExportWriter::new(annotated, &ExportConfig::default())).await;
        assert_eq!(chunks.len(), 1);
        assert!(concat(&chunks).contains("WIDTH 0\nHEIGHT 1\nPOINTS 0\n"));
    }

    #[test]
    fn label_count_must_match_point_count() {
        let err = AnnotatedCloud::new(ascii_cloud(&[[0.0; 4]; 3]), LabelSequence::new(vec![1, 2]), InstanceIndex::empty())
            .unwrap_err();
        assert!(matches!(err, ExportError::LengthMismatch { labels: 2, points: 3 }));
    }

    #[test]
    fn points_carry_their_instance() {
        let objects = [ObjectRecord {
            id: 12,
            class_index: 1,
            points: vec![1],
        }];
        let cloud = ascii_cloud(&[[0.0; 4]; 2]);
        let instances = InstanceIndex::build(&objects, cloud.len());
        let annotated = AnnotatedCloud::new(cloud, LabelSequence::new(vec![0, 1]), instances).unwrap();
        let owners: Vec<Option<usize>> = annotated.points().map(|p| p.instance).collect();
        assert_eq!(owners, vec![None, Some(0)]);
    }

    #[test]
    fn header_carries_the_viewpoint() {
        let cloud = cloud("FIELDS x y z\nPOINTS 0\nVIEWPOINT 1.5 -2 0 0.5 0.5 0.5 0.5\nDATA ascii\n");
        let annotated = AnnotatedCloud::new(cloud, LabelSequence::new(Vec::new()), InstanceIndex::empty()).unwrap();
        let header = ExportWriter::new(annotated, &ExportConfig::default()).header();
        assert!(header.contains("VIEWPOINT 1.5 -2 0 0.5 0.5 0.5 0.5\n"), "{header}");
    }

    #[test]
    fn georeferenced_viewpoint_keeps_its_digits() {
        let cloud = cloud("FIELDS x y z\nPOINTS 0\nVIEWPOINT 4512345.67 5412345.21 12.5 1 0 0 0\nDATA ascii\n");
        let annotated = AnnotatedCloud::new(cloud, LabelSequence::new(Vec::new()), InstanceIndex::empty()).unwrap();
        let header = ExportWriter::new(annotated, &ExportConfig::default()).header();
        assert!(header.contains("VIEWPOINT 4512345.67 5412345.21 12.5 1 0 0 0\n"), "{header}");
    }
}
