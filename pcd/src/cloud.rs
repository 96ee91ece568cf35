use glam::Vec3;
use tracing::debug;

use crate::error::Result;
use crate::header::{self, DataEncoding, PcdHeader, Viewpoint};
use crate::payload;

/// A decoded point cloud. `positions` and `reflectance` always have
/// `header.points` entries, as does `labels` when the file carries a
/// `label` field.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub header: PcdHeader,
    pub positions: Vec<Vec3>,
    pub reflectance: Vec<f32>,
    pub labels: Option<Vec<u32>>,
}

impl PointCloud {
    /// Decodes a complete PCD file.
    #[tracing::instrument(skip_all, fields(bytes = bytes.len()))]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (header, offset) = header::parse(bytes)?;
        let body = &bytes[offset..];

        let columns = match header.encoding {
            DataEncoding::Ascii => payload::read_ascii(&header, body)?,
            DataEncoding::Binary => payload::read_binary(&header, body)?,
            DataEncoding::BinaryCompressed => payload::read_binary_compressed(&header, body)?,
        };

        debug!(
            points = header.points,
            encoding = ?header.encoding,
            fields = header.fields.len(),
            "Decoded point cloud"
        );
        Ok(Self {
            header,
            positions: columns.positions,
            reflectance: columns.reflectance,
            labels: columns.labels,
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn viewpoint(&self) -> &Viewpoint {
        &self.header.viewpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PcdError;
    use crate::lzf::literal_stream;
    use glam::{DQuat, DVec3};

    fn binary_header(encoding: &str, points: usize) -> String {
        format!(
            "VERSION .7\nFIELDS x y z intensity\nSIZE 4 4 8 1\nTYPE F F F U\nCOUNT 1 1 1 1\n\
             WIDTH {points}\nHEIGHT 1\nVIEWPOINT 0 0 0 1 0 0 0\nPOINTS {points}\nDATA {encoding}\n"
        )
    }

    fn packed_record(x: f32, y: f32, z: f64, intensity: u8) -> Vec<u8> {
        let mut record = Vec::new();
        record.extend_from_slice(&x.to_le_bytes());
        record.extend_from_slice(&y.to_le_bytes());
        record.extend_from_slice(&z.to_le_bytes());
        record.push(intensity);
        record
    }

    #[test]
    fn decodes_ascii_cloud() {
        let text = "VERSION .7\nFIELDS x y z intensity\nSIZE 4 4 4 4\nTYPE F F F F\nCOUNT 1 1 1 1\n\
                    WIDTH 2\nHEIGHT 1\nVIEWPOINT 1 2 3 0.5 0.5 0.5 0.5\nPOINTS 2\nDATA ascii\n\
                    1 2 3 0.5\n-4.25 5 6e1 12\n";
        let cloud = PointCloud::decode(text.as_bytes()).unwrap();

        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.positions, vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(-4.25, 5.0, 60.0)]);
        assert_eq!(cloud.reflectance, vec![0.5, 12.0]);
        assert_eq!(cloud.labels, None);
        assert_eq!(cloud.viewpoint().translation, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(cloud.viewpoint().rotation, DQuat::from_xyzw(0.5, 0.5, 0.5, 0.5));
    }

    #[test]
    fn ascii_respects_field_order_and_counts() {
        let text = "FIELDS rgb normal x y z label\nCOUNT 1 3 1 1 1 1\nPOINTS 1\nDATA ascii\n\
                    0 9 9 9 1 2 3 7\n";
        let cloud = PointCloud::decode(text.as_bytes()).unwrap();
        assert_eq!(cloud.positions, vec![Vec3::new(1.0, 2.0, 3.0)]);
        assert_eq!(cloud.reflectance, vec![0.0]);
        assert_eq!(cloud.labels, Some(vec![7]));
    }

    #[test]
    fn ascii_point_count_must_match() {
        let text = "FIELDS x y z\nPOINTS 3\nDATA ascii\n1 2 3\n4 5 6\n";
        assert_eq!(
            PointCloud::decode(text.as_bytes()).unwrap_err(),
            PcdError::PointCountMismatch { expected: 3, found: 2 }
        );

        let text = "FIELDS x y z\nPOINTS 1\nDATA ascii\n1 2 3\n4 5 6\n";
        assert_eq!(
            PointCloud::decode(text.as_bytes()).unwrap_err(),
            PcdError::PointCountMismatch { expected: 1, found: 2 }
        );
    }

    #[test]
    fn ascii_rejects_garbage_values() {
        let text = "FIELDS x y z\nPOINTS 1\nDATA ascii\n1 two 3\n";
        assert_eq!(
            PointCloud::decode(text.as_bytes()).unwrap_err(),
            PcdError::InvalidNumber { point: 0, token: "two".to_string() }
        );

        let text = "FIELDS x y z\nPOINTS 1\nDATA ascii\n1 2\n";
        assert_eq!(
            PointCloud::decode(text.as_bytes()).unwrap_err(),
            PcdError::ShortRecord { point: 0, expected: 3, found: 2 }
        );
    }

    #[test]
    fn missing_coordinate_field_is_an_error() {
        let text = "FIELDS x y intensity\nPOINTS 0\nDATA ascii\n";
        assert_eq!(PointCloud::decode(text.as_bytes()).unwrap_err(), PcdError::MissingField("z"));
    }

    #[test]
    fn decodes_binary_cloud_with_mixed_types() {
        let mut bytes = binary_header("binary", 2).into_bytes();
        bytes.extend(packed_record(1.0, 2.0, 3.0, 10));
        bytes.extend(packed_record(-1.0, 0.5, -8.0, 255));

        let cloud = PointCloud::decode(&bytes).unwrap();
        assert_eq!(cloud.positions, vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 0.5, -8.0)]);
        assert_eq!(cloud.reflectance, vec![10.0, 255.0]);
    }

    #[test]
    fn binary_payload_length_must_match() {
        let mut bytes = binary_header("binary", 2).into_bytes();
        bytes.extend(packed_record(1.0, 2.0, 3.0, 10));

        assert_eq!(
            PointCloud::decode(&bytes).unwrap_err(),
            PcdError::PayloadLength { expected: 34, found: 17 }
        );
    }

    #[test]
    fn decodes_binary_compressed_cloud() {
        // Field-major layout: all x, then all y, all z, all intensity.
        let mut soa = Vec::new();
        soa.extend(1.0f32.to_le_bytes());
        soa.extend(4.0f32.to_le_bytes());
        soa.extend(2.0f32.to_le_bytes());
        soa.extend(5.0f32.to_le_bytes());
        soa.extend(3.0f64.to_le_bytes());
        soa.extend(6.0f64.to_le_bytes());
        soa.extend([7u8, 8u8]);
        let stream = literal_stream(&soa);

        let mut bytes = binary_header("binary_compressed", 2).into_bytes();
        bytes.extend((stream.len() as u32).to_le_bytes());
        bytes.extend((soa.len() as u32).to_le_bytes());
        bytes.extend(&stream);

        let cloud = PointCloud::decode(&bytes).unwrap();
        assert_eq!(cloud.positions, vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0)]);
        assert_eq!(cloud.reflectance, vec![7.0, 8.0]);
    }

    #[test]
    fn compressed_size_must_match_header() {
        let mut bytes = binary_header("binary_compressed", 2).into_bytes();
        bytes.extend(4u32.to_le_bytes());
        bytes.extend(10u32.to_le_bytes());
        bytes.extend([3, 0, 0, 0]);

        assert_eq!(
            PointCloud::decode(&bytes).unwrap_err(),
            PcdError::PayloadLength { expected: 34, found: 10 }
        );
    }

    #[test]
    fn huge_declared_point_count_is_an_error() {
        let text = "FIELDS x y z\nPOINTS 4000000000000000000\nDATA ascii\n1 2 3\n";
        assert_eq!(
            PointCloud::decode(text.as_bytes()).unwrap_err(),
            PcdError::PointCountMismatch {
                expected: 4_000_000_000_000_000_000,
                found: 1
            }
        );

        let text = "FIELDS x y z\nPOINTS 100000000000\nDATA ascii\n1 2 3\n";
        assert!(matches!(
            PointCloud::decode(text.as_bytes()).unwrap_err(),
            PcdError::PointCountMismatch { found: 1, .. }
        ));
    }

    #[test]
    fn packed_size_overflow_is_an_error() {
        let mut bytes = binary_header("binary", usize::MAX / 4).into_bytes();
        bytes.extend(packed_record(1.0, 2.0, 3.0, 10));
        assert_eq!(
            PointCloud::decode(&bytes).unwrap_err(),
            PcdError::PayloadLength {
                expected: usize::MAX,
                found: 17
            }
        );

        let mut bytes = binary_header("binary_compressed", usize::MAX / 4).into_bytes();
        bytes.extend(4u32.to_le_bytes());
        bytes.extend(u32::MAX.to_le_bytes());
        bytes.extend([3, 0, 0, 0]);
        assert!(matches!(
            PointCloud::decode(&bytes).unwrap_err(),
            PcdError::PayloadLength {
                expected: usize::MAX,
                ..
            }
        ));
    }

    #[test]
    fn empty_cloud_decodes() {
        let text = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nPOINTS 0\nDATA binary\n";
        let cloud = PointCloud::decode(text.as_bytes()).unwrap();
        assert!(cloud.is_empty());
    }
}
