use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use glam::Vec3;
use pcd::PointCloud;

pub const DEFAULT_RADIUS: f32 = 0.5;

/// Label of unannotated points, never clustered.
const BACKGROUND: u32 = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub centre: Vec3,
    pub label: u32,
    pub points: usize,
}

impl Cluster {
    fn add(&mut self, point: Vec3) {
        self.points += 1;
        self.centre += (point - self.centre) / self.points as f32;
    }
}

/// Greedy single pass: each point joins the first cluster of its label whose
/// centre is closer than `radius`, or starts a new one. A point joins at
/// most one cluster even when several are in reach, so cluster sizes add up
/// to the number of points.
pub fn cluster_points(points: impl IntoIterator<Item = (Vec3, u32)>, radius: f32) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();
    for (point, label) in points {
        if label == BACKGROUND {
            continue;
        }
        let existing = clusters
            .iter_mut()
            .find(|c| c.label == label && c.centre.distance(point) < radius);
        match existing {
            Some(cluster) => cluster.add(point),
            None => clusters.push(Cluster {
                centre: point,
                label,
                points: 1,
            }),
        }
    }
    clusters
}

pub fn render(clusters: &[Cluster]) -> String {
    let mut out = String::from("x y z label\n");
    for c in clusters {
        let _ = writeln!(out, "{} {} {} {}", c.centre.x, c.centre.y, c.centre.z, c.label);
    }
    out
}

/// Clusters a labelled export and writes `<file>.clusters` next to it.
pub async fn write_clusters(file: &Path, radius: f32) -> anyhow::Result<(PathBuf, usize)> {
    let bytes = tokio::fs::read(file).await?;
    let cloud = PointCloud::decode(&bytes)?;
    let Some(labels) = cloud.labels.as_deref() else {
        bail!("{} has no label field", file.display());
    };

    let clusters = cluster_points(cloud.positions.iter().copied().zip(labels.iter().copied()), radius);

    let mut output = file.as_os_str().to_owned();
    output.push(".clusters");
    let output = PathBuf::from(output);
    tokio::fs::write(&output, render(&clusters))
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok((output, clusters.len()))
}
