use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use path_clean::PathClean;
use tracing::debug;

use crate::error::{Result, SourceError};

/// Which of a sample's files is being read.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SourceKind {
    Cloud,
    Labels,
    Objects,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Cloud => f.write_str("point cloud"),
            SourceKind::Labels => f.write_str("labels"),
            SourceKind::Objects => f.write_str("objects"),
        }
    }
}

/// Roots under which samples live.
///
/// Raw clouds are under `clouds_root`, their `.labels` and `.objects`
/// siblings under `annotations_root`, and exports are saved to
/// `annotations_root/labelled`.
#[derive(Debug, Clone)]
pub struct SampleStore {
    clouds_root: PathBuf,
    annotations_root: PathBuf,
    labelled_root: PathBuf,
}

impl SampleStore {
    pub fn new(clouds_root: impl Into<PathBuf>, annotations_root: impl Into<PathBuf>) -> Self {
        let annotations_root = annotations_root.into();
        Self {
            clouds_root: clouds_root.into(),
            labelled_root: annotations_root.join("labelled"),
            annotations_root,
        }
    }

    pub fn labelled_root(&self) -> &Path {
        &self.labelled_root
    }

    /// Maps a request item such as `scans/run1/0042.pcd` to its files.
    /// Items must stay inside the roots.
    pub fn resolve(&self, item: &str) -> Result<SampleFiles> {
        let relative = Path::new(item.trim_start_matches('/')).to_path_buf();
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(SourceError::InvalidItem(item.to_string()));
        }
        let relative = relative.clean();
        let name = match relative.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => return Err(SourceError::InvalidItem(item.to_string())),
        };

        let annotation = self.annotations_root.join(&relative);
        Ok(SampleFiles {
            cloud: self.clouds_root.join(&relative),
            labels: with_suffix(&annotation, "labels"),
            objects: with_suffix(&annotation, "objects"),
            labelled: self.labelled_root.join(&relative),
            name,
        })
    }
}

/// The files that make up one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFiles {
    pub cloud: PathBuf,
    pub labels: PathBuf,
    pub objects: PathBuf,
    /// Where an export of this sample is saved.
    pub labelled: PathBuf,
    /// File name of the cloud, used for downloads.
    pub name: String,
}

impl SampleFiles {
    pub fn path(&self, kind: SourceKind) -> &Path {
        match kind {
            SourceKind::Cloud => &self.cloud,
            SourceKind::Labels => &self.labels,
            SourceKind::Objects => &self.objects,
        }
    }

    pub async fn read(&self, kind: SourceKind) -> Result<Vec<u8>> {
        let path = self.path(kind);
        debug!(%kind, path = %path.display(), "reading sample file");
        tokio::fs::read(path).await.map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound {
                kind,
                path: path.to_path_buf(),
            },
            _ => SourceError::Io {
                kind,
                path: path.to_path_buf(),
                source,
            },
        })
    }
}

/// `dir/0042.pcd` -> `dir/0042.pcd.<suffix>`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut path = path.as_os_str().to_owned();
    path.push(".");
    path.push(suffix);
    path.into()
}
