use std::path::PathBuf;

use annotation::AnnotationError;
use pcd::PcdError;
use sample_source::{SourceError, SourceKind};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Malformed point cloud")]
    MalformedPointCloud(#[from] PcdError),

    #[error("Malformed {kind} annotation")]
    MalformedAnnotation {
        kind: SourceKind,
        #[source]
        source: AnnotationError,
    },

    #[error("Decoded {labels} labels for {points} points")]
    LengthMismatch { labels: usize, points: usize },

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl ExportError {
    /// Short text sent to a client in place of point data.
    pub fn user_message(&self) -> &'static str {
        match self {
            ExportError::Source(SourceError::InvalidItem(_)) => "Invalid sample item.",
            ExportError::Source(err) => file_message(err.kind()),
            ExportError::MalformedPointCloud(_) => file_message(Some(SourceKind::Cloud)),
            ExportError::MalformedAnnotation { kind, .. } => file_message(Some(*kind)),
            ExportError::LengthMismatch { .. } => "Labels file does not match the PCD file.",
            ExportError::Sink(_) => "Error while writing export.",
        }
    }

    /// The client went away mid-stream.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ExportError::Sink(SinkError::Disconnected))
    }
}

fn file_message(kind: Option<SourceKind>) -> &'static str {
    match kind {
        Some(SourceKind::Cloud) | None => "Error while parsing PCD file.",
        Some(SourceKind::Labels) => "Error while parsing labels file.",
        Some(SourceKind::Objects) => "Error while parsing objects file.",
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write {}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write export")]
    Write(#[from] std::io::Error),

    #[error("Response receiver disconnected")]
    Disconnected,
}
