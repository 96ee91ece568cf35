use std::path::PathBuf;

use thiserror::Error;

use crate::store::SourceKind;

pub type Result<T> = std::result::Result<T, SourceError>;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{kind} file not found: {}", path.display())]
    NotFound { kind: SourceKind, path: PathBuf },

    #[error("Failed to read {kind} file {}", path.display())]
    Io {
        kind: SourceKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid sample item: {0:?}")]
    InvalidItem(String),
}

impl SourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound { .. })
    }

    pub fn kind(&self) -> Option<SourceKind> {
        match self {
            SourceError::NotFound { kind, .. } | SourceError::Io { kind, .. } => Some(*kind),
            SourceError::InvalidItem(_) => None,
        }
    }
}
