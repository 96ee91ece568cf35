use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::sink::ResponseSink;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Point lines batched into one sink write.
    pub points_per_chunk: usize,
}

impl ExportConfig {
    pub fn with_points_per_chunk(mut self, points_per_chunk: usize) -> Self {
        self.points_per_chunk = points_per_chunk.max(1);
        self
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            points_per_chunk: 256,
        }
    }
}

/// Where one export goes. Chosen per call.
#[derive(Debug)]
pub enum Destination {
    /// Streamed back to an HTTP client.
    Response(ResponseSink),
    /// Persisted at this path, parent directories created as needed.
    File(PathBuf),
}
