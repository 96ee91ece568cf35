use pipeline::{ExportConfig, Exporter};
use sample_source::SampleStore;

use crate::config::Args;

#[derive(Debug, Clone)]
pub struct AppState {
    pub store: SampleStore,
    pub exporter: Exporter,
}

impl AppState {
    pub fn new(args: &Args) -> Self {
        let config = ExportConfig::default().with_points_per_chunk(args.points_per_chunk);
        Self {
            store: SampleStore::new(&args.images_folder, &args.pointclouds_folder),
            exporter: Exporter::new(config),
        }
    }
}
