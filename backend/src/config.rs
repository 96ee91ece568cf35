use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Serves point clouds merged with their labels as ascii PCD")]
pub struct Args {
    /// Root of the raw point-cloud files.
    #[arg(long, env = "IMAGES_FOLDER", default_value = "images")]
    pub images_folder: PathBuf,

    /// Root of the `.labels` and `.objects` files. Saved exports go to
    /// its `labelled` subdirectory.
    #[arg(long, env = "POINTCLOUDS_FOLDER", default_value = "pointclouds")]
    pub pointclouds_folder: PathBuf,

    #[arg(long, env = "BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Point lines per streamed chunk.
    #[arg(long, env = "POINTS_PER_CHUNK", default_value_t = 256)]
    pub points_per_chunk: usize,
}
