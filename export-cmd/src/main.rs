use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use pipeline::{Destination, ExportConfig, Exporter, IoSink};
use sample_source::SampleStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod clusters;
mod inspect;

/// Labelled point-cloud exports without the HTTP server.
#[derive(Parser)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge a cloud with its labels and write the ascii PCD.
    Export(ExportArgs),
    /// Print a JSON summary of a `.labels` or `.objects` file.
    Inspect {
        file: PathBuf,
    },
    /// Extract per-label cluster centres from labelled exports.
    Clusters {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Largest distance from a cluster centre for a point to join it.
        #[arg(long, default_value_t = clusters::DEFAULT_RADIUS)]
        radius: f32,
    },
}

#[derive(Args)]
struct ExportArgs {
    /// Sample path relative to the roots, e.g. `run1/0042.pcd`.
    item: String,

    #[arg(long, env = "IMAGES_FOLDER", default_value = "images")]
    images_folder: PathBuf,

    #[arg(long, env = "POINTCLOUDS_FOLDER", default_value = "pointclouds")]
    pointclouds_folder: PathBuf,

    /// Output file. Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so an export to stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Export(args) => export(args).await,
        Command::Inspect { file } => {
            let summary = inspect::inspect(&file).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Clusters { files, radius } => {
            for file in files {
                let (output, count) = clusters::write_clusters(&file, radius)
                    .await
                    .with_context(|| format!("Failed to cluster {}", file.display()))?;
                info!(clusters = count, output = %output.display(), "Wrote clusters");
            }
            Ok(())
        }
    }
}

async fn export(args: ExportArgs) -> anyhow::Result<()> {
    let store = SampleStore::new(&args.images_folder, &args.pointclouds_folder);
    let files = store.resolve(&args.item)?;
    let exporter = Exporter::new(ExportConfig::default());

    let summary = match args.output {
        Some(path) => exporter.export(&files, Destination::File(path)).await,
        None => exporter.run(&files, IoSink::new(tokio::io::stdout())).await,
    }
    .with_context(|| format!("Failed to export {}", args.item))?;

    info!(
        points = summary.points,
        objects = ?summary.objects,
        bytes = summary.bytes_written,
        "Exported"
    );
    Ok(())
}
