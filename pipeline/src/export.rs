use std::pin::pin;

use annotation::{AnnotationError, InstanceIndex, LabelSequence, ObjectRecord};
use futures::StreamExt;
use pcd::PointCloud;
use sample_source::{SampleFiles, SourceKind};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{Destination, ExportConfig};
use crate::error::{ExportError, Result};
use crate::sink::{ExportSink, FileSink};
use crate::writer::{AnnotatedCloud, ExportWriter};

/// What one finished export produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub points: usize,
    /// Object records loaded, `None` when the sample has no objects file.
    pub objects: Option<usize>,
    /// Points owned by some object.
    pub instance_points: usize,
    pub bytes_written: u64,
}

enum Stage {
    LoadingCloud,
    LoadingLabels(PointCloud),
    LoadingObjects(PointCloud, LabelSequence),
    Writing(AnnotatedCloud, Option<usize>),
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::LoadingCloud => "loading cloud",
            Stage::LoadingLabels(..) => "loading labels",
            Stage::LoadingObjects(..) => "loading objects",
            Stage::Writing(..) => "writing",
        }
    }
}

/// Runs exports one sample at a time. Every step of one export is
/// sequential; separate exports share nothing but the config.
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    config: ExportConfig,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub async fn export(&self, files: &SampleFiles, destination: Destination) -> Result<ExportSummary> {
        match destination {
            Destination::Response(sink) => self.run(files, sink).await,
            Destination::File(path) => self.run(files, FileSink::new(path)).await,
        }
    }

    /// Exports `files` into `sink` and finalises the sink, on success or
    /// failure. Nothing is written unless every input loaded.
    #[tracing::instrument(skip_all, fields(item = %files.name))]
    pub async fn run<S: ExportSink>(&self, files: &SampleFiles, mut sink: S) -> Result<ExportSummary> {
        let outcome = self.drive(files, &mut sink).await;
        let finished = sink.finish(outcome.as_ref().err()).await;

        match (outcome, finished) {
            (Ok(summary), Ok(())) => {
                info!(points = summary.points, bytes = summary.bytes_written, "Export finished");
                Ok(summary)
            }
            (Ok(_), Err(err)) => {
                error!(%err, "Failed to finalise export");
                Err(err.into())
            }
            (Err(err), _) if err.is_disconnect() => {
                debug!("Client disconnected, export abandoned");
                Err(err)
            }
            (Err(err), _) => {
                error!(%err, "Export failed");
                Err(err)
            }
        }
    }

    async fn drive<S: ExportSink>(&self, files: &SampleFiles, sink: &mut S) -> Result<ExportSummary> {
        let mut stage = Stage::LoadingCloud;
        loop {
            debug!(stage = stage.name(), "Export stage");
            stage = match stage {
                Stage::LoadingCloud => {
                    let bytes = files.read(SourceKind::Cloud).await?;
                    Stage::LoadingLabels(PointCloud::decode(&bytes)?)
                }
                Stage::LoadingLabels(cloud) => {
                    let bytes = files.read(SourceKind::Labels).await?;
                    // More labels than points cannot line up, stop before expanding them.
                    let labels = annotation::decode_with_limit::<LabelSequence>(&bytes, cloud.len()).map_err(
                        |source| match source {
                            AnnotationError::TooLarge { found, .. } if found > cloud.len() => {
                                ExportError::LengthMismatch {
                                    labels: found,
                                    points: cloud.len(),
                                }
                            }
                            source => ExportError::MalformedAnnotation {
                                kind: SourceKind::Labels,
                                source,
                            },
                        },
                    )?;
                    Stage::LoadingObjects(cloud, labels)
                }
                Stage::LoadingObjects(cloud, labels) => {
                    let objects = load_objects(files).await?;
                    let instances = match &objects {
                        Some(objects) => InstanceIndex::build(objects, cloud.len()),
                        None => InstanceIndex::empty(),
                    };
                    if instances.collisions() > 0 {
                        warn!(
                            collisions = instances.collisions(),
                            "Points claimed by several objects, the later object keeps them"
                        );
                    }
                    if instances.skipped() > 0 {
                        warn!(skipped = instances.skipped(), "Object points past the end of the cloud ignored");
                    }
                    let annotated = AnnotatedCloud::new(cloud, labels, instances)?;
                    Stage::Writing(annotated, objects.map(|o| o.len()))
                }
                Stage::Writing(annotated, objects) => {
                    let instance_points = annotated.instances().len();
                    let writer = ExportWriter::new(annotated, &self.config);
                    let points = writer.len();

                    let mut chunks = pin!(writer.into_chunks());
                    let mut bytes_written = 0u64;
                    while let Some(chunk) = chunks.next().await {
                        bytes_written += chunk.len() as u64;
                        sink.write_chunk(chunk).await?;
                    }
                    return Ok(ExportSummary {
                        points,
                        objects,
                        instance_points,
                        bytes_written,
                    });
                }
            };
        }
    }
}

/// Objects are optional: a missing file means no instances.
async fn load_objects(files: &SampleFiles) -> Result<Option<Vec<ObjectRecord>>> {
    let bytes = match files.read(SourceKind::Objects).await {
        Ok(bytes) => bytes,
        Err(err) if err.is_not_found() => {
            info!(path = %files.objects.display(), "No objects file, exporting without instances");
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };
    let objects = annotation::decode::<Vec<ObjectRecord>>(&bytes).map_err(|source| {
        ExportError::MalformedAnnotation {
            kind: SourceKind::Objects,
            source,
        }
    })?;
    Ok(Some(objects))
}
