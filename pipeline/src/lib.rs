//! The labelled export: decode a cloud, join its labels and object
//! instances, and stream the result as an ascii PCD to a sink.

mod config;
mod error;
mod export;
mod sink;
mod writer;

pub use config::{Destination, ExportConfig};
pub use error::{ExportError, Result, SinkError};
pub use export::{ExportSummary, Exporter};
pub use sink::{ExportSink, FileSink, IoSink, ResponseChunk, ResponseSink};
pub use writer::{AnnotatedCloud, AnnotatedPoint, ExportWriter, to_display_axes};
