use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{ExportError, SinkError};

/// An ordered destination for export bytes.
///
/// `finish` takes the sink by value, so a sink is finalised exactly once.
#[async_trait]
pub trait ExportSink: Send + Sized {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), SinkError>;

    /// Ends the export. `failure` is set when the export did not complete.
    async fn finish(self, failure: Option<&ExportError>) -> Result<(), SinkError>;
}

pub type ResponseChunk = Result<Bytes, io::Error>;

/// Feeds an HTTP response body through a bounded channel.
#[derive(Debug)]
pub struct ResponseSink {
    tx: mpsc::Sender<ResponseChunk>,
}

impl ResponseSink {
    /// A sink and the receiving end the response body is built from.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<ResponseChunk>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ExportSink for ResponseSink {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        self.tx.send(Ok(chunk)).await.map_err(|_| SinkError::Disconnected)
    }

    async fn finish(self, failure: Option<&ExportError>) -> Result<(), SinkError> {
        if let Some(err) = failure {
            let message = Bytes::from_static(err.user_message().as_bytes());
            if self.tx.send(Ok(message)).await.is_err() {
                debug!("Response closed before the error message was sent");
            }
        }
        // Dropping the sender ends the response body.
        Ok(())
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Writes the export next to `target` and renames it into place once the
/// export succeeds. A failed export leaves `target` untouched.
#[derive(Debug)]
pub struct FileSink {
    target: PathBuf,
    open: Option<TempFile>,
}

#[derive(Debug)]
struct TempFile {
    path: PathBuf,
    file: BufWriter<File>,
}

impl FileSink {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            open: None,
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    async fn create(&self) -> Result<TempFile, SinkError> {
        if let Some(parent) = self.target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|source| SinkError::File {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let path = temp_sibling(&self.target);
        let file = File::create(&path).await.map_err(|source| SinkError::File {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "Opened export file");
        Ok(TempFile {
            path,
            file: BufWriter::new(file),
        })
    }

    fn file_error(&self, source: io::Error) -> SinkError {
        SinkError::File {
            path: self.target.clone(),
            source,
        }
    }
}

#[async_trait]
impl ExportSink for FileSink {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        let temp = match self.open.take() {
            Some(temp) => temp,
            None => self.create().await?,
        };
        let temp = self.open.insert(temp);
        if let Err(source) = temp.file.write_all(&chunk).await {
            return Err(self.file_error(source));
        }
        Ok(())
    }

    async fn finish(mut self, failure: Option<&ExportError>) -> Result<(), SinkError> {
        let temp = match (self.open.take(), failure) {
            (None, Some(_)) => return Ok(()),
            (Some(temp), Some(_)) => {
                drop(temp.file);
                if let Err(err) = tokio::fs::remove_file(&temp.path).await {
                    warn!(path = %temp.path.display(), %err, "Failed to remove partial export");
                }
                return Ok(());
            }
            (Some(temp), None) => temp,
            (None, None) => self.create().await?,
        };

        let TempFile { path, mut file } = temp;
        let flushed = match file.flush().await {
            Ok(()) => file.get_mut().sync_all().await,
            Err(err) => Err(err),
        };
        drop(file);
        let renamed = match flushed {
            Ok(()) => tokio::fs::rename(&path, &self.target).await,
            Err(err) => Err(err),
        };
        if let Err(source) = renamed {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(self.file_error(source));
        }
        debug!(path = %self.target.display(), "Saved export");
        Ok(())
    }
}

/// `dir/name` -> `dir/.name.<pid>.<n>.tmp`
fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    target.with_file_name(format!(".{name}.{}.{n}.tmp", std::process::id()))
}

/// Any async writer, stdout for the CLI.
#[derive(Debug)]
pub struct IoSink<W> {
    writer: W,
}

impl<W> IoSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ExportSink for IoSink<W> {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        self.writer.write_all(&chunk).await?;
        Ok(())
    }

    async fn finish(mut self, _failure: Option<&ExportError>) -> Result<(), SinkError> {
        self.writer.flush().await?;
        Ok(())
    }
}
