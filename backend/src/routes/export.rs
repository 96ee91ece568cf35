use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use pipeline::{Destination, ResponseSink};
use sample_source::SampleFiles;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::error::Result;
use crate::state::AppState;

/// Chunks buffered between the export task and the response body.
const RESPONSE_BUFFER: usize = 8;

pub async fn pcd_text(State(state): State<Arc<AppState>>, Path(item): Path<String>) -> Result<Response> {
    let files = state.store.resolve(&item)?;
    let body = stream_export(&state, files);
    Ok(([(CONTENT_TYPE, "application/octet-stream")], body).into_response())
}

pub async fn pcd_file(State(state): State<Arc<AppState>>, Path(item): Path<String>) -> Result<Response> {
    let files = state.store.resolve(&item)?;
    let disposition = format!("attachment; filename={}", files.name);
    let body = stream_export(&state, files);
    Ok((
        [
            (CONTENT_TYPE, "text/plain; charset=UTF-8".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

pub async fn pcd_save(State(state): State<Arc<AppState>>, Path(item): Path<String>) -> Result<Response> {
    let files = state.store.resolve(&item)?;
    let exporter = state.exporter.clone();
    let target = files.labelled.clone();

    // Spawned so the save finishes even if the client goes away.
    let summary = tokio::spawn(async move { exporter.export(&files, Destination::File(target)).await }).await??;
    info!(item, points = summary.points, "Saved labelled export");

    Ok(([(CONTENT_TYPE, "application/octet-stream")], Body::empty()).into_response())
}

/// Runs the export in its own task and returns the response body it feeds.
/// Failures reach the client as a short message at the end of the body.
fn stream_export(state: &AppState, files: SampleFiles) -> Body {
    let (sink, rx) = ResponseSink::channel(RESPONSE_BUFFER);
    let exporter = state.exporter.clone();
    tokio::spawn(async move {
        // Outcome is logged by the exporter.
        let _ = exporter.export(&files, Destination::Response(sink)).await;
    });
    Body::from_stream(ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use std::path::Path as FsPath;

    use annotation::LabelSequence;
    use axum::Router;
    use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN};
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Args;
    use crate::routes::app;

    const CLOUD: &str = "FIELDS x y z intensity\nPOINTS 2\nDATA ascii\n1 2 3 0.5\n0 0 1 2\n";

    fn setup() -> (TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let args = Args {
            images_folder: dir.path().join("images"),
            pointclouds_folder: dir.path().join("pointclouds"),
            bind: ([127, 0, 0, 1], 0).into(),
            points_per_chunk: 1,
        };
        write(&args.images_folder.join("run/a.pcd"), CLOUD.as_bytes());
        write(
            &args.pointclouds_folder.join("run/a.pcd.labels"),
            &annotation::encode(&LabelSequence::new(vec![7, 3])).unwrap(),
        );
        write(&args.images_folder.join("run/nolabels.pcd"), CLOUD.as_bytes());
        (dir, app(Arc::new(AppState::new(&args))))
    }

    fn write(path: &FsPath, bytes: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
        let request = Request::builder()
            .uri(uri)
            .header(ORIGIN, "http://localhost:8080")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn pcdtext_streams_the_export() {
        let (_dir, app) = setup();
        let (status, headers, body) = get(app, "/api/pcdtext/run/a.pcd").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(body.starts_with("VERSION .7\n"));
        assert!(body.ends_with("DATA ascii\n1 -3 2 0.5 7\n0 -1 0 2 3\n"), "{body}");
    }

    #[tokio::test]
    async fn pcdfile_is_an_attachment() {
        let (_dir, app) = setup();
        let (status, headers, body) = get(app, "/api/pcdfile/run/a.pcd").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CONTENT_DISPOSITION], "attachment; filename=a.pcd");
        assert_eq!(headers[CONTENT_TYPE], "text/plain; charset=UTF-8");
        assert!(body.contains("POINTS 2\n"));
    }

    #[tokio::test]
    async fn pcdsave_writes_under_labelled() {
        let (dir, app) = setup();
        let (status, _, body) = get(app, "/api/pcdsave/run/a.pcd").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        let saved = std::fs::read_to_string(dir.path().join("pointclouds/labelled/run/a.pcd")).unwrap();
        assert!(saved.ends_with("1 -3 2 0.5 7\n0 -1 0 2 3\n"));
    }

    #[tokio::test]
    async fn streamed_failure_ends_with_a_message() {
        let (_dir, app) = setup();
        let (status, _, body) = get(app, "/api/pcdtext/run/nolabels.pcd").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Error while parsing labels file.");
    }

    #[tokio::test]
    async fn pcdsave_reports_missing_cloud() {
        let (_dir, app) = setup();
        let (status, _, body) = get(app, "/api/pcdsave/run/missing.pcd").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "Error while parsing PCD file.");
    }

    #[tokio::test]
    async fn rejects_items_outside_the_roots() {
        let (_dir, app) = setup();
        let (status, _, _) = get(app, "/api/pcdtext/run/../../secret.pcd").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
