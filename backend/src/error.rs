use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pipeline::ExportError;
use sample_source::SourceError;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, BackendError>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Invalid input: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("Export task failed")]
    Join(#[from] tokio::task::JoinError),
}

impl From<SourceError> for BackendError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::InvalidItem(item) => BackendError::BadRequest(item),
            other => BackendError::Export(other.into()),
        }
    }
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = match &self {
            BackendError::BadRequest(_) => StatusCode::BAD_REQUEST,
            BackendError::Export(ExportError::Source(err)) if err.is_not_found() => StatusCode::NOT_FOUND,
            BackendError::Export(
                ExportError::MalformedPointCloud(_)
                | ExportError::MalformedAnnotation { .. }
                | ExportError::LengthMismatch { .. },
            ) => StatusCode::UNPROCESSABLE_ENTITY,
            BackendError::Export(_) | BackendError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(err = %self, "Request failed");
        }

        match self {
            BackendError::Export(err) => (status, err.user_message()).into_response(),
            other => (status, other.to_string()).into_response(),
        }
    }
}
