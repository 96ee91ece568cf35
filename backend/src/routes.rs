use std::sync::Arc;

use axum::Router;
use axum::http::HeaderName;
use axum::http::header::{ACCEPT, CONTENT_TYPE, ORIGIN};
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes::export::{pcd_file, pcd_save, pcd_text};
use crate::state::AppState;

mod export;

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/pcdtext/{*item}", get(pcd_text))
        .route("/api/pcdfile/{*item}", get(pcd_file))
        .route("/api/pcdsave/{*item}", get(pcd_save).post(pcd_save))
}

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_headers([
        ORIGIN,
        HeaderName::from_static("x-requested-with"),
        CONTENT_TYPE,
        ACCEPT,
    ]);

    Router::new()
        .merge(api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
