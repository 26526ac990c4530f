//! Router and shared state for the web front end.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use billscan_ocr::BillPipeline;

use crate::handlers;
use crate::uploads::UploadStore;

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Builds a pipeline on the blocking thread that will run it.
pub type PipelineFactory = Arc<dyn Fn() -> anyhow::Result<BillPipeline> + Send + Sync>;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub excel_dir: PathBuf,
    pub uploads: UploadStore,
    pub pipeline: PipelineFactory,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/upload", post(handlers::upload))
        .route("/view_excel", get(handlers::view_excel))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind.parse()?;
    let app = create_router(state);
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
