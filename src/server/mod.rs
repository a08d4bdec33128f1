use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::interceptor::Interceptor;

pub mod routes;

/// Shared collector state: one interceptor (which owns the store handle)
/// plus the config and project root the handlers need.
pub struct AppState {
    pub interceptor: Interceptor,
    pub config: Config,
    pub project_path: PathBuf,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/monitor/dependency", post(routes::report_dependency))
        .route("/monitor/health", get(routes::health))
        .route("/monitor/dependencies", get(routes::dependencies))
        .route("/monitor/dependencies/context", get(routes::dependencies_by_context))
        .route(
            "/monitor/production-dependencies",
            get(routes::production_dependencies),
        )
        .route("/monitor/run-tests", post(routes::run_tests))
        // Browser-side reporters post cross-origin; no auth by design
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("dependency monitoring server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
