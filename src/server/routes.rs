use super::dto::*;
use super::error::Problem;
use super::{handlers, AppState};
use crate::domain::estimate::{DetailEstimate, TakeoffEstimate};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn register_routes(router: Router, state: Arc<AppState>) -> Router {
    router
        .route("/health", get(handlers::health))
        .route("/systems", get(handlers::list_systems))
        .route("/estimate", post(estimate_handler))
        .route("/estimate/detail", post(estimate_detail_handler))
        .route("/estimate/compare", post(compare_handler))
        .route("/spec/analyze", post(handlers::analyze_spec))
        .route("/footprint", post(footprint_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

async fn estimate_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Json<EstimateRequest>,
) -> Result<Json<TakeoffEstimate>, Problem> {
    handlers::estimate(state, body).await
}

async fn estimate_detail_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Json<DetailEstimateRequest>,
) -> Result<Json<DetailEstimate>, Problem> {
    handlers::estimate_detail(state, body).await
}

async fn compare_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Json<CompareRequest>,
) -> Result<Json<CompareResponse>, Problem> {
    handlers::compare(state, body).await
}

async fn footprint_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Json<FootprintRequest>,
) -> Result<Json<FootprintResponse>, Problem> {
    handlers::footprint(state, body).await
}
