pub mod aggregate;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod normalize;
pub mod range;
pub mod ranking;
pub mod report;
pub mod versions;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};

use config::EngineOptions;
use models::metrics::ReportCounters;

pub use error::ActivityError;
pub use normalize::{normalize, normalize_str, NormalizedReport};
pub use report::{assemble, generate, RangeQuery, TopNConfig};

#[derive(Clone)]
pub struct AppState {
    pub engine: EngineOptions,
    pub default_top_n: usize,
    pub admin_token: Option<Arc<str>>,
    pub counters: ReportCounters,
}

fn report_routes() -> Router<AppState> {
    Router::new().route(
        "/api/v1/activity/report",
        post(handlers::activity::report),
    )
}

fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health_check))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/metrics", get(handlers::admin::get_metrics))
        .layer(axum_middleware::from_fn_with_state(
            state,
            middleware::admin_auth::require_admin_token,
        ))
}

/// Build the full application router (used by main and tests).
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(report_routes())
        .merge(health_routes())
        .merge(admin_routes(state.clone()))
        .with_state(state)
}
