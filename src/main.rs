use std::sync::Arc;

use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::{self, TraceLayer};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use client_activity::config::Config;
use client_activity::models::metrics::ReportCounters;
use client_activity::{build_app, AppState};

fn build_cors(config: &Config) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let engine = config.engine_options();

    tracing::info!(
        invalid_month_policy = ?engine.invalid_month_policy,
        strict_counts = engine.strict_counts,
        default_top_n = config.default_top_n,
        admin_routes = config.admin_token.is_some(),
        "Engine configured"
    );

    let state = AppState {
        engine,
        default_top_n: config.default_top_n,
        admin_token: config.admin_token.as_deref().map(Arc::from),
        counters: ReportCounters::new(),
    };

    let app = build_app(state)
        .layer(RequestBodyLimitLayer::new(config.max_payload_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_request(trace::DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    trace::DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(tower_http::LatencyUnit::Millis),
                ),
        )
        .layer(build_cors(&config));

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutting down...");
}
