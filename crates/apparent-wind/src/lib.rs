pub mod apparent;
pub mod config;
pub mod errors;
pub mod file_parsers;
pub mod geodesy;
pub mod handlers;
pub mod interpolation;
pub mod kinematics;
pub mod models;
pub mod pipeline;
pub mod request_id;
pub mod summary;
pub mod wind;

use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
};

use crate::{
    config::ServerConfig,
    handlers::{apparent_wind, health_check, parse_gps, wind_for_track},
    pipeline::Enricher,
    request_id::request_id_middleware,
    wind::{OpenMeteoTransport, WindCache},
};

/// Uploads larger than this are rejected before decoding.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub fn create_router(enricher: Enricher) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/parse-gps", post(parse_gps))
        .route("/wind-for-track", post(wind_for_track))
        .route("/apparent-wind", post(apparent_wind))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(Extension(enricher))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(CompressionLayer::new())
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
}

/// Builds the Open-Meteo backed enricher described by `config`.
pub fn build_enricher(config: &ServerConfig) -> anyhow::Result<Enricher> {
    let transport = Arc::new(OpenMeteoTransport::new(&config.provider)?);
    let enricher = Enricher::new(transport, config.enrich);
    Ok(if config.wind_cache {
        tracing::info!("Wind cache enabled, capacity {}", config.wind_cache_capacity);
        enricher.with_cache(Arc::new(WindCache::with_capacity(config.wind_cache_capacity)))
    } else {
        enricher
    })
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let app = create_router(build_enricher(&config)?);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    tracing::info!("Server running on http://0.0.0.0:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
