//! HTTP surface: routing, shared state and the non-API endpoints.

pub mod locations;
pub mod rate_limit;
pub mod response;
pub mod routes;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderName, HeaderValue, Method, Uri},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{info_span, warn, Level};

use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::ApiError;
use crate::location::LocationService;
use crate::model::timestamp_now;
use crate::routing::cache::RouteCache;
use crate::routing::RouteService;

use self::rate_limit::{rate_limit, RateLimiter};

static REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteService>,
    pub locations: Arc<LocationService>,
    pub dataset: Arc<Dataset>,
    pub started_at: Instant,
    pub environment: String,
}

impl AppState {
    pub fn new(dataset: Arc<Dataset>, config: &Config) -> Self {
        let locations = Arc::new(LocationService::new(dataset.clone()));
        let cache = RouteCache::new(config.cache_ttl(), config.cache_capacity);
        let routes = Arc::new(RouteService::new(dataset.clone(), locations.clone(), cache));
        Self {
            routes,
            locations,
            dataset,
            started_at: Instant::now(),
            environment: config.environment.clone(),
        }
    }
}

pub fn router(state: AppState, config: &Config) -> Router {
    let limiter = Arc::new(RateLimiter::new(config.rate_limit_max, config.rate_limit_window()));

    let api = Router::new()
        .route("/api", get(api_info))
        .route("/api/routes", post(routes::calculate_routes))
        .route("/api/routes/stats", get(routes::route_stats))
        .route("/api/locations/reverse-geocode", post(locations::reverse_geocode))
        .route("/api/locations/geocode", post(locations::geocode))
        .route("/api/locations/search", get(locations::search))
        .route("/api/locations/nearby-stations", post(locations::nearby_stations))
        .route("/api/locations/details", post(locations::details))
        .route("/api/locations/cities", get(locations::cities))
        .route("/api/locations/cities/{id}", get(locations::city))
        .route("/api/locations/stations", get(locations::stations))
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit));

    // Outermost layer last: the request id is assigned before tracing sees the request.
    Router::new()
        .route("/health", get(health))
        .merge(api)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(RequestBodyLimitLayer::new(config.body_limit_bytes))
        .layer(CompressionLayer::new())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(cors_layer(&config.cors_origins))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(DefaultOnResponse::new().level(Level::INFO).latency_unit(LatencyUnit::Millis)),
        )
        .layer(SetRequestIdLayer::new(REQUEST_ID.clone(), MakeRequestUuid))
        .with_state(state)
}

fn request_span(request: &Request) -> tracing::Span {
    let request_id = request
        .headers()
        .get(&REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");
    info_span!("request", method = %request.method(), uri = %request.uri(), request_id)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return cors.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(origin, %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(allowed))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "timestamp": timestamp_now(),
        "uptime": state.started_at.elapsed().as_secs_f64(),
        "environment": state.environment,
    }))
}

async fn api_info() -> Json<serde_json::Value> {
    Json(json!({
        "name": "台灣智慧交通路線規劃 API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Multi-modal route planning across Taiwan",
        "endpoints": {
            "routes": "/api/routes",
            "locations": "/api/locations",
            "health": "/health",
        },
    }))
}

async fn not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::NotFound(format!("{method} {}", uri.path()))
}
