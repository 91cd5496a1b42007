//! Route calculation: request validation, candidate synthesis and caching.

pub mod cache;
pub mod synthesis;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use base64::Engine;
use tracing::{debug, error, info};

use crate::dataset::Dataset;
use crate::error::ApiError;
use crate::geo::distance_km;
use crate::location::{is_in_taiwan, validate_coordinates, LocationService};
use crate::model::{timestamp_now, Preferences, RouteRequest, RouteResponse, RouteStats};

use self::cache::RouteCache;
use self::synthesis::{synthesize, SynthesisOutcome};

pub const MAX_TRIP_KM: f64 = 500.0;
pub const MIN_TRIP_KM: f64 = 0.1;

pub struct RouteService {
    dataset: Arc<Dataset>,
    locations: Arc<LocationService>,
    cache: RouteCache,
    lookups: AtomicU64,
    hits: AtomicU64,
    calculations: AtomicU64,
}

impl RouteService {
    pub fn new(dataset: Arc<Dataset>, locations: Arc<LocationService>, cache: RouteCache) -> Self {
        Self {
            dataset,
            locations,
            cache,
            lookups: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            calculations: AtomicU64::new(0),
        }
    }

    pub fn calculate_routes(&self, request: &RouteRequest) -> Result<RouteResponse, ApiError> {
        let started = Instant::now();
        validate_route_request(request)?;

        let key = cache_key(request);
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if let Some(cached) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key, "returning cached routes");
            return Ok(cached);
        }

        let origin = self.locations.reverse_geocode(&request.origin)?;
        let destination = self.locations.reverse_geocode(&request.destination)?;

        let distance = distance_km(&request.origin, &request.destination);
        if distance > MAX_TRIP_KM {
            return Err(ApiError::BadRequest("Distance too long for route calculation".into()));
        }
        if distance < MIN_TRIP_KM {
            return Err(ApiError::BadRequest("Origin and destination are too close".into()));
        }

        self.calculations.fetch_add(1, Ordering::Relaxed);
        let outcome = synthesize(
            &self.dataset,
            &request.origin,
            &request.destination,
            request.preferences.as_ref(),
        );
        match &outcome {
            SynthesisOutcome::Complete(_) => {}
            SynthesisOutcome::Partial { failures, .. } => {
                info!(failed = failures.len(), "some route candidates failed");
            }
            SynthesisOutcome::Fallback { route, failures } if outcome.is_degraded() => {
                error!(
                    failed = failures.len(),
                    walking = route.is_some(),
                    "no route candidate survived, degrading"
                );
            }
            SynthesisOutcome::Fallback { route, .. } => {
                info!(walking = route.is_some(), "preferences ruled out every candidate");
            }
        }
        let routes = outcome.into_routes();

        let response = RouteResponse {
            alternatives: routes.len(),
            routes,
            origin,
            destination,
            search_time: timestamp_now(),
        };
        self.cache.put(key, response.clone());

        info!(
            routes = response.alternatives,
            distance_km = format!("{distance:.2}"),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "route calculation finished"
        );
        Ok(response)
    }

    pub fn stats(&self) -> RouteStats {
        let lookups = self.lookups.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);
        RouteStats {
            cache_size: self.cache.len(),
            cache_hit_rate: if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 },
            total_calculations: self.calculations.load(Ordering::Relaxed),
        }
    }
}

fn validate_route_request(request: &RouteRequest) -> Result<(), ApiError> {
    if !validate_coordinates(&request.origin) {
        return Err(ApiError::InvalidCoordinates("Invalid origin coordinates".into()));
    }
    if !validate_coordinates(&request.destination) {
        return Err(ApiError::InvalidCoordinates("Invalid destination coordinates".into()));
    }
    if !is_in_taiwan(&request.origin) {
        return Err(ApiError::BadRequest("Origin must be in Taiwan".into()));
    }
    if !is_in_taiwan(&request.destination) {
        return Err(ApiError::BadRequest("Destination must be in Taiwan".into()));
    }
    Ok(())
}

/// Rounded coordinates plus base64 of the serialized preferences.
pub fn cache_key(request: &RouteRequest) -> String {
    let default_preferences = Preferences::default();
    let preferences = request.preferences.as_ref().unwrap_or(&default_preferences);
    let encoded = serde_json::to_vec(preferences).unwrap_or_default();
    format!(
        "route:{:.4},{:.4}:{:.4},{:.4}:{}",
        request.origin.latitude,
        request.origin.longitude,
        request.destination.latitude,
        request.destination.longitude,
        base64::engine::general_purpose::STANDARD.encode(encoded)
    )
}
