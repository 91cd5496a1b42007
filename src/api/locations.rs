use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::response::Envelope;
use super::routes::check_coordinates;
use super::AppState;
use crate::error::ApiError;
use crate::geo::Coordinates;
use crate::model::{City, Location, LocationDetails, LocationSearchRequest, LocationSearchResponse, Station, TransportMode};

#[derive(Debug, Deserialize)]
pub struct GeocodeBody {
    address: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: String,
    lat: Option<f64>,
    lng: Option<f64>,
    radius: Option<f64>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyStationsBody {
    coordinates: Coordinates,
    max_distance: Option<f64>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct StationsParams {
    mode: Option<TransportMode>,
}

fn in_range<T: PartialOrd + std::fmt::Display>(field: &str, value: T, min: T, max: T) -> Result<T, ApiError> {
    if value < min || value > max {
        return Err(ApiError::BadRequest(format!(
            "\"{field}\" must be between {min} and {max}"
        )));
    }
    Ok(value)
}

pub async fn reverse_geocode(
    State(state): State<AppState>,
    payload: Result<Json<Coordinates>, JsonRejection>,
) -> Result<Envelope<Location>, ApiError> {
    let Json(coordinates) = payload?;
    check_coordinates("coordinates", &coordinates)?;
    info!(?coordinates, "reverse geocoding request");
    Ok(Envelope::new(state.locations.reverse_geocode(&coordinates)?))
}

pub async fn geocode(
    State(state): State<AppState>,
    payload: Result<Json<GeocodeBody>, JsonRejection>,
) -> Result<Envelope<Vec<Location>>, ApiError> {
    let Json(body) = payload?;
    in_range("address.length", body.address.chars().count(), 1, 200)?;
    info!(address = %body.address, "geocoding request");

    let locations = state.locations.geocode(&body.address)?;
    let count = locations.len();
    Ok(Envelope::new(locations).count(count))
}

pub async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Envelope<LocationSearchResponse>, ApiError> {
    let Query(params) = params?;
    in_range("q.length", params.q.chars().count(), 1, 100)?;
    let radius = in_range("radius", params.radius.unwrap_or(5000.0), 100.0, 50000.0)?;
    let limit = in_range("limit", params.limit.unwrap_or(20), 1, 100)?;
    let center = match (params.lat, params.lng) {
        (Some(latitude), Some(longitude)) => {
            let center = Coordinates::new(latitude, longitude);
            check_coordinates("center", &center)?;
            Some(center)
        }
        _ => None,
    };

    let request = LocationSearchRequest {
        query: params.q,
        center,
        radius,
        limit,
    };
    info!(query = %request.query, ?center, radius, limit, "location search request");
    Ok(Envelope::new(state.locations.search_locations(&request)?))
}

pub async fn nearby_stations(
    State(state): State<AppState>,
    payload: Result<Json<NearbyStationsBody>, JsonRejection>,
) -> Result<Envelope<Vec<Station>>, ApiError> {
    let Json(body) = payload?;
    check_coordinates("coordinates", &body.coordinates)?;
    let max_distance = in_range("maxDistance", body.max_distance.unwrap_or(1000.0), 100.0, 10000.0)?;
    let limit = in_range("limit", body.limit.unwrap_or(10), 1, 50)?;

    let stations = state
        .locations
        .find_nearby_stations(&body.coordinates, max_distance, limit)?;
    let count = stations.len();
    Ok(Envelope::new(stations).count(count))
}

pub async fn details(
    State(state): State<AppState>,
    payload: Result<Json<Coordinates>, JsonRejection>,
) -> Result<Envelope<LocationDetails>, ApiError> {
    let Json(coordinates) = payload?;
    check_coordinates("coordinates", &coordinates)?;
    Ok(Envelope::new(state.locations.location_details(&coordinates)?))
}

pub async fn cities(State(state): State<AppState>) -> Envelope<Vec<City>> {
    let cities = state.dataset.cities().to_vec();
    let count = cities.len();
    Envelope::new(cities).count(count)
}

pub async fn city(State(state): State<AppState>, Path(id): Path<String>) -> Result<Envelope<City>, ApiError> {
    state
        .dataset
        .city_by_id(&id)
        .cloned()
        .map(Envelope::new)
        .ok_or_else(|| ApiError::LocationNotFound(format!("City not found: {id}")))
}

pub async fn stations(
    State(state): State<AppState>,
    params: Result<Query<StationsParams>, QueryRejection>,
) -> Result<Envelope<Vec<Station>>, ApiError> {
    let Query(params) = params?;
    info!(mode = ?params.mode, "stations request");

    let stations: Vec<Station> = match params.mode {
        Some(mode) => state.dataset.stations_by_mode(mode).cloned().collect(),
        None => state.dataset.stations().to_vec(),
    };
    let count = stations.len();
    let mode = params.mode.map_or("all", |mode| mode.as_str());
    Ok(Envelope::new(stations).count(count).mode(mode))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_range_bounds_are_inclusive() {
        assert_eq!(in_range("limit", 1, 1, 50).unwrap(), 1);
        assert_eq!(in_range("limit", 50, 1, 50).unwrap(), 50);
        assert!(in_range("limit", 51, 1, 50).is_err());
        assert!(in_range("radius", 99.0, 100.0, 50000.0).is_err());
    }
}
