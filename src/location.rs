use std::sync::Arc;

use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::error::ApiError;
use crate::geo::{distance_km, Coordinates};
use crate::model::{Location, LocationDetails, LocationSearchRequest, LocationSearchResponse, Station};

/// Approximate bounding box of Taiwan and its outlying islands.
const TAIWAN_SOUTH: f64 = 21.9;
const TAIWAN_NORTH: f64 = 25.3;
const TAIWAN_WEST: f64 = 119.3;
const TAIWAN_EAST: f64 = 122.0;

const REVERSE_GEOCODE_RADIUS_M: f64 = 2000.0;
const STATION_ADDRESS_KM: f64 = 0.5;
const STATION_NAME_KM: f64 = 0.2;
const GEOCODE_LIMIT: usize = 10;

const DETAILS_RADIUS_M: f64 = 1000.0;
const DETAILS_STATION_LIMIT: usize = 5;

/// (south, north, west, east, name); first match wins.
const REGIONS: [(f64, f64, f64, f64, &str); 6] = [
    (24.9, 25.3, 121.3, 121.7, "台北市"),
    (24.0, 24.3, 120.5, 120.8, "台中市"),
    (22.5, 22.8, 120.2, 120.4, "高雄市"),
    (22.9, 23.1, 120.1, 120.3, "台南市"),
    (24.7, 25.0, 121.4, 121.8, "新北市"),
    (24.9, 25.0, 121.1, 121.4, "桃園市"),
];
const DEFAULT_REGION: &str = "台灣";

pub fn validate_coordinates(coordinates: &Coordinates) -> bool {
    let Coordinates { latitude, longitude } = *coordinates;
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

pub fn is_in_taiwan(coordinates: &Coordinates) -> bool {
    (TAIWAN_SOUTH..=TAIWAN_NORTH).contains(&coordinates.latitude)
        && (TAIWAN_WEST..=TAIWAN_EAST).contains(&coordinates.longitude)
}

/// Coarse city guess from fixed lat/lon boxes.
pub fn estimate_region(coordinates: &Coordinates) -> &'static str {
    REGIONS
        .iter()
        .find(|(south, north, west, east, _)| {
            (*south..=*north).contains(&coordinates.latitude) && (*west..=*east).contains(&coordinates.longitude)
        })
        .map_or(DEFAULT_REGION, |region| region.4)
}

/// Rounds coordinates to 6 decimals and trims text fields.
pub fn format_location(location: Location) -> Location {
    let round6 = |v: f64| (v * 1e6).round() / 1e6;
    Location {
        coordinates: Coordinates::new(round6(location.coordinates.latitude), round6(location.coordinates.longitude)),
        address: location.address.trim().to_string(),
        name: location
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()),
    }
}

pub struct LocationService {
    dataset: Arc<Dataset>,
}

impl LocationService {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self { dataset }
    }

    pub fn reverse_geocode(&self, coordinates: &Coordinates) -> Result<Location, ApiError> {
        debug!(?coordinates, "reverse geocoding");

        if !validate_coordinates(coordinates) {
            return Err(ApiError::InvalidCoordinates("Invalid coordinates provided".into()));
        }
        if !is_in_taiwan(coordinates) {
            return Err(ApiError::LocationNotFound("Location is outside Taiwan".into()));
        }

        if let Some(station) = self
            .dataset
            .nearest_stations(coordinates, REVERSE_GEOCODE_RADIUS_M, 1)
            .first()
        {
            let distance = distance_km(coordinates, &station.coordinates);
            let address = if distance < STATION_ADDRESS_KM {
                station.name.clone()
            } else {
                format!("{}附近", station.name)
            };
            return Ok(Location {
                coordinates: *coordinates,
                address,
                name: (distance < STATION_NAME_KM).then(|| station.name.clone()),
            });
        }

        Ok(Location {
            coordinates: *coordinates,
            address: estimate_region(coordinates).to_string(),
            name: None,
        })
    }

    pub fn geocode(&self, address: &str) -> Result<Vec<Location>, ApiError> {
        debug!(address, "geocoding");

        let address = address.trim();
        if address.is_empty() {
            return Err(ApiError::BadRequest("Address cannot be empty".into()));
        }

        let results = self.dataset.search(address, GEOCODE_LIMIT);
        if results.is_empty() {
            return Err(ApiError::LocationNotFound(format!(
                "No locations found for address: {address}"
            )));
        }
        Ok(results.into_iter().map(format_location).collect())
    }

    /// Stations within `max_distance_m` metres, nearest first.
    pub fn find_nearby_stations(
        &self,
        coordinates: &Coordinates,
        max_distance_m: f64,
        limit: usize,
    ) -> Result<Vec<Station>, ApiError> {
        if !validate_coordinates(coordinates) {
            return Err(ApiError::InvalidCoordinates("Invalid coordinates provided".into()));
        }

        let stations: Vec<Station> = self
            .dataset
            .nearest_stations(coordinates, max_distance_m, limit)
            .into_iter()
            .cloned()
            .collect();
        info!(found = stations.len(), max_distance_m, limit, "nearby stations");
        Ok(stations)
    }

    pub fn search_locations(&self, request: &LocationSearchRequest) -> Result<LocationSearchResponse, ApiError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(ApiError::BadRequest("Search query cannot be empty".into()));
        }

        let mut results = self.dataset.search(query, request.limit * 2);

        match request.center.filter(validate_coordinates) {
            Some(center) => {
                let radius_km = request.radius / 1000.0;
                let mut ranked: Vec<(Location, f64)> = results
                    .into_iter()
                    .map(|location| {
                        let distance = distance_km(&center, &location.coordinates);
                        (location, distance)
                    })
                    .filter(|(_, distance)| *distance <= radius_km)
                    .collect();
                ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
                results = ranked
                    .into_iter()
                    .take(request.limit)
                    .map(|(location, _)| location)
                    .collect();
            }
            None => results.truncate(request.limit),
        }

        let locations: Vec<Location> = results.into_iter().map(format_location).collect();
        Ok(LocationSearchResponse {
            total: locations.len(),
            query: request.query.clone(),
            locations,
        })
    }

    pub fn location_details(&self, coordinates: &Coordinates) -> Result<LocationDetails, ApiError> {
        let location = self.reverse_geocode(coordinates)?;
        let nearby_stations = self.find_nearby_stations(coordinates, DETAILS_RADIUS_M, DETAILS_STATION_LIMIT)?;
        Ok(LocationDetails {
            location,
            nearby_stations,
            estimated_address: estimate_region(coordinates).to_string(),
        })
    }
}
