//! Baseline itineraries built straight from the tables.
//!
//! These are the raw material for route synthesis: walk + ride + walk via the
//! nearest stations, walk + bus + walk via nearby stops, and a direct taxi.

use chrono::Utc;

use super::Dataset;
use crate::error::SynthesisError;
use crate::geo::{distance_km, Coordinates};
use crate::model::{Route, RouteKind, RouteSegment, Station, TransportMode};

pub const WALKING_SPEED_KMH: f64 = 5.0;

/// Flat fare charged for the ride leg of the fastest template.
const FASTEST_RIDE_FARE: u32 = 25;
/// Flat fare charged for the bus leg of the cheapest template.
const CHEAPEST_RIDE_FARE: u32 = 15;
/// Bus stops further than this from either end rule out the cheapest template.
pub const BUS_STOP_REACH_M: f64 = 500.0;

pub fn minutes(distance_km: f64, speed_kmh: f64) -> u32 {
    (distance_km / speed_kmh * 60.0).ceil() as u32
}

pub fn route_id(kind: RouteKind) -> String {
    format!("route_{}_{}", kind.as_str(), Utc::now().timestamp_millis())
}

/// Wraps `segments` into a route, deriving aggregates and carbon footprint.
pub fn assemble(dataset: &Dataset, id: String, kind: RouteKind, segments: Vec<RouteSegment>) -> Result<Route, SynthesisError> {
    let carbon = dataset.carbon_footprint(&segments);
    let route = Route::new(id, kind, segments, carbon);
    if !route.total_distance.is_finite() || !route.carbon_footprint.is_finite() {
        return Err(SynthesisError::NonFiniteMetrics(kind));
    }
    Ok(route)
}

pub fn walk(from: Station, to: Station, instruction: String) -> RouteSegment {
    let distance = distance_km(&from.coordinates, &to.coordinates);
    RouteSegment {
        mode: TransportMode::Walk,
        from,
        to,
        duration: minutes(distance, WALKING_SPEED_KMH),
        cost: 0,
        distance,
        instructions: vec![instruction],
        line: None,
    }
}

fn ride(from: &Station, to: &Station, mode: TransportMode, speed_kmh: f64, fare: u32) -> RouteSegment {
    let distance = distance_km(&from.coordinates, &to.coordinates);
    let line = from.lines.first().cloned();
    let via = line.as_deref().unwrap_or(mode.display_name());
    RouteSegment {
        mode,
        from: from.clone(),
        to: to.clone(),
        duration: minutes(distance, speed_kmh),
        cost: fare,
        distance,
        instructions: vec![format!("搭乘{via}至{}", to.name)],
        line,
    }
}

impl Dataset {
    /// Grams of CO2 for the given legs; modes without figures contribute 0.
    pub fn carbon_footprint(&self, segments: &[RouteSegment]) -> f64 {
        segments
            .iter()
            .filter_map(|segment| {
                self.transport_info_for(segment.mode)
                    .map(|info| info.carbon_per_km * segment.distance)
            })
            .sum()
    }

    /// The available baseline templates: fastest, cheapest, least-transfer.
    pub fn generate_mock_routes(&self, origin: &Coordinates, destination: &Coordinates) -> Result<Vec<Route>, SynthesisError> {
        let mut routes = Vec::with_capacity(3);
        routes.extend(fastest_template(self, origin, destination)?);
        routes.extend(cheapest_template(self, origin, destination)?);
        routes.extend(least_transfer_template(self, origin, destination)?);
        Ok(routes)
    }
}

/// Walk to the nearest station, ride to the station nearest the destination, walk on.
pub fn fastest_template(dataset: &Dataset, origin: &Coordinates, destination: &Coordinates) -> Result<Option<Route>, SynthesisError> {
    let (Some(start), Some(end)) = (dataset.nearest_station(origin), dataset.nearest_station(destination)) else {
        return Ok(None);
    };
    let info = dataset
        .transport_info_for(start.mode)
        .ok_or(SynthesisError::MissingTransportInfo(start.mode))?;

    let segments = vec![
        walk(Station::origin(*origin), start.clone(), format!("步行至{}", start.name)),
        ride(start, end, start.mode, info.avg_speed, FASTEST_RIDE_FARE),
        walk(end.clone(), Station::destination(*destination), "步行至目的地".to_string()),
    ];
    assemble(dataset, route_id(RouteKind::Fastest), RouteKind::Fastest, segments).map(Some)
}

/// Walk + bus + walk; only offered when a bus stop is within reach of both ends.
pub fn cheapest_template(dataset: &Dataset, origin: &Coordinates, destination: &Coordinates) -> Result<Option<Route>, SynthesisError> {
    let (Some(start), Some(end)) = (
        dataset.nearest_of_mode(origin, TransportMode::Bus, BUS_STOP_REACH_M),
        dataset.nearest_of_mode(destination, TransportMode::Bus, BUS_STOP_REACH_M),
    ) else {
        return Ok(None);
    };
    let info = dataset
        .transport_info_for(TransportMode::Bus)
        .ok_or(SynthesisError::MissingTransportInfo(TransportMode::Bus))?;

    let segments = vec![
        walk(Station::origin(*origin), start.clone(), format!("步行至{}", start.name)),
        ride(start, end, TransportMode::Bus, info.avg_speed, CHEAPEST_RIDE_FARE),
        walk(end.clone(), Station::destination(*destination), "步行至目的地".to_string()),
    ];
    assemble(dataset, route_id(RouteKind::Cheapest), RouteKind::Cheapest, segments).map(Some)
}

/// A single taxi leg straight to the destination.
pub fn least_transfer_template(dataset: &Dataset, origin: &Coordinates, destination: &Coordinates) -> Result<Option<Route>, SynthesisError> {
    let info = dataset
        .transport_info_for(TransportMode::Taxi)
        .ok_or(SynthesisError::MissingTransportInfo(TransportMode::Taxi))?;
    let distance = distance_km(origin, destination);

    let segments = vec![RouteSegment {
        mode: TransportMode::Taxi,
        from: Station::origin(*origin),
        to: Station::destination(*destination),
        duration: minutes(distance, info.avg_speed),
        cost: (distance * info.cost_per_km).ceil() as u32,
        distance,
        instructions: vec!["搭乘計程車直達目的地".to_string()],
        line: None,
    }];
    assemble(dataset, route_id(RouteKind::LeastTransfer), RouteKind::LeastTransfer, segments).map(Some)
}
