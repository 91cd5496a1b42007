use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Walk,
    Bus,
    Mrt,
    Train,
    Hsr,
    Youbike,
    Taxi,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Walk => "walk",
            TransportMode::Bus => "bus",
            TransportMode::Mrt => "mrt",
            TransportMode::Train => "train",
            TransportMode::Hsr => "hsr",
            TransportMode::Youbike => "youbike",
            TransportMode::Taxi => "taxi",
        }
    }

    /// Name used in rider-facing instructions when a station serves no named line.
    pub fn display_name(&self) -> &'static str {
        match self {
            TransportMode::Walk => "步行",
            TransportMode::Bus => "公車",
            TransportMode::Mrt => "捷運",
            TransportMode::Train => "台鐵",
            TransportMode::Hsr => "高鐵",
            TransportMode::Youbike => "YouBike",
            TransportMode::Taxi => "計程車",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub coordinates: Coordinates,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub coordinates: Coordinates,
    #[serde(rename = "type")]
    pub mode: TransportMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Station {
    /// Pseudo-station standing for a journey's origin or destination.
    pub fn endpoint(id: &str, name: &str, coordinates: Coordinates) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            coordinates,
            mode: TransportMode::Walk,
            lines: Vec::new(),
            address: None,
        }
    }

    pub fn origin(coordinates: Coordinates) -> Self {
        Self::endpoint("origin", "起點", coordinates)
    }

    pub fn destination(coordinates: Coordinates) -> Self {
        Self::endpoint("destination", "終點", coordinates)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub start_time: String,
    pub end_time: String,
    /// Minutes between departures, 0 when the mode runs on demand.
    pub frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportInfo {
    pub mode: TransportMode,
    pub name: String,
    /// km/h
    pub avg_speed: f64,
    pub cost_per_km: f64,
    /// grams of CO2 per km
    pub carbon_per_km: f64,
    pub availability: Availability,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub id: String,
    pub name: String,
    pub english_name: String,
    pub coordinates: Coordinates,
    pub popular_destinations: Vec<Location>,
    pub transport_hubs: Vec<Station>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSegment {
    pub mode: TransportMode,
    pub from: Station,
    pub to: Station,
    /// minutes
    pub duration: u32,
    /// TWD
    pub cost: u32,
    /// km
    pub distance: f64,
    pub instructions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    Fastest,
    Cheapest,
    LeastTransfer,
    Eco,
    Walking,
}

impl RouteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteKind::Fastest => "fastest",
            RouteKind::Cheapest => "cheapest",
            RouteKind::LeastTransfer => "least_transfer",
            RouteKind::Eco => "eco",
            RouteKind::Walking => "walking",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RouteKind,
    pub total_time: u32,
    pub total_cost: u32,
    pub total_distance: f64,
    pub transfers: u32,
    pub segments: Vec<RouteSegment>,
    pub carbon_footprint: f64,
}

impl Route {
    /// Builds a route whose aggregates are derived from `segments`.
    pub fn new(id: String, kind: RouteKind, segments: Vec<RouteSegment>, carbon_footprint: f64) -> Self {
        let total_time = segments.iter().map(|s| s.duration).sum();
        let total_cost = segments.iter().map(|s| s.cost).sum();
        let total_distance = segments.iter().map(|s| s.distance).sum();
        let transfers = count_transfers(&segments);
        Self {
            id,
            kind,
            total_time,
            total_cost,
            total_distance,
            transfers,
            segments,
            carbon_footprint,
        }
    }

    pub fn modes(&self) -> impl Iterator<Item = TransportMode> + '_ {
        self.segments.iter().map(|s| s.mode)
    }
}

/// Number of mode changes between consecutive segments.
pub fn count_transfers(segments: &[RouteSegment]) -> u32 {
    segments
        .windows(2)
        .filter(|pair| pair[0].mode != pair[1].mode)
        .count() as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Time,
    Cost,
    Transfers,
    Eco,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prioritize: Option<Priority>,
    /// metres
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_walking_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub avoid_modes: Vec<TransportMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub origin: Coordinates,
    pub destination: Coordinates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResponse {
    pub routes: Vec<Route>,
    pub origin: Location,
    pub destination: Location,
    pub search_time: String,
    pub alternatives: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStats {
    pub cache_size: usize,
    pub cache_hit_rate: f64,
    pub total_calculations: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationSearchRequest {
    pub query: String,
    pub center: Option<Coordinates>,
    /// metres
    pub radius: f64,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSearchResponse {
    pub locations: Vec<Location>,
    pub query: String,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDetails {
    pub location: Location,
    pub nearby_stations: Vec<Station>,
    pub estimated_address: String,
}

/// Current UTC time as an ISO-8601 string with millisecond precision.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(mode: TransportMode, duration: u32, cost: u32) -> RouteSegment {
        let here = Coordinates::new(25.0, 121.5);
        RouteSegment {
            mode,
            from: Station::origin(here),
            to: Station::destination(here),
            duration,
            cost,
            distance: 1.0,
            instructions: Vec::new(),
            line: None,
        }
    }

    #[test]
    fn test_route_totals_are_sums_of_segments() {
        let route = Route::new(
            "r".into(),
            RouteKind::Fastest,
            vec![
                leg(TransportMode::Walk, 4, 0),
                leg(TransportMode::Mrt, 12, 25),
                leg(TransportMode::Walk, 3, 0),
            ],
            15.0,
        );
        assert_eq!(route.total_time, 19);
        assert_eq!(route.total_cost, 25);
        assert_eq!(route.total_distance, 3.0);
        assert_eq!(route.transfers, 2);
    }

    #[test]
    fn test_single_leg_has_no_transfers() {
        assert_eq!(count_transfers(&[leg(TransportMode::Taxi, 10, 200)]), 0);
        assert_eq!(count_transfers(&[]), 0);
    }

    #[test]
    fn test_preferences_wire_format() {
        let prefs: Preferences = serde_json::from_str(
            r#"{"prioritize":"eco","maxWalkingDistance":800,"avoidModes":["bus"]}"#,
        )
        .unwrap();
        assert_eq!(prefs.prioritize, Some(Priority::Eco));
        assert_eq!(prefs.max_walking_distance, Some(800.0));
        assert_eq!(prefs.avoid_modes, vec![TransportMode::Bus]);
        assert_eq!(serde_json::to_string(&Preferences::default()).unwrap(), "{}");
    }

    #[test]
    fn test_station_serializes_mode_as_type() {
        let station = Station::origin(Coordinates::new(25.0, 121.5));
        let json = serde_json::to_value(&station).unwrap();
        assert_eq!(json["type"], "walk");
        assert!(json.get("lines").is_none());
    }
}
