//! Read-only tables of cities, stations and per-mode transport figures.
//!
//! The built-in tables ship as CSV under `data/` and are parsed once at
//! startup. Services receive the result as an `Arc<Dataset>`; tests can build
//! their own with [`Dataset::from_parts`].

pub mod templates;

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::error::DatasetError;
use crate::geo::{distance_km, Coordinates};
use crate::model::{Availability, City, Location, Station, TransportInfo, TransportMode};

const CITIES_CSV: &str = include_str!("../../data/cities.csv");
const DESTINATIONS_CSV: &str = include_str!("../../data/destinations.csv");
const STATIONS_CSV: &str = include_str!("../../data/stations.csv");
const TRANSPORT_MODES_CSV: &str = include_str!("../../data/transport_modes.csv");

/// How many MRT stations the Taipei hub list takes from the start of the table.
const TAIPEI_MRT_HUBS: usize = 10;

// CSV rows
#[derive(Debug, Deserialize)]
struct CityRow {
    id: String,
    name: String,
    english_name: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct DestinationRow {
    city_id: String,
    name: String,
    address: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct StationRow {
    id: String,
    name: String,
    mode: TransportMode,
    latitude: f64,
    longitude: f64,
    lines: String,
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransportModeRow {
    mode: TransportMode,
    name: String,
    avg_speed_kmh: f64,
    cost_per_km: f64,
    carbon_per_km: f64,
    start_time: String,
    end_time: String,
    frequency_min: u32,
}

fn read_table<T: for<'de> Deserialize<'de>>(table: &'static str, data: &str) -> Result<Vec<T>, DatasetError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: T = result.map_err(|source| DatasetError::Csv { table, source })?;
        rows.push(row);
    }
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct Dataset {
    cities: Vec<City>,
    stations: Vec<Station>,
    transport_info: Vec<TransportInfo>,
}

impl Dataset {
    /// Loads the built-in Taiwan tables.
    pub fn taiwan() -> Result<Self, DatasetError> {
        let city_rows: Vec<CityRow> = read_table("cities.csv", CITIES_CSV)?;
        let destination_rows: Vec<DestinationRow> = read_table("destinations.csv", DESTINATIONS_CSV)?;
        let station_rows: Vec<StationRow> = read_table("stations.csv", STATIONS_CSV)?;
        let mode_rows: Vec<TransportModeRow> = read_table("transport_modes.csv", TRANSPORT_MODES_CSV)?;

        let mut destinations_by_city: HashMap<String, Vec<Location>> = HashMap::new();
        for row in destination_rows {
            destinations_by_city.entry(row.city_id).or_default().push(Location {
                coordinates: Coordinates::new(row.latitude, row.longitude),
                address: row.address,
                name: Some(row.name),
            });
        }

        let cities: Vec<City> = city_rows
            .into_iter()
            .map(|row| City {
                popular_destinations: destinations_by_city.remove(&row.id).unwrap_or_default(),
                id: row.id,
                name: row.name,
                english_name: row.english_name,
                coordinates: Coordinates::new(row.latitude, row.longitude),
                transport_hubs: Vec::new(),
            })
            .collect();

        if let Some(city_id) = destinations_by_city.into_keys().next() {
            return Err(DatasetError::UnknownCity(city_id));
        }

        let stations = station_rows
            .into_iter()
            .map(|row| Station {
                id: row.id,
                name: row.name,
                coordinates: Coordinates::new(row.latitude, row.longitude),
                mode: row.mode,
                lines: row
                    .lines
                    .split('|')
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from)
                    .collect(),
                address: row.address.filter(|a| !a.is_empty()),
            })
            .collect();

        let transport_info = mode_rows
            .into_iter()
            .map(|row| TransportInfo {
                mode: row.mode,
                name: row.name,
                avg_speed: row.avg_speed_kmh,
                cost_per_km: row.cost_per_km,
                carbon_per_km: row.carbon_per_km,
                availability: Availability {
                    start_time: row.start_time,
                    end_time: row.end_time,
                    frequency: row.frequency_min,
                },
            })
            .collect();

        Self::from_parts(cities, stations, transport_info)
    }

    /// Builds a dataset from already-parsed tables and wires city transport hubs.
    pub fn from_parts(
        mut cities: Vec<City>,
        stations: Vec<Station>,
        transport_info: Vec<TransportInfo>,
    ) -> Result<Self, DatasetError> {
        let mut seen = HashSet::new();
        for station in &stations {
            if !seen.insert(station.id.as_str()) {
                return Err(DatasetError::DuplicateStation(station.id.clone()));
            }
        }

        if let Some(taipei) = cities.iter_mut().find(|city| city.id == "taipei") {
            let mrt = stations.iter().filter(|s| s.mode == TransportMode::Mrt).take(TAIPEI_MRT_HUBS);
            let bus = stations.iter().filter(|s| s.mode == TransportMode::Bus);
            let hsr = stations
                .iter()
                .filter(|s| s.mode == TransportMode::Hsr && (s.name.contains("台北") || s.name.contains("南港")));
            taipei.transport_hubs = mrt.chain(bus).chain(hsr).cloned().collect();
        }

        Ok(Self {
            cities,
            stations,
            transport_info,
        })
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn city_by_id(&self, id: &str) -> Option<&City> {
        self.cities.iter().find(|city| city.id == id)
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn stations_by_mode(&self, mode: TransportMode) -> impl Iterator<Item = &Station> + '_ {
        self.stations.iter().filter(move |s| s.mode == mode)
    }

    pub fn transport_info(&self) -> &[TransportInfo] {
        &self.transport_info
    }

    pub fn transport_info_for(&self, mode: TransportMode) -> Option<&TransportInfo> {
        self.transport_info.iter().find(|info| info.mode == mode)
    }

    /// Stations within `max_distance_m` metres, nearest first, at most `limit`.
    pub fn nearest_stations(&self, coordinates: &Coordinates, max_distance_m: f64, limit: usize) -> Vec<&Station> {
        let max_km = max_distance_m / 1000.0;
        let mut with_distance: Vec<(&Station, f64)> = self
            .stations
            .iter()
            .map(|station| (station, distance_km(coordinates, &station.coordinates)))
            .filter(|(_, d)| *d <= max_km)
            .collect();
        with_distance.sort_by(|a, b| a.1.total_cmp(&b.1));
        with_distance.into_iter().take(limit).map(|(s, _)| s).collect()
    }

    /// Nearest station of any mode, with no distance cap. Ties keep table order.
    pub fn nearest_station(&self, coordinates: &Coordinates) -> Option<&Station> {
        self.stations
            .iter()
            .map(|station| (station, distance_km(coordinates, &station.coordinates)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(s, _)| s)
    }

    pub fn nearest_of_mode(&self, coordinates: &Coordinates, mode: TransportMode, max_distance_m: f64) -> Option<&Station> {
        let max_km = max_distance_m / 1000.0;
        self.stations_by_mode(mode)
            .map(|station| (station, distance_km(coordinates, &station.coordinates)))
            .filter(|(_, d)| *d <= max_km)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(s, _)| s)
    }

    /// Case-insensitive substring match over popular destinations, then stations.
    pub fn search(&self, query: &str, limit: usize) -> Vec<Location> {
        let needle = query.to_lowercase();
        let destinations = self.cities.iter().flat_map(|city| city.popular_destinations.iter().cloned());
        let stations = self.stations.iter().map(|station| Location {
            coordinates: station.coordinates,
            address: station.address.clone().unwrap_or_else(|| station.name.clone()),
            name: Some(station.name.clone()),
        });

        destinations
            .chain(stations)
            .filter(|location| {
                location
                    .name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
                    || location.address.to_lowercase().contains(&needle)
            })
            .take(limit)
            .collect()
    }
}
