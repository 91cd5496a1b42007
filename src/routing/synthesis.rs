//! Turns the baseline templates into the candidate set returned to clients.
//!
//! Four candidates are built independently (fastest, cheapest, least-transfer,
//! eco). Each builder reports `Ok(None)` when it does not apply and `Err` when
//! it could not be computed. Survivors are filtered by the rider's
//! preferences, deduplicated and optionally sorted. When nothing survives a
//! walking route is offered for short trips.

use std::collections::HashSet;

use tracing::warn;

use crate::dataset::templates::{
    self, assemble, cheapest_template, fastest_template, least_transfer_template, minutes, route_id,
};
use crate::dataset::Dataset;
use crate::error::SynthesisError;
use crate::geo::{distance_km, Coordinates};
use crate::model::{Preferences, Priority, Route, RouteKind, RouteSegment, Station, TransportMode};

/// Bus legs longer than this are considered for an MRT swap.
const SLOW_BUS_MINUTES: u32 = 30;
/// Trips up to this length get a walking route when nothing else is available.
pub const FALLBACK_WALK_MAX_KM: f64 = 5.0;
/// Bucket width for minutes and TWD when comparing routes.
const SIGNATURE_BUCKET: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisOutcome {
    /// Every candidate was computed.
    Complete(Vec<Route>),
    /// Some candidates failed; the rest are usable.
    Partial {
        routes: Vec<Route>,
        failures: Vec<SynthesisError>,
    },
    /// No candidate survived; `route` is the walking fallback, if the trip allows one.
    Fallback {
        route: Option<Route>,
        failures: Vec<SynthesisError>,
    },
}

impl SynthesisOutcome {
    pub fn routes(&self) -> &[Route] {
        match self {
            SynthesisOutcome::Complete(routes) | SynthesisOutcome::Partial { routes, .. } => routes,
            SynthesisOutcome::Fallback { route, .. } => route.as_slice(),
        }
    }

    /// True when candidates failed outright, rather than being filtered by preferences.
    pub fn is_degraded(&self) -> bool {
        matches!(self, SynthesisOutcome::Fallback { failures, .. } if !failures.is_empty())
    }

    pub fn into_routes(self) -> Vec<Route> {
        match self {
            SynthesisOutcome::Complete(routes) | SynthesisOutcome::Partial { routes, .. } => routes,
            SynthesisOutcome::Fallback { route, .. } => route.into_iter().collect(),
        }
    }

    pub fn failures(&self) -> &[SynthesisError] {
        match self {
            SynthesisOutcome::Complete(_) => &[],
            SynthesisOutcome::Partial { failures, .. } | SynthesisOutcome::Fallback { failures, .. } => failures,
        }
    }
}

pub fn synthesize(
    dataset: &Dataset,
    origin: &Coordinates,
    destination: &Coordinates,
    preferences: Option<&Preferences>,
) -> SynthesisOutcome {
    let candidates = [
        fastest_route(dataset, origin, destination),
        cheapest_route(dataset, origin, destination),
        least_transfer_route(dataset, origin, destination),
        eco_route(dataset, origin, destination),
    ];

    let mut routes = Vec::with_capacity(candidates.len());
    let mut failures = Vec::new();
    for candidate in candidates {
        match candidate {
            Ok(Some(route)) => routes.push(route),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, ?origin, ?destination, "route candidate failed");
                failures.push(err);
            }
        }
    }

    if let Some(preferences) = preferences {
        routes.retain(|route| admits(route, preferences));
    }
    let mut routes = remove_duplicate_routes(routes);

    if routes.is_empty() {
        let route = fallback_route(origin, destination).filter(|route| {
            preferences.map_or(true, |preferences| admits(route, preferences))
        });
        return SynthesisOutcome::Fallback { route, failures };
    }

    if let Some(priority) = preferences.and_then(|p| p.prioritize) {
        sort_routes(&mut routes, priority);
    }

    if failures.is_empty() {
        SynthesisOutcome::Complete(routes)
    } else {
        SynthesisOutcome::Partial { routes, failures }
    }
}

fn fastest_route(dataset: &Dataset, origin: &Coordinates, destination: &Coordinates) -> Result<Option<Route>, SynthesisError> {
    fastest_template(dataset, origin, destination)?
        .map(|route| optimize_for_time(dataset, route))
        .transpose()
}

fn cheapest_route(dataset: &Dataset, origin: &Coordinates, destination: &Coordinates) -> Result<Option<Route>, SynthesisError> {
    cheapest_template(dataset, origin, destination)?
        .map(|route| optimize_for_cost(dataset, route))
        .transpose()
}

fn least_transfer_route(dataset: &Dataset, origin: &Coordinates, destination: &Coordinates) -> Result<Option<Route>, SynthesisError> {
    least_transfer_template(dataset, origin, destination)
}

/// The template with the lowest carbon footprint, relabelled.
fn eco_route(dataset: &Dataset, origin: &Coordinates, destination: &Coordinates) -> Result<Option<Route>, SynthesisError> {
    let greenest = dataset
        .generate_mock_routes(origin, destination)?
        .into_iter()
        .min_by(|a, b| a.carbon_footprint.total_cmp(&b.carbon_footprint));
    Ok(greenest.map(|route| Route {
        id: route_id(RouteKind::Eco),
        kind: RouteKind::Eco,
        ..route
    }))
}

/// Replaces bus legs over half an hour with MRT when that is quicker.
pub fn optimize_for_time(dataset: &Dataset, route: Route) -> Result<Route, SynthesisError> {
    let Some(mrt) = dataset.transport_info_for(TransportMode::Mrt) else {
        return Ok(route);
    };
    let segments = route
        .segments
        .into_iter()
        .map(|segment| {
            if segment.mode != TransportMode::Bus || segment.duration <= SLOW_BUS_MINUTES {
                return segment;
            }
            let duration = minutes(segment.distance, mrt.avg_speed);
            if duration >= segment.duration {
                return segment;
            }
            RouteSegment {
                mode: TransportMode::Mrt,
                duration,
                cost: (segment.distance * mrt.cost_per_km).ceil() as u32,
                instructions: vec![format!("搭乘捷運至{}", segment.to.name)],
                line: None,
                ..segment
            }
        })
        .collect();
    assemble(dataset, route.id, route.kind, segments)
}

/// Replaces taxi legs with a bus when the bus fare is lower.
pub fn optimize_for_cost(dataset: &Dataset, route: Route) -> Result<Route, SynthesisError> {
    let Some(bus) = dataset.transport_info_for(TransportMode::Bus) else {
        return Ok(route);
    };
    let segments = route
        .segments
        .into_iter()
        .map(|segment| {
            if segment.mode != TransportMode::Taxi {
                return segment;
            }
            let cost = (segment.distance * bus.cost_per_km).ceil() as u32;
            if cost >= segment.cost {
                return segment;
            }
            RouteSegment {
                mode: TransportMode::Bus,
                duration: minutes(segment.distance, bus.avg_speed),
                cost,
                instructions: vec![format!("搭乘公車至{}", segment.to.name)],
                line: None,
                ..segment
            }
        })
        .collect();
    assemble(dataset, route.id, route.kind, segments)
}

/// Walk the whole way, for trips of at most 5 km.
pub fn fallback_route(origin: &Coordinates, destination: &Coordinates) -> Option<Route> {
    let distance = distance_km(origin, destination);
    if distance.is_nan() || distance > FALLBACK_WALK_MAX_KM {
        return None;
    }
    let segment = templates::walk(
        Station::origin(*origin),
        Station::destination(*destination),
        "步行至目的地".to_string(),
    );
    Some(Route::new(route_id(RouteKind::Walking), RouteKind::Walking, vec![segment], 0.0))
}

fn admits(route: &Route, preferences: &Preferences) -> bool {
    if route.modes().any(|mode| preferences.avoid_modes.contains(&mode)) {
        return false;
    }
    match preferences.max_walking_distance {
        Some(max_m) => route
            .segments
            .iter()
            .filter(|s| s.mode == TransportMode::Walk)
            .all(|s| s.distance * 1000.0 <= max_m),
        None => true,
    }
}

fn bucket(value: u32) -> u32 {
    ((value as f64 / SIGNATURE_BUCKET).round() * SIGNATURE_BUCKET) as u32
}

/// Mode sequence plus time and cost rounded to 5-unit buckets.
pub fn route_signature(route: &Route) -> String {
    let modes: Vec<&str> = route.modes().map(|mode| mode.as_str()).collect();
    format!("{}-{}-{}", modes.join("-"), bucket(route.total_time), bucket(route.total_cost))
}

/// Keeps the first route for each signature, preserving order.
pub fn remove_duplicate_routes(routes: Vec<Route>) -> Vec<Route> {
    let mut seen = HashSet::new();
    routes
        .into_iter()
        .filter(|route| seen.insert(route_signature(route)))
        .collect()
}

/// Stable ascending sort on the metric named by `priority`.
pub fn sort_routes(routes: &mut [Route], priority: Priority) {
    match priority {
        Priority::Time => routes.sort_by_key(|r| r.total_time),
        Priority::Cost => routes.sort_by_key(|r| r.total_cost),
        Priority::Transfers => routes.sort_by_key(|r| r.transfers),
        Priority::Eco => routes.sort_by(|a, b| a.carbon_footprint.total_cmp(&b.carbon_footprint)),
    }
}
