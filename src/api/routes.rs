use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::DateTime;
use tracing::info;

use super::response::Envelope;
use super::AppState;
use crate::error::ApiError;
use crate::geo::Coordinates;
use crate::location::validate_coordinates;
use crate::model::{RouteRequest, RouteResponse, RouteStats};

const MAX_WALKING_DISTANCE_M: f64 = 5000.0;

pub async fn calculate_routes(
    State(state): State<AppState>,
    payload: Result<Json<RouteRequest>, JsonRejection>,
) -> Result<Envelope<RouteResponse>, ApiError> {
    let Json(request) = payload?;
    validate_route_request(&request)?;

    let response = state.routes.calculate_routes(&request)?;
    info!(
        routes = response.routes.len(),
        origin = %response.origin.address,
        destination = %response.destination.address,
        "route calculation completed"
    );
    let message = format!("找到 {} 條路線", response.routes.len());
    Ok(Envelope::new(response).message(message))
}

pub async fn route_stats(State(state): State<AppState>) -> Envelope<RouteStats> {
    Envelope::new(state.routes.stats())
}

pub(crate) fn check_coordinates(field: &str, coordinates: &Coordinates) -> Result<(), ApiError> {
    if validate_coordinates(coordinates) {
        return Ok(());
    }
    let (axis, bound) = if (-90.0..=90.0).contains(&coordinates.latitude) {
        ("longitude", 180)
    } else {
        ("latitude", 90)
    };
    Err(ApiError::BadRequest(format!(
        "Validation error: \"{field}.{axis}\" must be between -{bound} and {bound}"
    )))
}

fn validate_route_request(request: &RouteRequest) -> Result<(), ApiError> {
    check_coordinates("origin", &request.origin)?;
    check_coordinates("destination", &request.destination)?;

    let Some(preferences) = &request.preferences else {
        return Ok(());
    };
    if let Some(max) = preferences.max_walking_distance {
        if !(0.0..=MAX_WALKING_DISTANCE_M).contains(&max) {
            return Err(ApiError::BadRequest(format!(
                "Validation error: \"preferences.maxWalkingDistance\" must be between 0 and {MAX_WALKING_DISTANCE_M}"
            )));
        }
    }
    if let Some(departure) = &preferences.departure_time {
        DateTime::parse_from_rfc3339(departure).map_err(|err| {
            ApiError::BadRequest(format!(
                "Validation error: \"preferences.departureTime\" must be an ISO 8601 date ({err})"
            ))
        })?;
    }
    Ok(())
}
