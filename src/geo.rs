use serde::{Deserialize, Serialize};

/// Mean Earth radius in km.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

// Calculate haversine distance between two GPS coordinates (returns km)
pub fn distance_km(a: &Coordinates, b: &Coordinates) -> f64 {
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_distance_taipei_main_to_taipei_101() {
        let main_station = Coordinates::new(25.0478, 121.5170);
        let taipei_101 = Coordinates::new(25.0340, 121.5645);
        assert_relative_eq!(distance_km(&main_station, &taipei_101), 5.025, epsilon = 0.01);
    }

    #[test]
    fn test_distance_is_symmetric_and_zero_on_self() {
        let a = Coordinates::new(22.6391, 120.3018);
        let b = Coordinates::new(24.1369, 120.6861);
        assert_relative_eq!(distance_km(&a, &b), distance_km(&b, &a), epsilon = 1e-9);
        assert_eq!(distance_km(&a, &a), 0.0);
    }

    #[test]
    fn test_nan_propagates() {
        let a = Coordinates::new(f64::NAN, 121.0);
        let b = Coordinates::new(25.0, 121.0);
        assert!(distance_km(&a, &b).is_nan());
    }
}
