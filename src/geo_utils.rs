//! # Geographic Utilities
//!
//! Distance and summary helpers for trajectory points.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two points, in meters |
//! | [`distance_km`] | Great-circle distance between two coordinate pairs, in kilometers |
//! | [`polyline_length_km`] | Total length of a trajectory in kilometers |
//! | [`median`] | Median of a coordinate buffer |
//!
//! ## Haversine Formula
//!
//! Distances assume a spherical Earth with the mean radius used by the `geo`
//! crate (6,371,008.8 m). Accuracy is within ~0.5% of the ellipsoidal distance,
//! which is well below GPS noise for the sub-kilometer radii used in compression.
//!
//! Coordinates are WGS84 degrees. NaN or out-of-range inputs are not checked
//! here; the result for such inputs is unspecified (typically NaN).

use geo::{Distance, Haversine, Point};

use crate::TrajPoint;

/// Great-circle distance in meters between two trajectory points.
///
/// ```rust
/// use tracecompress::{TrajPoint, geo_utils};
///
/// let london = TrajPoint::new(51.5074, -0.1278, 0);
/// let paris = TrajPoint::new(48.8566, 2.3522, 0);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &TrajPoint, p2: &TrajPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Great-circle distance in kilometers between two (latitude, longitude) pairs.
///
/// This is the cluster-membership metric of the compression engine.
#[inline]
pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    Haversine::distance(Point::new(lng1, lat1), Point::new(lng2, lat2)) / 1000.0
}

/// Total length of a trajectory in kilometers.
///
/// Empty or single-point trajectories have length 0.
pub fn polyline_length_km(points: &[TrajPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum::<f64>()
        / 1000.0
}

/// Median of `values`, reordering the slice in place.
///
/// Odd lengths give the middle sorted value, even lengths the mean of the two
/// middle values. Returns `None` for an empty slice.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(f64::total_cmp);

    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_km_matches_meters() {
        let a = TrajPoint::new(45.0, 7.0, 0);
        let b = TrajPoint::new(45.01, 7.01, 0);
        let km = distance_km(a.latitude, a.longitude, b.latitude, b.longitude);
        assert!((km * 1000.0 - haversine_distance(&a, &b)).abs() < 1e-6);
    }

    #[test]
    fn test_distance_km_same_point() {
        assert_eq!(distance_km(10.0, 20.0, 10.0, 20.0), 0.0);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_polyline_length_single_point() {
        assert_eq!(polyline_length_km(&[TrajPoint::new(0.0, 0.0, 0)]), 0.0);
    }
}
