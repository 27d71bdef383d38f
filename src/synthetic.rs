//! Synthetic stop-and-go trajectories for stress testing and benchmarking.
//!
//! Each generated trajectory alternates *stops* (several fixes jittered around
//! one location) with *moves* (evenly spaced fixes along a random heading).
//! For a radius inside [`SyntheticScenario::compressible_radius_km`] every stop
//! collapses to exactly one point while every moving fix survives, which gives
//! an exact expected output size.
//!
//! Feature-gated behind `synthetic`; not included in production builds.
//!
//! # Example
//!
//! ```rust
//! use tracecompress::synthetic::SyntheticScenario;
//!
//! let scenario = SyntheticScenario::with_users(3, 42);
//! let generated = scenario.generate();
//! assert_eq!(generated.metadata.entities, 3 * scenario.trajectories_per_user);
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

use crate::{EntityKey, TrajDataset, TrajPoint, TrajRecord};

/// Meters per degree of latitude (approximately constant).
const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// 2023-11-14T22:13:20Z, in milliseconds.
const START_TIMESTAMP_MS: i64 = 1_700_000_000_000;

/// Scenario configuration for generating synthetic data.
#[derive(Debug, Clone)]
pub struct SyntheticScenario {
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub user_count: usize,
    pub trajectories_per_user: usize,
    pub stops_per_trajectory: usize,
    pub points_per_stop: usize,
    /// Maximum per-axis offset of a stop fix from the stop location
    pub stop_jitter_meters: f64,
    /// Fixes recorded between two consecutive stops
    pub points_per_move: usize,
    /// Distance between consecutive moving fixes
    pub move_spacing_meters: f64,
    pub sample_interval_ms: i64,
    /// RNG seed for deterministic reproduction.
    pub seed: u64,
}

impl Default for SyntheticScenario {
    fn default() -> Self {
        Self {
            origin_lat: 45.07,
            origin_lng: 7.68,
            user_count: 10,
            trajectories_per_user: 2,
            stops_per_trajectory: 5,
            points_per_stop: 20,
            stop_jitter_meters: 15.0,
            points_per_move: 10,
            move_spacing_meters: 400.0,
            sample_interval_ms: 30_000,
            seed: 42,
        }
    }
}

/// Dataset statistics.
#[derive(Debug, Clone)]
pub struct DatasetMetadata {
    pub total_points: usize,
    pub entities: usize,
}

/// A generated dataset with its ground truth.
pub struct SyntheticDataset {
    pub dataset: TrajDataset,
    /// Compressed size of every entity for a radius in the compressible range
    pub expected_points: Vec<(EntityKey, usize)>,
    pub metadata: DatasetMetadata,
}

impl SyntheticDataset {
    /// Expected compressed size of the whole dataset.
    pub fn expected_total(&self) -> usize {
        self.expected_points.iter().map(|(_, n)| n).sum()
    }
}

impl SyntheticScenario {
    /// Default scenario with a given number of users.
    pub fn with_users(user_count: usize, seed: u64) -> Self {
        Self {
            user_count,
            seed,
            ..Self::default()
        }
    }

    /// Radii (km) for which each stop merges into one point and no moving
    /// fix merges with a neighbour.
    ///
    /// Two stop fixes are at most `2·√2·jitter` apart; two neighbouring moving
    /// fixes at least `spacing − 2·√2·jitter`.
    pub fn compressible_radius_km(&self) -> (f64, f64) {
        let spread = 2.0 * 2f64.sqrt() * self.stop_jitter_meters;
        (spread / 1000.0, (self.move_spacing_meters - spread) / 1000.0)
    }

    /// A radius in the middle of [`compressible_radius_km`](Self::compressible_radius_km).
    pub fn suggested_radius_km(&self) -> f64 {
        let (low, high) = self.compressible_radius_km();
        (low + high) / 2.0
    }

    /// Compressed size of one trajectory for a compressible radius.
    pub fn expected_points_per_trajectory(&self) -> usize {
        self.stops_per_trajectory
            + self.stops_per_trajectory.saturating_sub(1) * self.points_per_move
    }

    /// Generate the dataset. Users are emitted one after another, with the
    /// trajectories of a user following each other in time.
    pub fn generate(&self) -> SyntheticDataset {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut records = Vec::new();
        let mut expected_points = Vec::new();

        for user in 0..self.user_count {
            let uid = format!("user-{:03}", user);
            let mut timestamp = START_TIMESTAMP_MS;

            // Spread users over a few kilometers so they don't share stops.
            let mut lat = self.origin_lat + rng.gen_range(-0.02..0.02);
            let mut lng = self.origin_lng + rng.gen_range(-0.02..0.02);

            for trajectory in 0..self.trajectories_per_user {
                let tid = trajectory.to_string();

                for stop in 0..self.stops_per_trajectory {
                    for _ in 0..self.points_per_stop {
                        let (jlat, jlng) = self.jitter(&mut rng, lat);
                        records.push(self.record(&uid, &tid, lat + jlat, lng + jlng, timestamp));
                        timestamp += self.sample_interval_ms;
                    }

                    if stop + 1 == self.stops_per_trajectory {
                        break;
                    }

                    let heading = rng.gen_range(0.0..2.0 * PI);
                    for _ in 0..self.points_per_move {
                        lat += meters_to_deg_lat(self.move_spacing_meters * heading.sin());
                        lng += meters_to_deg_lng(self.move_spacing_meters * heading.cos(), lat);
                        let (jlat, jlng) = self.jitter(&mut rng, lat);
                        records.push(self.record(&uid, &tid, lat + jlat, lng + jlng, timestamp));
                        timestamp += self.sample_interval_ms;
                    }

                    // The next stop is one more spacing away.
                    lat += meters_to_deg_lat(self.move_spacing_meters * heading.sin());
                    lng += meters_to_deg_lng(self.move_spacing_meters * heading.cos(), lat);
                }

                expected_points.push((
                    EntityKey::trajectory(uid.clone(), tid),
                    self.expected_points_per_trajectory(),
                ));
                // Idle time between trajectories.
                timestamp += 3_600_000;
            }
        }

        let metadata = DatasetMetadata {
            total_points: records.len(),
            entities: expected_points.len(),
        };

        SyntheticDataset {
            dataset: TrajDataset::new(records),
            expected_points,
            metadata,
        }
    }

    fn jitter(&self, rng: &mut StdRng, latitude: f64) -> (f64, f64) {
        if self.stop_jitter_meters <= 0.0 {
            return (0.0, 0.0);
        }
        let j = self.stop_jitter_meters;
        (
            meters_to_deg_lat(rng.gen_range(-j..j)),
            meters_to_deg_lng(rng.gen_range(-j..j), latitude),
        )
    }

    fn record(&self, uid: &str, tid: &str, lat: f64, lng: f64, timestamp: i64) -> TrajRecord {
        TrajRecord::new(
            Some(uid.to_string()),
            Some(tid.to_string()),
            TrajPoint::new(lat, lng, timestamp),
        )
    }
}

fn meters_to_deg_lat(meters: f64) -> f64 {
    meters / METERS_PER_DEG_LAT
}

fn meters_to_deg_lng(meters: f64, latitude: f64) -> f64 {
    let meters_per_deg_lng = METERS_PER_DEG_LAT * latitude.to_radians().cos();
    if meters_per_deg_lng.abs() < 1e-10 {
        return 0.0;
    }
    meters / meters_per_deg_lng
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = SyntheticScenario::with_users(2, 7).generate();
        let b = SyntheticScenario::with_users(2, 7).generate();
        assert_eq!(a.dataset, b.dataset);
    }

    #[test]
    fn test_point_count() {
        let scenario = SyntheticScenario::with_users(2, 1);
        let generated = scenario.generate();

        let per_trajectory = scenario.stops_per_trajectory * scenario.points_per_stop
            + (scenario.stops_per_trajectory - 1) * scenario.points_per_move;
        assert_eq!(
            generated.metadata.total_points,
            2 * scenario.trajectories_per_user * per_trajectory
        );
    }

    #[test]
    fn test_radius_range_is_non_empty() {
        let (low, high) = SyntheticScenario::default().compressible_radius_km();
        assert!(low < high);
    }
}
