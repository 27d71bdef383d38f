//! Spatial-merge compression of a single trajectory.
//!
//! The engine walks a time-sorted trajectory once, keeping one cluster open at
//! a time. A cluster starts at an *anchor* point and absorbs every following
//! point that lies within `radius_km` of that anchor. The first point farther
//! away closes the cluster and becomes the next anchor.
//!
//! A closed cluster becomes one point:
//! - latitude and longitude are the medians of the cluster's coordinates
//! - the timestamp is the anchor's (when the entity arrived, not when it left)
//! - extra attributes are copied from the last point of the cluster
//!
//! The cluster still open when the input ends is flushed the same way, so a
//! single-point trajectory comes back unchanged and no trailing points are lost.

use log::debug;
use serde_json::Value;

use crate::error::{CompressionError, Result};
use crate::geo_utils::{distance_km, median};
use crate::{EntityKey, TrajPoint};

/// Reject NaN and non-positive radii. `+inf` is accepted.
fn validate_radius(radius_km: f64) -> Result<()> {
    if radius_km.is_nan() || radius_km <= 0.0 {
        return Err(CompressionError::InvalidParameter {
            name: "spatial_radius_km",
            value: radius_km,
            reason: "must be a positive number of kilometers",
        });
    }
    Ok(())
}

/// The cluster currently being accumulated.
#[derive(Debug)]
struct OpenCluster {
    anchor_lat: f64,
    anchor_lng: f64,
    anchor_time: i64,
    lats: Vec<f64>,
    lngs: Vec<f64>,
    /// Extra attributes of the most recently absorbed point
    last_extra: Vec<Value>,
}

impl OpenCluster {
    fn open(anchor: TrajPoint) -> Self {
        Self {
            anchor_lat: anchor.latitude,
            anchor_lng: anchor.longitude,
            anchor_time: anchor.timestamp,
            lats: vec![anchor.latitude],
            lngs: vec![anchor.longitude],
            last_extra: anchor.extra,
        }
    }

    fn absorb(&mut self, point: TrajPoint) {
        self.lats.push(point.latitude);
        self.lngs.push(point.longitude);
        self.last_extra = point.extra;
    }

    fn len(&self) -> usize {
        self.lats.len()
    }

    fn close(mut self) -> TrajPoint {
        // Buffers always hold at least the anchor.
        let latitude = median(&mut self.lats).unwrap_or(self.anchor_lat);
        let longitude = median(&mut self.lngs).unwrap_or(self.anchor_lng);
        TrajPoint::with_extra(latitude, longitude, self.anchor_time, self.last_extra)
    }
}

/// Push-based form of the compression engine.
///
/// Feed points in time order with [`push`](Self::push); a merged point is
/// returned each time a cluster closes. Call [`finish`](Self::finish) once the
/// input is exhausted to flush the last cluster.
///
/// ```rust
/// use tracecompress::{ClusterStream, TrajPoint};
///
/// let mut stream = ClusterStream::new(0.5).unwrap();
/// assert!(stream.push(TrajPoint::new(0.0, 0.0, 0)).unwrap().is_none());
/// assert!(stream.push(TrajPoint::new(0.0, 0.001, 10)).unwrap().is_none());
///
/// let closed = stream.push(TrajPoint::new(1.0, 1.0, 20)).unwrap().unwrap();
/// assert_eq!(closed.timestamp, 0);
///
/// let last = stream.finish().unwrap();
/// assert_eq!(last.timestamp, 20);
/// ```
#[derive(Debug)]
pub struct ClusterStream {
    radius_km: f64,
    entity: EntityKey,
    cluster: Option<OpenCluster>,
    last_timestamp: Option<i64>,
    /// Points accepted so far; also the index of the next point
    seen: usize,
}

impl ClusterStream {
    /// Create a stream for an anonymous trajectory.
    pub fn new(radius_km: f64) -> Result<Self> {
        Self::for_entity(radius_km, EntityKey::default())
    }

    /// Create a stream whose errors are attributed to `entity`.
    pub fn for_entity(radius_km: f64, entity: EntityKey) -> Result<Self> {
        validate_radius(radius_km)?;
        Ok(Self::unchecked(radius_km, entity))
    }

    fn unchecked(radius_km: f64, entity: EntityKey) -> Self {
        Self {
            radius_km,
            entity,
            cluster: None,
            last_timestamp: None,
            seen: 0,
        }
    }

    /// Feed the next point.
    ///
    /// Returns the merged point of the cluster this point closed, if any.
    /// Fails on a non-finite coordinate or a timestamp earlier than the
    /// previous point's; the stream is left unchanged in that case.
    pub fn push(&mut self, point: TrajPoint) -> Result<Option<TrajPoint>> {
        let index = self.seen;
        if !point.is_finite() {
            return Err(CompressionError::malformed(
                &self.entity,
                index,
                format!(
                    "non-finite coordinates ({}, {})",
                    point.latitude, point.longitude
                ),
            ));
        }
        if let Some(previous) = self.last_timestamp {
            if point.timestamp < previous {
                return Err(CompressionError::UnsortedInput {
                    entity: self.entity.clone(),
                    index,
                    previous,
                    current: point.timestamp,
                });
            }
        }

        self.seen += 1;
        self.last_timestamp = Some(point.timestamp);

        let cluster = match self.cluster.as_mut() {
            Some(cluster) => cluster,
            None => {
                self.cluster = Some(OpenCluster::open(point));
                return Ok(None);
            }
        };

        let distance = distance_km(
            cluster.anchor_lat,
            cluster.anchor_lng,
            point.latitude,
            point.longitude,
        );
        if distance > self.radius_km {
            let closed = std::mem::replace(cluster, OpenCluster::open(point));
            Ok(Some(closed.close()))
        } else {
            cluster.absorb(point);
            Ok(None)
        }
    }

    /// Flush the open cluster, if any.
    pub fn finish(self) -> Option<TrajPoint> {
        self.cluster.map(OpenCluster::close)
    }

    /// Number of points accepted so far.
    pub fn points_seen(&self) -> usize {
        self.seen
    }

    /// Number of points in the cluster that is still open.
    pub fn open_cluster_len(&self) -> usize {
        self.cluster.as_ref().map_or(0, OpenCluster::len)
    }
}

/// Compresses trajectories with a fixed, validated radius.
#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    radius_km: f64,
}

impl Compressor {
    /// Fails with [`CompressionError::InvalidParameter`] if the radius is NaN
    /// or not positive.
    pub fn new(radius_km: f64) -> Result<Self> {
        validate_radius(radius_km)?;
        Ok(Self { radius_km })
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    /// A fresh stream for `entity` using this radius.
    pub fn stream(&self, entity: EntityKey) -> ClusterStream {
        ClusterStream::unchecked(self.radius_km, entity)
    }

    /// Compress one anonymous trajectory.
    pub fn compress(&self, points: &[TrajPoint]) -> Result<Vec<TrajPoint>> {
        self.compress_entity(&EntityKey::default(), points)
    }

    /// Compress one trajectory, attributing errors to `entity`.
    pub fn compress_entity(&self, entity: &EntityKey, points: &[TrajPoint]) -> Result<Vec<TrajPoint>> {
        self.compress_owned(entity, points.iter().cloned())
    }

    /// Compress a trajectory given by value, moving extra attributes instead
    /// of cloning them.
    pub fn compress_owned<I>(&self, entity: &EntityKey, points: I) -> Result<Vec<TrajPoint>>
    where
        I: IntoIterator<Item = TrajPoint>,
    {
        let mut stream = self.stream(entity.clone());
        let mut compressed = Vec::new();

        for point in points {
            if let Some(merged) = stream.push(point)? {
                compressed.push(merged);
            }
        }
        let input_len = stream.points_seen();
        compressed.extend(stream.finish());

        debug!(
            "[Compress] {}: {} -> {} points (radius {} km)",
            entity,
            input_len,
            compressed.len(),
            self.radius_km
        );
        Ok(compressed)
    }
}

/// Compress one time-sorted trajectory with the given radius in kilometers.
///
/// Returns an empty vector for empty input and the point itself for a
/// single-point trajectory.
pub fn compress_trajectory(points: &[TrajPoint], radius_km: f64) -> Result<Vec<TrajPoint>> {
    Compressor::new(radius_km)?.compress(points)
}
