//! # Trace Compress
//!
//! Radius-based spatial-merge compression for GPS trajectories.
//!
//! Consecutive fixes that stay within a small radius of the first fix of a
//! cluster (the *anchor*) are merged into one point carrying the median
//! coordinates of the cluster and the anchor's timestamp. The result keeps the
//! shape of the path and the timing of transitions with far fewer points.
//!
//! This library provides:
//! - A streaming compression engine for one trajectory ([`ClusterStream`], [`Compressor`])
//! - A dispatcher that compresses multi-user, multi-trajectory datasets ([`compress`])
//! - Great-circle distance helpers ([`geo_utils`])
//!
//! ## Features
//!
//! - **`parallel`** - Compress independent entities in parallel with rayon
//! - **`synthetic`** - Deterministic stop-and-go trajectory generator
//! - **`cli`** - Build the `tracecompress-cli` GPX tool
//!
//! ## Quick Start
//!
//! ```rust
//! use tracecompress::{TrajPoint, compress_trajectory};
//!
//! let points = vec![
//!     TrajPoint::new(0.0, 0.0, 0),
//!     TrajPoint::new(0.0, 0.001, 60_000),
//!     TrajPoint::new(0.0, 0.002, 120_000),
//!     TrajPoint::new(5.0, 5.0, 180_000),
//! ];
//!
//! let compressed = compress_trajectory(&points, 0.25).unwrap();
//! assert_eq!(compressed.len(), 2);
//! assert_eq!(compressed[0].longitude, 0.001);
//! assert_eq!(compressed[0].timestamp, 0);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// Unified error handling
pub mod error;
pub use error::{CompressionError, OptionExt, Result};

// Geographic utilities (distance, length, median)
pub mod geo_utils;

// Single-trajectory compression engine
pub mod compression;
pub use compression::{compress_trajectory, ClusterStream, Compressor};

// Multi-entity datasets and dispatch
pub mod dataset;
pub use dataset::TrajDataset;

pub mod dispatch;
#[cfg(feature = "parallel")]
pub use dispatch::compress_parallel;
pub use dispatch::{compress, CompressionParams, EntityGrouping, COMPRESSION_PARAMS};

// Synthetic trajectories for tests and benchmarks
#[cfg(feature = "synthetic")]
pub mod synthetic;

// ============================================================================
// Core Types
// ============================================================================

/// A single timestamped fix.
///
/// `extra` holds any further attributes of the record (elevation, speed,
/// device fields...). They are opaque to the engine and carried through in
/// their original order.
///
/// # Example
/// ```
/// use tracecompress::TrajPoint;
/// let point = TrajPoint::new(51.5074, -0.1278, 1_700_000_000_000);
/// assert!(point.is_finite());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<Value>,
}

impl TrajPoint {
    /// Create a point without extra attributes.
    pub fn new(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            extra: Vec::new(),
        }
    }

    /// Create a point carrying extra attributes.
    pub fn with_extra(latitude: f64, longitude: f64, timestamp: i64, extra: Vec<Value>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            extra,
        }
    }

    /// Both coordinates are finite numbers.
    ///
    /// Range is not checked: the engine accepts any finite coordinate pair.
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Identifies the entity a point belongs to.
///
/// Either part may be absent: a dataset with one user has no meaningful user
/// id, a user with a single trajectory has no trajectory id.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub uid: Option<String>,
    pub tid: Option<String>,
}

impl EntityKey {
    pub fn new(uid: Option<String>, tid: Option<String>) -> Self {
        Self { uid, tid }
    }

    /// Key for a user's single trajectory.
    pub fn user(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            tid: None,
        }
    }

    /// Key for one trajectory of a user.
    pub fn trajectory(uid: impl Into<String>, tid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            tid: Some(tid.into()),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.uid, &self.tid) {
            (None, None) => write!(f, "trajectory"),
            (Some(uid), None) => write!(f, "uid={}", uid),
            (None, Some(tid)) => write!(f, "tid={}", tid),
            (Some(uid), Some(tid)) => write!(f, "uid={} tid={}", uid, tid),
        }
    }
}

/// One row of a multi-entity dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,
    #[serde(flatten)]
    pub point: TrajPoint,
}

impl TrajRecord {
    pub fn new(uid: Option<String>, tid: Option<String>, point: TrajPoint) -> Self {
        Self { uid, tid, point }
    }

    /// The entity this record belongs to.
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.uid.clone(), self.tid.clone())
    }
}

/// Configuration for dataset compression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Radius around a cluster's anchor, in kilometers. Points farther than
    /// this from the anchor start a new cluster.
    /// Must be positive; `f64::INFINITY` merges each entity into one point.
    /// Default: 0.2 km
    pub spatial_radius_km: f64,

    /// Stable-sort records by user and timestamp before compressing.
    /// When disabled, out-of-order timestamps fail with
    /// [`CompressionError::UnsortedInput`].
    /// Default: true
    pub sort_input: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            spatial_radius_km: 0.2,
            sort_input: true,
        }
    }
}

impl CompressionConfig {
    /// Default configuration with a custom radius.
    pub fn with_radius_km(spatial_radius_km: f64) -> Self {
        Self {
            spatial_radius_km,
            ..Self::default()
        }
    }
}
