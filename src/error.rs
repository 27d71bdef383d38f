//! Unified error handling for trajectory compression.
//!
//! Every fallible operation in the crate returns [`Result`], and every failure
//! names the entity and the point that caused it.

use thiserror::Error;

use crate::EntityKey;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CompressionError>;

/// Errors raised while validating or compressing trajectories.
#[derive(Debug, Error)]
pub enum CompressionError {
    /// A configuration value is outside its accepted domain.
    #[error("invalid parameter {name}={value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// A timestamp went backwards inside one entity.
    #[error("unsorted input for {entity}: point {index} at {current} precedes {previous}")]
    UnsortedInput {
        entity: EntityKey,
        index: usize,
        previous: i64,
        current: i64,
    },

    /// A point is missing a field or carries a non-finite coordinate.
    #[error("malformed point {index} for {entity}: {reason}")]
    MalformedPoint {
        entity: EntityKey,
        index: usize,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompressionError {
    /// Shorthand for a [`CompressionError::MalformedPoint`].
    pub fn malformed(entity: &EntityKey, index: usize, reason: impl Into<String>) -> Self {
        Self::MalformedPoint {
            entity: entity.clone(),
            index,
            reason: reason.into(),
        }
    }
}

/// Converts an absent field into a [`CompressionError::MalformedPoint`].
pub trait OptionExt<T> {
    fn ok_or_malformed(self, entity: &EntityKey, index: usize, reason: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_malformed(self, entity: &EntityKey, index: usize, reason: &str) -> Result<T> {
        self.ok_or_else(|| CompressionError::malformed(entity, index, reason))
    }
}
