//! Per-entity dispatch of the compression engine.
//!
//! A dataset may hold several users, and several trajectories per user. Each
//! (user, trajectory) pair is compressed on its own, so clusters never span
//! two entities, and the results are concatenated in key order.

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::compression::Compressor;
use crate::error::Result;
use crate::{CompressionConfig, EntityKey, TrajDataset, TrajPoint, TrajRecord};

/// Parameter-map entry under which [`compress`] records its invocation.
pub const COMPRESSION_PARAMS: &str = "compress";

/// Which identifiers split the dataset into entities.
///
/// Detected from the data: an identifier only groups when more than one
/// distinct value of it is present, absence included. Records sharing a
/// group therefore agree on both identifiers, and sorting by user id then
/// timestamp orders every group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityGrouping {
    pub by_user: bool,
    pub by_trajectory: bool,
}

impl EntityGrouping {
    pub fn detect(dataset: &TrajDataset) -> Self {
        Self {
            by_user: dataset.is_multi_user(),
            by_trajectory: dataset.is_multi_trajectory(),
        }
    }

    /// No identifier applies; the whole dataset is one trajectory.
    pub fn is_single_entity(&self) -> bool {
        !self.by_user && !self.by_trajectory
    }

    /// Grouping key of a record, keeping only the detected identifiers.
    pub fn key_for(&self, record: &TrajRecord) -> EntityKey {
        EntityKey {
            uid: if self.by_user { record.uid.clone() } else { None },
            tid: if self.by_trajectory {
                record.tid.clone()
            } else {
                None
            },
        }
    }
}

/// Record of a [`compress`] call, stored in the output's parameter map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionParams {
    pub function: String,
    pub spatial_radius_km: f64,
    pub sort_input: bool,
    pub grouping: EntityGrouping,
    pub entities: usize,
    pub input_points: usize,
    pub output_points: usize,
}

/// Points of one entity, with the identifiers its output rows carry.
struct EntityGroup {
    uid: Option<String>,
    tid: Option<String>,
    points: Vec<TrajPoint>,
}

impl EntityGroup {
    fn key(&self) -> EntityKey {
        EntityKey::new(self.uid.clone(), self.tid.clone())
    }
}

/// Compress every entity of `dataset` independently.
///
/// The output keeps the input's parameters and adds a
/// [`CompressionParams`] entry under [`COMPRESSION_PARAMS`].
///
/// # Example
/// ```
/// use tracecompress::{compress, CompressionConfig, TrajDataset, TrajPoint, TrajRecord};
///
/// let records = vec![
///     TrajRecord::new(Some("a".into()), None, TrajPoint::new(0.0, 0.0, 0)),
///     TrajRecord::new(Some("b".into()), None, TrajPoint::new(0.0, 0.0, 0)),
///     TrajRecord::new(Some("a".into()), None, TrajPoint::new(0.0, 0.0001, 1)),
/// ];
///
/// let out = compress(&TrajDataset::new(records), &CompressionConfig::default()).unwrap();
/// assert_eq!(out.len(), 2);
/// assert!(out.parameter("compress").is_some());
/// ```
pub fn compress(dataset: &TrajDataset, config: &CompressionConfig) -> Result<TrajDataset> {
    let (compressor, grouping, groups) = prepare(dataset, config)?;
    let entities = groups.len();

    let compressed = groups
        .into_iter()
        .map(|group| compress_group(&compressor, group))
        .collect::<Result<Vec<_>>>()?;

    assemble(dataset, config, grouping, entities, compressed)
}

/// Same as [`compress`], with entities compressed on the rayon thread pool.
///
/// Output order is identical to [`compress`].
#[cfg(feature = "parallel")]
pub fn compress_parallel(dataset: &TrajDataset, config: &CompressionConfig) -> Result<TrajDataset> {
    use rayon::prelude::*;

    let (compressor, grouping, groups) = prepare(dataset, config)?;
    let entities = groups.len();

    let compressed = groups
        .into_par_iter()
        .map(|group| compress_group(&compressor, group))
        .collect::<Result<Vec<_>>>()?;

    assemble(dataset, config, grouping, entities, compressed)
}

/// Validate the radius, sort if requested and split into entity groups.
fn prepare(
    dataset: &TrajDataset,
    config: &CompressionConfig,
) -> Result<(Compressor, EntityGrouping, Vec<EntityGroup>)> {
    let compressor = Compressor::new(config.spatial_radius_km)?;
    let grouping = EntityGrouping::detect(dataset);

    let mut working = TrajDataset::new(dataset.records.clone());
    if config.sort_input {
        working.sort_by_uid_and_datetime();
    }

    let mut groups: BTreeMap<EntityKey, EntityGroup> = BTreeMap::new();
    for record in working.records {
        let key = grouping.key_for(&record);
        groups
            .entry(key)
            .or_insert_with(|| EntityGroup {
                uid: record.uid.clone(),
                tid: record.tid.clone(),
                points: Vec::new(),
            })
            .points
            .push(record.point);
    }

    Ok((compressor, grouping, groups.into_values().collect()))
}

fn compress_group(compressor: &Compressor, group: EntityGroup) -> Result<Vec<TrajRecord>> {
    let key = group.key();
    let points = compressor.compress_owned(&key, group.points)?;

    Ok(points
        .into_iter()
        .map(|point| TrajRecord::new(group.uid.clone(), group.tid.clone(), point))
        .collect())
}

fn assemble(
    input: &TrajDataset,
    config: &CompressionConfig,
    grouping: EntityGrouping,
    entities: usize,
    compressed: Vec<Vec<TrajRecord>>,
) -> Result<TrajDataset> {
    let records: Vec<TrajRecord> = compressed.into_iter().flatten().collect();

    let params = CompressionParams {
        function: COMPRESSION_PARAMS.to_string(),
        spatial_radius_km: config.spatial_radius_km,
        sort_input: config.sort_input,
        grouping,
        entities,
        input_points: input.len(),
        output_points: records.len(),
    };

    info!(
        "[Compress] {} points in {} entities -> {} points (radius {} km)",
        params.input_points, params.entities, params.output_points, params.spatial_radius_km
    );

    let mut output = TrajDataset {
        records,
        parameters: input.parameters.clone(),
    };
    output.set_parameter(COMPRESSION_PARAMS, serde_json::to_value(&params)?);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(uid: &str, tid: &str, lat: f64, lng: f64, t: i64) -> TrajRecord {
        TrajRecord::new(
            Some(uid.to_string()),
            Some(tid.to_string()),
            TrajPoint::new(lat, lng, t),
        )
    }

    #[test]
    fn test_key_for_drops_undetected_ids() {
        let grouping = EntityGrouping {
            by_user: true,
            by_trajectory: false,
        };
        let key = grouping.key_for(&rec("u", "t", 0.0, 0.0, 0));
        assert_eq!(key, EntityKey::user("u"));
    }

    #[test]
    fn test_trajectories_of_one_user_are_not_merged() {
        // Same place, same user, two trajectories.
        let dataset = TrajDataset::new(vec![
            rec("u", "1", 0.0, 0.0, 0),
            rec("u", "2", 0.0, 0.0, 1),
            rec("u", "1", 0.0, 0.0, 2),
            rec("u", "2", 0.0, 0.0, 3),
        ]);
        let out = compress(&dataset, &CompressionConfig::default()).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out.records[0].tid.as_deref(), Some("1"));
        assert_eq!(out.records[0].point.timestamp, 0);
        assert_eq!(out.records[1].tid.as_deref(), Some("2"));
        assert_eq!(out.records[1].point.timestamp, 1);
    }

    #[test]
    fn test_params_recorded() {
        let dataset = TrajDataset::new(vec![rec("u", "1", 0.0, 0.0, 0)]);
        let out = compress(&dataset, &CompressionConfig::with_radius_km(0.5)).unwrap();

        let params: CompressionParams =
            serde_json::from_value(out.parameter(COMPRESSION_PARAMS).unwrap().clone()).unwrap();
        assert_eq!(params.function, "compress");
        assert_eq!(params.spatial_radius_km, 0.5);
        assert!(params.grouping.is_single_entity());
        assert_eq!(params.entities, 1);
        assert_eq!(params.input_points, 1);
        assert_eq!(params.output_points, 1);
    }
}
