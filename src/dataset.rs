//! Multi-entity trajectory datasets.
//!
//! A [`TrajDataset`] is the row collection the dispatcher works on: records
//! tagged with optional user and trajectory ids, plus a free-form parameter
//! map recording the processing steps already applied to the data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};

use crate::error::Result;
use crate::{EntityKey, TrajRecord};

/// Records of one or more entities plus their processing parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajDataset {
    pub records: Vec<TrajRecord>,
    /// Processing step name -> parameters used for that step
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

impl TrajDataset {
    pub fn new(records: Vec<TrajRecord>) -> Self {
        Self {
            records,
            parameters: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: Value) {
        self.parameters.insert(name.into(), value);
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// More than one distinct user id is present. A missing id counts as a
    /// value of its own, so rows with and without a user never share a group.
    pub fn is_multi_user(&self) -> bool {
        distinct(self.records.iter().map(|r| r.uid.as_deref())) > 1
    }

    /// More than one distinct trajectory id is present, a missing id
    /// counting as one.
    pub fn is_multi_trajectory(&self) -> bool {
        distinct(self.records.iter().map(|r| r.tid.as_deref())) > 1
    }

    /// Number of distinct (user, trajectory) keys.
    pub fn entity_count(&self) -> usize {
        self.records
            .iter()
            .map(TrajRecord::key)
            .collect::<BTreeSet<EntityKey>>()
            .len()
    }

    /// Stable sort by user id, then timestamp.
    ///
    /// Records of one user that share a timestamp keep their relative order,
    /// so interleaved trajectories of the same user stay distinguishable.
    pub fn sort_by_uid_and_datetime(&mut self) {
        self.records.sort_by(|a, b| {
            a.uid
                .cmp(&b.uid)
                .then(a.point.timestamp.cmp(&b.point.timestamp))
        });
    }

    /// Serialize to JSON, parameters included.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn read_json<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

impl FromIterator<TrajRecord> for TrajDataset {
    fn from_iter<I: IntoIterator<Item = TrajRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

fn distinct<'a>(ids: impl Iterator<Item = Option<&'a str>>) -> usize {
    ids.collect::<BTreeSet<_>>().len()
}
