//! Per-identity timeseries for one message.
//!
//! Readings are grouped by [`IdentityKey`]. Each group is kept sorted by
//! source timestamp, ascending, with absent timestamps ahead of every present
//! one and ties left in arrival order. Groups iterate in the order their
//! identity was first seen.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::FlattenerConfig;
use crate::error::Result;
use crate::identity::IdentityKey;
use crate::reading::Reading;

/// One `(timestamp, reading)` pair.
#[derive(Debug, Clone)]
pub struct TimeseriesEntry<'a> {
    /// `None` when the reading had no parseable source timestamp.
    pub timestamp: Option<DateTime<Utc>>,
    pub reading: Reading<'a>,
}

/// Readings of one message grouped by identity, in first-seen order.
#[derive(Debug, Default)]
pub struct Timeseries<'a> {
    index: HashMap<IdentityKey, usize>,
    series: Vec<(IdentityKey, Vec<TimeseriesEntry<'a>>)>,
}

impl<'a> Timeseries<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group `readings` (the elements of one message).
    ///
    /// Fails on the first element lacking an identity field.
    pub fn build(readings: &'a [Value], config: &FlattenerConfig) -> Result<Self> {
        let mut timeseries = Self::new();
        for (i, value) in readings.iter().enumerate() {
            timeseries.insert(Reading::from_value(i, value, config)?);
        }
        Ok(timeseries)
    }

    /// Append a reading to its identity's series and restore ordering.
    pub fn insert(&mut self, reading: Reading<'a>) {
        let entry = TimeseriesEntry {
            timestamp: reading.source_timestamp(),
            reading,
        };

        match self.index.get(entry.reading.key()) {
            Some(&slot) => {
                let entries = &mut self.series[slot].1;
                entries.push(entry);
                // Option orders None first; sort_by_key is stable.
                entries.sort_by_key(|e| e.timestamp);
            }
            None => {
                let key = entry.reading.key().clone();
                self.index.insert(key.clone(), self.series.len());
                self.series.push((key, vec![entry]));
            }
        }
    }

    /// Series for one identity.
    pub fn get(&self, key: &IdentityKey) -> Option<&[TimeseriesEntry<'a>]> {
        self.index
            .get(key)
            .map(|&slot| self.series[slot].1.as_slice())
    }

    /// Most recent entry for one identity.
    pub fn latest(&self, key: &IdentityKey) -> Option<&TimeseriesEntry<'a>> {
        self.get(key).and_then(<[_]>::last)
    }

    /// Identities with their series, in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&IdentityKey, &[TimeseriesEntry<'a>])> {
        self.series
            .iter()
            .map(|(key, entries)| (key, entries.as_slice()))
    }

    /// Number of distinct identities.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
