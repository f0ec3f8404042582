use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ndz_common::Coordinate;
use serde::{Deserialize, Serialize};

/// One validated aircraft position from a snapshot report
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: String,
    pub model: String,
    pub manufacturer: String,
    pub position: Coordinate,
    pub altitude: f64,
    /// Snapshot timestamp of the report this came from
    pub observed_at: DateTime<Utc>,
    /// Distance from the zone center in kilometers
    pub distance: f64,
    pub is_violation: bool,
}

/// Metadata about the sensor that produced the report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedDevice {
    pub device_id: Option<String>,
    pub listen_range: Option<f64>,
    pub device_started: Option<String>,
    pub uptime_seconds: Option<f64>,
    pub update_interval_ms: Option<f64>,
}

/// All observations from one report, at most one per aircraft serial
#[derive(Debug, Clone)]
pub struct Batch {
    observed_at: DateTime<Utc>,
    device: Option<FeedDevice>,
    records: Vec<Observation>,
    skipped: usize,
}

impl Batch {
    /// Build a batch, collapsing repeated serials into one observation.
    ///
    /// For a repeated serial the later record supplies position and altitude,
    /// the smallest distance is kept, and the observation is a violation if
    /// any of the repeats was.
    pub fn new(
        observed_at: DateTime<Utc>,
        device: Option<FeedDevice>,
        records: Vec<Observation>,
        skipped: usize,
    ) -> Self {
        let mut index: HashMap<String, usize> = HashMap::with_capacity(records.len());
        let mut unique: Vec<Observation> = Vec::with_capacity(records.len());

        for record in records {
            match index.get(&record.id) {
                Some(&i) => {
                    let existing = &mut unique[i];
                    existing.position = record.position;
                    existing.altitude = record.altitude;
                    existing.distance = existing.distance.min(record.distance);
                    existing.is_violation |= record.is_violation;
                }
                None => {
                    index.insert(record.id.clone(), unique.len());
                    unique.push(record);
                }
            }
        }

        Self {
            observed_at,
            device,
            records: unique,
            skipped,
        }
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    pub fn device(&self) -> Option<&FeedDevice> {
        self.device.as_ref()
    }

    pub fn records(&self) -> &[Observation] {
        &self.records
    }

    /// Records dropped during normalization because a required field was bad
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn violations(&self) -> impl Iterator<Item = &Observation> {
        self.records.iter().filter(|r| r.is_violation)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(id: &str, x: f64, distance: f64, is_violation: bool) -> Observation {
        Observation {
            id: id.to_string(),
            model: "M".to_string(),
            manufacturer: "F".to_string(),
            position: Coordinate::new(x, 0.0),
            altitude: x,
            observed_at: Utc::now(),
            distance,
            is_violation,
        }
    }

    #[test]
    fn test_batch_collapses_repeated_serials() {
        let batch = Batch::new(
            Utc::now(),
            None,
            vec![
                obs("A", 1.0, 90.0, true),
                obs("B", 2.0, 200.0, false),
                obs("A", 3.0, 120.0, false),
            ],
            0,
        );
        assert_eq!(batch.len(), 2);
        let a = &batch.records()[0];
        assert_eq!(a.id, "A");
        assert_eq!(a.position.x, 3.0);
        assert_eq!(a.distance, 90.0);
        assert!(a.is_violation);
        assert_eq!(batch.violations().count(), 1);
    }
}
