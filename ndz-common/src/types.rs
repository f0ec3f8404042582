use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw position from the feed, in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pilot registered as the owner of an aircraft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub pilot_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: String,
    /// Registration date. The pilot registry calls this `createdDt`.
    #[serde(alias = "createdDt")]
    pub created_at: DateTime<Utc>,
}

impl Owner {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// One tracked aircraft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sighting {
    /// Aircraft serial number
    pub id: String,
    pub model: String,
    pub manufacturer: String,
    /// Latest observed position
    pub position: Coordinate,
    /// Latest observed altitude
    pub altitude: f64,
    /// Snapshot time of the most recent observation
    pub last_seen_at: DateTime<Utc>,
    /// Snapshot time of the first observation inside the zone
    pub first_violation_at: Option<DateTime<Utc>>,
    /// Closest distance to the zone center ever observed, in kilometers
    pub closest_distance: f64,
    pub owner: Option<Owner>,
}

/// Immutable view of the sighting store after one completed cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SightingSnapshot {
    /// Number of completed reconciliation cycles, 0 before the first one
    pub generation: u64,
    pub completed_at: Option<DateTime<Utc>>,
    pub sightings: Vec<Sighting>,
}

impl SightingSnapshot {
    pub fn empty() -> Self {
        Self {
            generation: 0,
            completed_at: None,
            sightings: Vec::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Sighting> {
        self.sightings.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.sightings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sightings.is_empty()
    }
}

impl Default for SightingSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
