//! Types shared between the NDZ backend and consumers of its query and push
//! interfaces.

pub mod types;

pub use types::{Coordinate, Owner, Sighting, SightingSnapshot};
