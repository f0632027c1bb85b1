//! Configuration types for test data generation.

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, macros::datetime};

/// Geographic bounding box defined by southwest and northeast corners.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum latitude (south)
    pub min_lat: f64,
    /// Minimum longitude (west)
    pub min_lon: f64,
    /// Maximum latitude (north)
    pub max_lat: f64,
    /// Maximum longitude (east)
    pub max_lon: f64,
}

impl BoundingBox {
    pub const fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Returns a random point within the bounding box.
    pub fn random_point(&self, rng: &mut impl rand::Rng) -> (f64, f64) {
        let lat = rng.gen_range(self.min_lat..self.max_lat);
        let lon = rng.gen_range(self.min_lon..self.max_lon);
        (lat, lon)
    }

    /// Returns the center of the bounding box.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

/// Pre-defined sailing areas.
#[derive(Debug, Clone, Copy)]
pub struct Region;

impl Region {
    /// The Solent, between the Isle of Wight and the English mainland.
    pub const SOLENT: BoundingBox = BoundingBox::new(50.72, -1.45, 50.80, -1.10);

    /// San Francisco Bay, north of the Bay Bridge.
    pub const SF_BAY: BoundingBox = BoundingBox::new(37.80, -122.48, 37.87, -122.38);

    /// Northern Lake Garda, steady thermal winds in the afternoon.
    pub const LAKE_GARDA: BoundingBox = BoundingBox::new(45.75, 10.80, 45.87, 10.88);
}

/// Fixed session start so generated tracks line up with generated wind fields.
pub const DEFAULT_SESSION_START: OffsetDateTime = datetime!(2024-06-01 10:00 UTC);
