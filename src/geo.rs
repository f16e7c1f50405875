//! Geographic bounding-box filtering.
//!
//! Providers report either a full geometry ring (traffic segments) or a
//! single point (stationary sensors). Both are tested against the configured
//! rectangle; nothing is ever clipped.

use anyhow::{Result, bail};

/// Rectangular region of interest in decimal degrees.
///
/// Constructed through [`BoundingBox::new`], which enforces
/// `min_lat < max_lat` and `min_long < max_long`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_long: f64,
    pub max_long: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, max_lat: f64, min_long: f64, max_long: f64) -> Result<Self> {
        if min_lat >= max_lat {
            bail!("invalid bounding box: min_lat {min_lat} >= max_lat {max_lat}");
        }
        if min_long >= max_long {
            bail!("invalid bounding box: min_long {min_long} >= max_long {max_long}");
        }
        Ok(Self {
            min_lat,
            max_lat,
            min_long,
            max_long,
        })
    }

    /// Tests whether an entire geometry ring lies inside the box.
    ///
    /// Vertices are `(longitude, latitude)` pairs. A single vertex outside
    /// the rectangle rejects the whole ring; vertices exactly on an edge are
    /// tolerated. An empty ring is trivially inside.
    pub fn contains_ring(&self, ring: &[(f64, f64)]) -> bool {
        ring.iter().all(|&(lon, lat)| {
            !(lon < self.min_long || lon > self.max_long || lat > self.max_lat || lat < self.min_lat)
        })
    }

    /// Tests whether a point lies strictly inside the box.
    ///
    /// Unlike [`contains_ring`](Self::contains_ring), points exactly on an
    /// edge are rejected. The asymmetry mirrors the per-provider comparison
    /// rules and is intentional.
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon > self.min_long && lon < self.max_long && lat < self.max_lat && lat > self.min_lat
    }
}
