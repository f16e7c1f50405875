//! Zone grid configuration.
//!
//! The grid document maps the zone of interest as stringified decimal
//! degrees under `zoneDef`:
//! ```json
//! {
//!   "zoneDef": {
//!     "gridStartLat": "51.0", "gridEndLat": "50.0",
//!     "gridStartLong": "4.0", "gridEndLong": "5.0"
//!   }
//! }
//! ```
//! The config is re-read on every conversion; callers must not cache the
//! returned box across events.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::geo::BoundingBox;

pub const DEFAULT_CONFIG_PATH: &str = "grid.config.json";

#[derive(Deserialize)]
struct GridConfig {
    #[serde(rename = "zoneDef")]
    zone_def: ZoneDef,
}

#[derive(Deserialize)]
struct ZoneDef {
    #[serde(rename = "gridStartLat")]
    grid_start_lat: String,
    #[serde(rename = "gridEndLat")]
    grid_end_lat: String,
    #[serde(rename = "gridStartLong")]
    grid_start_long: String,
    #[serde(rename = "gridEndLong")]
    grid_end_long: String,
}

/// Loads the grid config at `path` and maps it onto a checked bounding box.
///
/// `gridStart` names the north-west corner, so the start latitude is the
/// box's upper edge and the start longitude its western edge.
pub fn load_bounding_box(path: &str) -> Result<BoundingBox> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read grid config '{path}'"))?;
    let config: GridConfig = serde_json::from_str(&content)
        .with_context(|| format!("malformed grid config '{path}'"))?;

    let zone = &config.zone_def;
    BoundingBox::new(
        decimal(&zone.grid_end_lat, "gridEndLat")?,
        decimal(&zone.grid_start_lat, "gridStartLat")?,
        decimal(&zone.grid_start_long, "gridStartLong")?,
        decimal(&zone.grid_end_long, "gridEndLong")?,
    )
}

fn decimal(raw: &str, field: &str) -> Result<f64> {
    raw.parse()
        .with_context(|| format!("grid config field {field} '{raw}' is not a decimal"))
}
