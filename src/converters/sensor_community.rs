//! Converter for the Sensor.Community air-quality network.
//!
//! Payloads are a flat array of station readings. Only outdoor stations
//! strictly inside the box are kept, and only a fixed whitelist of value
//! types survives into the canonical table.

use anyhow::{Context, Result};
use serde_json::Value;
use uuid::Uuid;

use crate::converters::converter::Conversion;
use crate::envelope::Envelope;
use crate::geo::BoundingBox;
use crate::record::CanonicalRecord;

/// Value types published downstream; the match is case-sensitive.
static VALUE_TYPES: &[&str] = &["temperature", "humidity", "P1", "P2"];

pub(crate) fn convert(envelope: &Envelope, bbox: &BoundingBox) -> Result<Conversion> {
    if !envelope.is_ok() {
        return Ok(Conversion::Unpublishable);
    }

    let body = envelope.body_json()?;
    let stations = body
        .as_array()
        .context("sensor.community body is not an array of stations")?;

    let mut rows = Vec::new();

    for station in stations {
        let location = station
            .get("location")
            .context("station record has no location")?;
        let latitude = coordinate(location, "latitude")?;
        let longitude = coordinate(location, "longitude")?;

        if !bbox.contains_point(longitude, latitude) {
            continue;
        }
        if location.get("indoor").and_then(Value::as_i64) != Some(0) {
            continue;
        }

        // Timestamp is passed through verbatim; this provider's clock format
        // is already what downstream expects.
        let timestamp = station
            .get("timestamp")
            .and_then(Value::as_str)
            .context("station record has no timestamp")?;

        let values = station
            .get("sensordatavalues")
            .and_then(Value::as_array)
            .context("station record has no sensordatavalues")?;

        for entry in values {
            let value_type = entry
                .get("value_type")
                .and_then(Value::as_str)
                .context("sensordatavalue has no value_type")?;
            if !VALUE_TYPES.contains(&value_type) {
                continue;
            }

            rows.push(CanonicalRecord {
                uuid: Uuid::new_v4(),
                timestamp: timestamp.to_string(),
                latitude,
                longitude,
                value_type: value_type.to_ascii_uppercase(),
                value: entry.get("value").cloned().unwrap_or(Value::Null),
            });
        }
    }

    Ok(Conversion::Table(rows))
}

/// Reads a coordinate that upstream serializes inconsistently as either a
/// number or a stringified decimal.
fn coordinate(location: &Value, field: &str) -> Result<f64> {
    let value = location
        .get(field)
        .with_context(|| format!("station location has no {field}"))?;

    match value {
        Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("station {field} is not a finite number")),
        Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("station {field} '{s}' is not a decimal")),
        other => anyhow::bail!("station {field} has unexpected type: {other}"),
    }
}
