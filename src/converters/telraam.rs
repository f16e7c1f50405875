//! Converter for the TelRaam traffic-counting service.
//!
//! Payloads are GeoJSON-like: one feature per counted street segment, with
//! the segment geometry as a coordinate ring and the counts as properties.
//! Each kept segment is pivoted wide-to-long into one row per traffic
//! dimension.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;
use uuid::Uuid;

use crate::converters::converter::Conversion;
use crate::envelope::Envelope;
use crate::geo::BoundingBox;
use crate::record::CanonicalRecord;

/// Property name → canonical value type, one output row per entry.
static DIMENSIONS: &[(&str, &str)] = &[
    ("heavy", "HEAVY"),
    ("car", "CAR"),
    ("bike", "BIKE"),
    ("pedestrian", "PEDESTRIAN"),
    ("v85", "V85"),
];

pub(crate) fn convert(envelope: &Envelope, bbox: &BoundingBox) -> Result<Conversion> {
    if !envelope.is_ok() {
        return Ok(Conversion::Unpublishable);
    }

    let body = envelope.body_json()?;
    let features = body
        .get("features")
        .and_then(Value::as_array)
        .context("telraam body has no features array")?;

    let mut rows = Vec::new();

    for feature in features {
        let ring = ring_coordinates(feature)?;
        if !bbox.contains_ring(&ring) {
            continue;
        }

        let props = feature
            .get("properties")
            .and_then(Value::as_object)
            .context("telraam feature has no properties object")?;

        // Segments with a blank uptime never reported and carry no counts.
        let uptime = props
            .get("uptime")
            .context("telraam feature has no uptime property")?;
        if uptime.as_str().is_some_and(|s| s.trim().is_empty()) {
            continue;
        }

        let (first, last) = (
            ring.first().context("telraam feature ring is empty")?,
            ring.last().context("telraam feature ring is empty")?,
        );
        let longitude = (first.0 + last.0) / 2.0;
        let latitude = (first.1 + last.1) / 2.0;

        let date = props
            .get("date")
            .and_then(Value::as_str)
            .context("telraam feature has no date property")?;
        let timestamp = normalize_timestamp(date)?;

        for &(prop, value_type) in DIMENSIONS {
            rows.push(CanonicalRecord {
                uuid: Uuid::new_v4(),
                timestamp: timestamp.clone(),
                latitude,
                longitude,
                value_type: value_type.to_string(),
                value: props.get(prop).cloned().unwrap_or(Value::Null),
            });
        }
    }

    Ok(Conversion::Table(rows))
}

/// Extracts the segment's coordinate ring as `(longitude, latitude)` pairs.
fn ring_coordinates(feature: &Value) -> Result<Vec<(f64, f64)>> {
    let ring = feature
        .get("geometry")
        .and_then(|g| g.get("coordinates"))
        .and_then(Value::as_array)
        .and_then(|outer| outer.first())
        .and_then(Value::as_array)
        .context("telraam feature has no coordinate ring")?;

    ring.iter()
        .map(|pair| {
            let lon = pair.get(0).and_then(Value::as_f64);
            let lat = pair.get(1).and_then(Value::as_f64);
            lon.zip(lat)
                .context("telraam coordinate is not a [lon, lat] pair")
        })
        .collect()
}

/// Parses the segment timestamp, dropping the timezone after the parse.
///
/// The provider usually sends fractional seconds with an offset; older
/// payloads carry a bare `+00:00` suffix instead.
fn normalize_timestamp(raw: &str) -> Result<String> {
    let parsed = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%z")
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S+00:00"))
        .with_context(|| format!("unparseable telraam timestamp '{raw}'"))?;

    Ok(parsed.format("%Y-%m-%d %H:%M:%S").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_box() -> BoundingBox {
        BoundingBox::new(50.0, 51.0, 4.0, 5.0).unwrap()
    }

    fn feature(ring: Value, uptime: &str) -> Value {
        json!({
            "geometry": { "coordinates": [ring] },
            "properties": {
                "date": "2024-03-01 10:00:00.000000+00:00",
                "uptime": uptime,
                "heavy": 4.2,
                "car": 120,
                "bike": 17,
                "pedestrian": 8,
                "v85": 42.5
            }
        })
    }

    fn envelope_for(features: Vec<Value>) -> Envelope {
        Envelope {
            uuid: None,
            status_code: 200,
            time_sent: None,
            body: json!({ "features": features }),
        }
    }

    fn rows(conversion: Conversion) -> Vec<CanonicalRecord> {
        match conversion {
            Conversion::Table(rows) => rows,
            Conversion::Unpublishable => panic!("expected a table"),
        }
    }

    #[test]
    fn test_non_200_is_unpublishable() {
        let envelope = Envelope {
            uuid: None,
            status_code: 404,
            time_sent: None,
            body: Value::String("ignored".into()),
        };
        assert!(matches!(
            convert(&envelope, &test_box()).unwrap(),
            Conversion::Unpublishable
        ));
    }

    #[test]
    fn test_kept_feature_pivots_to_five_rows() {
        let ring = json!([[4.2, 50.2], [4.4, 50.4]]);
        let envelope = envelope_for(vec![feature(ring, "120")]);

        let rows = rows(convert(&envelope, &test_box()).unwrap());

        assert_eq!(rows.len(), 5);
        let types: Vec<&str> = rows.iter().map(|r| r.value_type.as_str()).collect();
        assert_eq!(types, ["HEAVY", "CAR", "BIKE", "PEDESTRIAN", "V85"]);

        // All five rows share the midpoint and the normalized timestamp.
        for row in &rows {
            assert_eq!(row.longitude, (4.2 + 4.4) / 2.0);
            assert_eq!(row.latitude, (50.2 + 50.4) / 2.0);
            assert_eq!(row.timestamp, "2024-03-01 10:00:00");
        }

        // Each row has its own identifier.
        assert_ne!(rows[0].uuid, rows[1].uuid);
    }

    #[test]
    fn test_feature_outside_box_is_dropped() {
        let ring = json!([[4.2, 50.2], [5.4, 50.4]]);
        let envelope = envelope_for(vec![feature(ring, "120")]);

        assert!(rows(convert(&envelope, &test_box()).unwrap()).is_empty());
    }

    #[test]
    fn test_blank_uptime_is_dropped_even_inside_box() {
        let ring = json!([[4.2, 50.2], [4.4, 50.4]]);
        let envelope = envelope_for(vec![feature(ring, "")]);

        assert!(rows(convert(&envelope, &test_box()).unwrap()).is_empty());
    }

    #[test]
    fn test_numeric_uptime_is_kept() {
        let ring = json!([[4.2, 50.2], [4.4, 50.4]]);
        let mut f = feature(ring, "x");
        f["properties"]["uptime"] = json!(0.75);
        let envelope = envelope_for(vec![f]);

        assert_eq!(rows(convert(&envelope, &test_box()).unwrap()).len(), 5);
    }

    #[test]
    fn test_missing_uptime_is_an_error() {
        let ring = json!([[4.2, 50.2], [4.4, 50.4]]);
        let mut f = feature(ring, "120");
        f["properties"].as_object_mut().unwrap().remove("uptime");
        let envelope = envelope_for(vec![f]);

        assert!(convert(&envelope, &test_box()).is_err());
    }

    #[test]
    fn test_missing_features_array_is_an_error() {
        let envelope = Envelope {
            uuid: None,
            status_code: 200,
            time_sent: None,
            body: json!({}),
        };
        assert!(convert(&envelope, &test_box()).is_err());
    }

    #[test]
    fn test_missing_dimension_property_becomes_null() {
        let ring = json!([[4.2, 50.2], [4.4, 50.4]]);
        let mut f = feature(ring, "120");
        f["properties"].as_object_mut().unwrap().remove("v85");
        let envelope = envelope_for(vec![f]);

        let rows = rows(convert(&envelope, &test_box()).unwrap());
        assert_eq!(rows[4].value_type, "V85");
        assert!(rows[4].value.is_null());
    }

    #[test]
    fn test_timestamp_fallback_format() {
        assert_eq!(
            normalize_timestamp("2024-03-01 10:00:00+00:00").unwrap(),
            "2024-03-01 10:00:00"
        );
    }

    #[test]
    fn test_timestamp_primary_format_with_offset() {
        // Non-UTC offsets are normalized to UTC before the timezone is dropped.
        assert_eq!(
            normalize_timestamp("2024-03-01 10:00:00.000000+01:00").unwrap(),
            "2024-03-01 09:00:00"
        );
    }

    #[test]
    fn test_unparseable_timestamp_is_an_error() {
        assert!(normalize_timestamp("yesterday").is_err());
    }
}
