use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Normalized, provider-agnostic output row.
///
/// Field order is the CSV column order consumed downstream:
/// `uuid,timestamp,latitude,longitude,valueType,sensorDataValue`.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalRecord {
    pub uuid: Uuid,
    pub timestamp: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "valueType")]
    pub value_type: String,
    /// Raw scalar as delivered by the provider; null serializes to an empty
    /// CSV field.
    #[serde(rename = "sensorDataValue")]
    pub value: Value,
}

/// The full output of one conversion. Empty `rows` is a valid terminal
/// state; nothing gets written for it.
#[derive(Debug)]
pub struct ConversionResult {
    pub provider_label: &'static str,
    pub rows: Vec<CanonicalRecord>,
}
