use anyhow::Result;
use tracing::{info, warn};

use crate::converters::{opensensemap, sensor_community, telraam};
use crate::envelope::Envelope;
use crate::geo::BoundingBox;
use crate::record::{CanonicalRecord, ConversionResult};

/// The closed set of supported providers. Identifiers are fixed; there is no
/// dynamic registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    TrafficCounter,
    EnvironmentalSensor,
    CommunitySensor,
}

static CONVERTER_MAPPING: &[(&str, Provider)] = &[
    ("8c9a8f25-e54e-4884-aee6-a4529c5424ba", Provider::TrafficCounter),
    ("2889936e-8e2d-11ee-b9d1-0242ac120002", Provider::EnvironmentalSensor),
    ("017f12f5-8acb-4531-ab77-0e5208a31bca", Provider::CommunitySensor),
];

impl Provider {
    pub fn from_id(provider_id: &str) -> Option<Self> {
        CONVERTER_MAPPING
            .iter()
            .find(|(id, _)| *id == provider_id)
            .map(|&(_, provider)| provider)
    }

    /// External-facing label, used in output file names and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Provider::TrafficCounter => "TelRaam",
            Provider::EnvironmentalSensor => "OpenSenseMap",
            Provider::CommunitySensor => "SensorCommunity",
        }
    }

    fn convert(&self, envelope: &Envelope, bbox: &BoundingBox) -> Result<Conversion> {
        match self {
            Provider::TrafficCounter => telraam::convert(envelope, bbox),
            Provider::EnvironmentalSensor => opensensemap::convert(envelope, bbox),
            Provider::CommunitySensor => sensor_community::convert(envelope, bbox),
        }
    }
}

/// What a single provider conversion produced.
pub enum Conversion {
    /// Upstream reported a non-200 status; the envelope carries nothing
    /// publishable. Not an error.
    Unpublishable,
    /// Canonical rows, possibly empty after filtering.
    Table(Vec<CanonicalRecord>),
}

/// Outcome of dispatching one envelope. The three "write nothing" paths are
/// kept distinct so logs and tests can tell them apart.
#[derive(Debug)]
pub enum Outcome {
    /// No converter registered for the provider id.
    NoProvider,
    /// Known provider, but the upstream fetch had already failed.
    Unpublishable(Provider),
    /// Conversion ran; rows may still be empty.
    Published(ConversionResult),
}

/// Routes a raw envelope to the converter registered for `provider_id`.
///
/// Unknown ids and upstream failures are terminal non-errors; only a
/// malformed envelope or payload propagates as an error.
pub fn dispatch(provider_id: &str, raw: &str, bbox: &BoundingBox) -> Result<Outcome> {
    let Some(provider) = Provider::from_id(provider_id) else {
        warn!(provider_id, "no converter registered for provider");
        return Ok(Outcome::NoProvider);
    };

    let envelope = Envelope::parse(raw)?;

    match provider.convert(&envelope, bbox)? {
        Conversion::Unpublishable => {
            warn!(
                label = provider.label(),
                status = envelope.status_code,
                request = envelope.uuid.as_deref().unwrap_or("-"),
                "upstream reported failure; nothing to publish"
            );
            Ok(Outcome::Unpublishable(provider))
        }
        Conversion::Table(rows) => {
            info!(
                label = provider.label(),
                rows = rows.len(),
                sent_at = envelope.time_sent.as_deref().unwrap_or("-"),
                "conversion finished"
            );
            Ok(Outcome::Published(ConversionResult {
                provider_label: provider.label(),
                rows,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_box() -> BoundingBox {
        BoundingBox::new(50.0, 51.0, 4.0, 5.0).unwrap()
    }

    #[test]
    fn test_from_id_known_providers() {
        assert_eq!(
            Provider::from_id("8c9a8f25-e54e-4884-aee6-a4529c5424ba"),
            Some(Provider::TrafficCounter)
        );
        assert_eq!(
            Provider::from_id("2889936e-8e2d-11ee-b9d1-0242ac120002"),
            Some(Provider::EnvironmentalSensor)
        );
        assert_eq!(
            Provider::from_id("017f12f5-8acb-4531-ab77-0e5208a31bca"),
            Some(Provider::CommunitySensor)
        );
    }

    #[test]
    fn test_dispatch_unknown_provider() {
        let outcome = dispatch("not-a-provider", "{}", &test_box()).unwrap();
        assert!(matches!(outcome, Outcome::NoProvider));
    }

    #[test]
    fn test_dispatch_bad_status_is_unpublishable() {
        let raw = r#"{"statusCode":500,"body":""}"#;
        let outcome = dispatch("017f12f5-8acb-4531-ab77-0e5208a31bca", raw, &test_box()).unwrap();
        assert!(matches!(
            outcome,
            Outcome::Unpublishable(Provider::CommunitySensor)
        ));
    }

    #[test]
    fn test_dispatch_malformed_envelope_is_an_error() {
        let result = dispatch("017f12f5-8acb-4531-ab77-0e5208a31bca", "not json", &test_box());
        assert!(result.is_err());
    }

    #[test]
    fn test_dispatch_known_provider_publishes() {
        let raw = r#"{"statusCode":200,"body":"[]"}"#;
        let outcome = dispatch("017f12f5-8acb-4531-ab77-0e5208a31bca", raw, &test_box()).unwrap();
        match outcome {
            Outcome::Published(result) => {
                assert_eq!(result.provider_label, "SensorCommunity");
                assert!(result.rows.is_empty());
            }
            other => panic!("expected Published, got {other:?}"),
        }
    }
}
