//! Converter for the openSenseMap environmental-sensor network.
//!
//! Ingestion for this provider is not implemented yet. The variant stays
//! registered so arriving envelopes resolve to a clean "nothing to upload"
//! instead of an unknown-provider warning.
//!
//! TODO: implement box filtering and measurement extraction once the
//! senseBox payload shape is settled.

use anyhow::Result;
use tracing::debug;

use crate::converters::converter::Conversion;
use crate::envelope::Envelope;
use crate::geo::BoundingBox;

pub(crate) fn convert(envelope: &Envelope, bbox: &BoundingBox) -> Result<Conversion> {
    if !envelope.is_ok() {
        return Ok(Conversion::Unpublishable);
    }

    debug!(
        ?bbox,
        request = envelope.uuid.as_deref().unwrap_or("-"),
        "opensensemap ingestion not implemented, emitting empty table"
    );

    Ok(Conversion::Table(Vec::new()))
}
