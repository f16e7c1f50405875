//! The outer JSON wrapper every provider delivers its payload in.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// Envelope wrapping a provider payload.
///
/// `body` is either a JSON-encoded string or an already-structured value;
/// upstream is not consistent about which, so both are accepted.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    /// Request id assigned by the upstream collector, carried for log
    /// correlation only.
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(rename = "statusCode")]
    pub status_code: i64,
    #[serde(rename = "timeSent", default)]
    pub time_sent: Option<String>,
    #[serde(default)]
    pub body: Value,
}

impl Envelope {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("malformed provider envelope")
    }

    /// True when the upstream fetch succeeded and the body is publishable.
    pub fn is_ok(&self) -> bool {
        self.status_code == 200
    }

    /// Returns the body as structured JSON, decoding it first if the
    /// envelope carried it as a string.
    pub fn body_json(&self) -> Result<Value> {
        match &self.body {
            Value::String(s) => serde_json::from_str(s).context("envelope body is not valid JSON"),
            other => Ok(other.clone()),
        }
    }
}
