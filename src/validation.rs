//! Subscription validation handshake.
//!
//! Event Grid validates every endpoint before delivering events, including
//! endpoints subscribed with the CloudEvents schema: the validation request
//! still arrives as an Event Grid array. Bodies are therefore sniffed for
//! [`VALIDATION_EVENT`] before any protocol decoder runs.

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{GatewayError, Result};
use crate::eventgrid::{self, EventGridEvent, VALIDATION_EVENT};

const VALIDATION_CODE: &str = "validationCode";

/// Outcome of sniffing a raw body.
#[derive(Debug)]
pub enum Classification {
    /// Validation request, decoded as an Event Grid event.
    Handshake(EventGridEvent),
    /// Anything else. Left to the protocol decoder.
    NormalEvent,
    /// Mentions the validation event but is not an Event Grid array.
    Malformed(GatewayError),
}

/// Sniff `body` for a validation request without decoding it first.
pub fn classify(body: &[u8]) -> Classification {
    let needle = VALIDATION_EVENT.as_bytes();
    if !body.windows(needle.len()).any(|window| window == needle) {
        return Classification::NormalEvent;
    }

    match eventgrid::decode(body) {
        Ok(event) => Classification::Handshake(event),
        Err(err) => Classification::Malformed(err),
    }
}

/// JSON key used to echo the validation code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AckKey {
    /// Current Event Grid contract.
    #[default]
    ValidationResponse,
    /// Older revisions echoed under the request key.
    ValidationCode,
}

impl AckKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckKey::ValidationResponse => "validationResponse",
            AckKey::ValidationCode => VALIDATION_CODE,
        }
    }
}

/// Acknowledgement of a validation request, `{"validationResponse": code}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationAck {
    /// Code as received, echoed unchanged.
    pub code: Value,
    key: AckKey,
}

impl ValidationAck {
    /// Use another key to echo the code.
    pub fn with_key(mut self, key: AckKey) -> Self {
        self.key = key;
        self
    }
}

impl Serialize for ValidationAck {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.key.as_str(), &self.code)?;
        map.end()
    }
}

impl IntoResponse for ValidationAck {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Answer a validation event with its `data.validationCode`.
pub fn respond(event: &EventGridEvent) -> Result<ValidationAck> {
    let code = event
        .data
        .as_ref()
        .and_then(Value::as_object)
        .and_then(|data| data.get(VALIDATION_CODE))
        .filter(|code| !code.is_null())
        .cloned()
        .ok_or(GatewayError::MissingValidationCode)?;

    Ok(ValidationAck {
        code,
        key: AckKey::default(),
    })
}
