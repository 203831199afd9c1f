//! Azure Event Grid push format.
//!
//! Event Grid posts a JSON array holding a single event. Subscriptions are
//! validated with a [`VALIDATION_EVENT`] delivered in the same shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, Result};

/// Event type raised when Event Grid validates an endpoint.
pub const VALIDATION_EVENT: &str = "Microsoft.EventGrid.SubscriptionValidationEvent";

/// Event Grid event.
///
/// The top-level properties are common to every publisher, `data` is
/// specific to each event type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventGridEvent {
    /// Resource path to the event source, set by Event Grid.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub topic: String,
    /// Publisher-defined path to the event subject.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_type: String,
    /// Absent on validation events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub metadata_version: String,
}

impl EventGridEvent {
    /// Whether this is a subscription validation handshake.
    pub fn is_validation(&self) -> bool {
        self.event_type == VALIDATION_EVENT
    }
}

/// Decode a request body and return its single event.
///
/// Only the first element is used. Any further element is reported and
/// dropped, it does not fail the decode.
pub fn decode(body: &[u8]) -> Result<EventGridEvent> {
    let events: Vec<Value> =
        serde_json::from_slice(body).map_err(GatewayError::malformed)?;
    let count = events.len();

    let Some(first) = events.into_iter().next() else {
        return Err(GatewayError::malformed("empty event array"));
    };
    let event: EventGridEvent =
        serde_json::from_value(first).map_err(GatewayError::malformed)?;

    if count > 1 {
        tracing::warn!(
            event_id = %event.id,
            ignored = count - 1,
            "event grid delivered more than one event, extra events dropped"
        );
    }

    Ok(event)
}
