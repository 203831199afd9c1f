//! Canonical event envelope shared by both push protocols.
//!
//! Field names follow the CloudEvents v0.1 JSON format. Empty fields are
//! omitted when serializing so a decoded envelope re-encodes to the shape it
//! arrived in.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Payload attached to an event.
///
/// JSON-like content types carry a parsed document; anything else is kept
/// as the text it arrived as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Data {
    /// Raw payload, stored verbatim.
    Text(String),
    /// Parsed JSON payload.
    Json(Value),
}

impl Data {
    /// Parsed document, if any.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Data::Json(value) => Some(value),
            Data::Text(_) => None,
        }
    }

    /// Raw text, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Data::Text(text) => Some(text),
            Data::Json(_) => None,
        }
    }
}

/// Normalized representation of one inbound event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEnvelope {
    /// Event type, e.g. `com.example.someevent`. Used as the routing kind.
    #[serde(
        default,
        deserialize_with = "nullable_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub event_type: String,
    /// Version of the event type itself.
    #[serde(
        default,
        deserialize_with = "nullable_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub event_type_version: String,
    /// Version of the envelope format.
    #[serde(
        rename = "cloudEventsVersion",
        default,
        deserialize_with = "nullable_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub spec_version: String,
    /// Origin URI.
    #[serde(
        default,
        deserialize_with = "nullable_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub source: String,
    #[serde(
        rename = "eventID",
        default,
        deserialize_with = "nullable_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub event_id: String,
    /// Kept as received, never reparsed.
    #[serde(
        default,
        deserialize_with = "nullable_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub event_time: String,
    /// MIME type describing how `data` is encoded.
    #[serde(
        default,
        deserialize_with = "nullable_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub content_type: String,
    /// Publisher-defined attributes, values of any shape.
    #[serde(
        default,
        deserialize_with = "nullable_map",
        skip_serializing_if = "Map::is_empty"
    )]
    pub extensions: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
}

impl CanonicalEnvelope {
    /// Get an extension by name.
    pub fn extension(&self, name: &str) -> Option<&Value> {
        self.extensions.get(name)
    }
}

// `null` reads as an unset attribute.
fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_map<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sample_envelopes() {
        let samples = [
            (
                include_str!("../tests/fixtures/cloudevents-xml.json"),
                "A234-1234-1234",
                "text/xml",
                Some("<much wow=\"xml\"/>"),
            ),
            (
                include_str!("../tests/fixtures/cloudevents-thrift.json"),
                "B234-1234-1234",
                "application/vnd.apache.thrift.binary",
                Some("... base64 encoded string ..."),
            ),
            (
                include_str!("../tests/fixtures/cloudevents-json.json"),
                "C234-1234-1234",
                "application/json",
                None,
            ),
        ];

        for (raw, id, content_type, text) in samples {
            let envelope: CanonicalEnvelope = serde_json::from_str(raw).unwrap();

            assert_eq!(envelope.spec_version, "0.1");
            assert_eq!(envelope.event_type, "com.example.someevent");
            assert_eq!(envelope.event_type_version, "1.0");
            assert_eq!(envelope.source, "/mycontext");
            assert_eq!(envelope.event_time, "2018-04-05T17:31:00Z");
            assert_eq!(
                envelope.extension("comExampleExtension"),
                Some(&json!("value"))
            );
            assert_eq!(envelope.event_id, id);
            assert_eq!(envelope.content_type, content_type);

            let data = envelope.data.as_ref().unwrap();
            match text {
                Some(text) => assert_eq!(data.as_text(), Some(text)),
                None => {
                    let data = data.as_json().unwrap();
                    assert_eq!(data["appinfoA"], "abc");
                    assert_eq!(data["appinfoB"], 123);
                    assert_eq!(data["appinfoC"], true);
                },
            }
        }
    }

    #[test]
    fn test_reencode_is_lossless() {
        let raw = include_str!("../tests/fixtures/cloudevents-json.json");
        let envelope: CanonicalEnvelope = serde_json::from_str(raw).unwrap();

        let encoded = serde_json::to_vec(&envelope).unwrap();
        let decoded: CanonicalEnvelope = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(envelope, decoded);
    }

    #[test]
    fn test_compact_envelope_is_echoed_verbatim() {
        let raw = r#"{"eventType":"com.example.someevent","cloudEventsVersion":"0.1","source":"/mycontext","eventID":"C234-1234-1234","eventTime":"2018-04-05T17:31:00Z","contentType":"application/json","data":{"appinfoA":"abc"}}"#;
        let envelope: CanonicalEnvelope = serde_json::from_str(raw).unwrap();

        assert_eq!(serde_json::to_string(&envelope).unwrap(), raw);
    }

    #[test]
    fn test_null_fields() {
        let envelope: CanonicalEnvelope =
            serde_json::from_str(r#"{"eventType":"a","extensions":null,"data":null}"#)
                .unwrap();

        assert!(envelope.extensions.is_empty());
        assert!(envelope.data.is_none());
        assert_eq!(serde_json::to_string(&envelope).unwrap(), r#"{"eventType":"a"}"#);
    }

    #[test]
    fn test_null_attributes_are_unset() {
        let envelope: CanonicalEnvelope = serde_json::from_str(
            r#"{"eventType":"a","eventTypeVersion":null,"cloudEventsVersion":null,"source":null,"eventID":null,"eventTime":null,"contentType":null}"#,
        )
        .unwrap();

        assert_eq!(envelope.event_type, "a");
        assert!(envelope.source.is_empty());
        assert!(envelope.event_id.is_empty());
        assert!(envelope.content_type.is_empty());
        assert_eq!(serde_json::to_string(&envelope).unwrap(), r#"{"eventType":"a"}"#);
    }

    #[test]
    fn test_unknown_extension_shapes_are_kept() {
        let raw = json!({
            "eventType": "a",
            "extensions": { "nested": { "list": [1, 2, 3] }, "flag": true },
        });
        let envelope: CanonicalEnvelope = serde_json::from_value(raw).unwrap();

        assert_eq!(
            envelope.extension("nested"),
            Some(&json!({ "list": [1, 2, 3] }))
        );
        assert_eq!(envelope.extension("flag"), Some(&json!(true)));
    }
}
