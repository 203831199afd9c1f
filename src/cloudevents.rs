//! CloudEvents v0.1 HTTP transport binding.
//!
//! An envelope either travels as one JSON document (structured mode, with
//! the [`STRUCTURED_CONTENT_TYPE`] media type) or spread over `CE-*` headers
//! with the payload as the raw body (header mode).

use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use serde_json::{Map, Value};

use crate::envelope::{CanonicalEnvelope, Data};
use crate::error::{GatewayError, Result};

/// Media type of a structured-mode request.
pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";

// The binding names headers in CamelCase, which does not survive HTTP header
// normalization. Lookups are case-insensitive.
pub const CE_CLOUD_EVENTS_VERSION: &str = "CE-CloudEventsVersion";
pub const CE_EVENT_TYPE: &str = "CE-EventType";
pub const CE_EVENT_TYPE_VERSION: &str = "CE-EventTypeVersion";
pub const CE_EVENT_ID: &str = "CE-EventID";
pub const CE_SOURCE: &str = "CE-Source";
pub const CE_EVENT_TIME: &str = "CE-EventTime";
/// Any header starting with this prefix is an extension.
pub const CE_EXTENSION_PREFIX: &str = "CE-X-";

/// How an envelope is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Whole envelope in the body.
    Structured,
    /// Envelope attributes in headers, payload in the body.
    Headers,
}

impl Mode {
    /// Pick the encoding from the request `content-type`.
    ///
    /// Only an exact match of [`STRUCTURED_CONTENT_TYPE`] selects structured
    /// mode. Header mode is the fallback for everything else.
    pub fn detect(headers: &HeaderMap) -> Self {
        match headers.get(CONTENT_TYPE) {
            Some(ct) if ct.as_bytes() == STRUCTURED_CONTENT_TYPE.as_bytes() => {
                Mode::Structured
            },
            _ => Mode::Headers,
        }
    }
}

/// Decode a request into an envelope, whichever mode it uses.
pub fn decode(headers: &HeaderMap, body: &[u8]) -> Result<CanonicalEnvelope> {
    let mode = Mode::detect(headers);
    tracing::debug!(?mode, size_bytes = body.len(), "decoding cloud event");

    match mode {
        Mode::Structured => decode_from_body(body),
        Mode::Headers => decode_from_headers(headers, body),
    }
}

/// Decode a structured-mode body.
///
/// When `contentType` is JSON-like, `data` is always [`Data::Json`], even
/// for a bare JSON string.
pub fn decode_from_body(body: &[u8]) -> Result<CanonicalEnvelope> {
    let mut envelope: CanonicalEnvelope =
        serde_json::from_slice(body).map_err(GatewayError::malformed)?;

    if is_json(&envelope.content_type) {
        if let Some(Data::Text(text)) = envelope.data {
            envelope.data = Some(Data::Json(Value::String(text)));
        }
    }

    Ok(envelope)
}

/// Build an envelope from `CE-*` headers.
///
/// Missing headers leave their field empty. The body is parsed when the
/// content type is JSON-like and stored verbatim otherwise.
pub fn decode_from_headers(
    headers: &HeaderMap,
    body: &[u8],
) -> Result<CanonicalEnvelope> {
    let content_type = header(headers, CONTENT_TYPE.as_str())?;

    let data = match content_type.as_deref() {
        Some(ct) if is_json(ct) => Data::Json(
            serde_json::from_slice::<Value>(body).map_err(GatewayError::malformed)?,
        ),
        _ => Data::Text(String::from_utf8(body.to_vec()).map_err(|_| {
            GatewayError::UnsupportedEncoding("non-JSON body is not UTF-8".into())
        })?),
    };

    Ok(CanonicalEnvelope {
        event_type: header(headers, CE_EVENT_TYPE)?.unwrap_or_default(),
        event_type_version: header(headers, CE_EVENT_TYPE_VERSION)?
            .unwrap_or_default(),
        spec_version: header(headers, CE_CLOUD_EVENTS_VERSION)?.unwrap_or_default(),
        source: header(headers, CE_SOURCE)?.unwrap_or_default(),
        event_id: header(headers, CE_EVENT_ID)?.unwrap_or_default(),
        event_time: header(headers, CE_EVENT_TIME)?.unwrap_or_default(),
        content_type: content_type.unwrap_or_default(),
        extensions: extensions(headers)?,
        data: Some(data),
    })
}

/// Whether a MIME type denotes JSON content.
///
/// Matches `application/json`, `text/json` and any `+json` suffix,
/// ignoring case and parameters.
pub fn is_json(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    matches!(media_type.as_str(), "application/json" | "text/json")
        || media_type.ends_with("+json")
}

/// First value of a header, as text.
fn header(headers: &HeaderMap, name: &str) -> Result<Option<String>> {
    headers
        .get(name)
        .map(|value| {
            value.to_str().map(str::to_owned).map_err(|_| {
                GatewayError::UnsupportedEncoding(format!(
                    "`{name}` header is not visible ASCII"
                ))
            })
        })
        .transpose()
}

/// Collect `CE-X-*` headers, prefix stripped and lower-cased.
fn extensions(headers: &HeaderMap) -> Result<Map<String, Value>> {
    let prefix_len = CE_EXTENSION_PREFIX.len();
    let mut extensions = Map::new();

    for name in headers.keys() {
        let name = name.as_str();
        let is_extension = name
            .get(..prefix_len)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(CE_EXTENSION_PREFIX));
        if !is_extension {
            continue;
        }

        // `get` only returns the first value of a repeated header.
        if let Some(value) = header(headers, name)? {
            extensions.insert(name[prefix_len..].to_lowercase(), Value::String(value));
        }
    }

    Ok(extensions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn header_request() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CE_CLOUD_EVENTS_VERSION, HeaderValue::from_static("0.1"));
        headers.insert(CE_EVENT_TYPE, HeaderValue::from_static("com.example.someevent"));
        headers.insert(CE_EVENT_TYPE_VERSION, HeaderValue::from_static("1.0"));
        headers.insert(CE_EVENT_ID, HeaderValue::from_static("aaa-bbb-ccc"));
        headers.insert(CE_SOURCE, HeaderValue::from_static("/mycontext"));
        headers.insert(CE_EVENT_TIME, HeaderValue::from_static("2018-04-05T17:31:00Z"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert("CE-X-Example", HeaderValue::from_static("hello"));
        headers.insert("CE-X-TestExtension", HeaderValue::from_static("goodbye"));
        headers
    }

    #[test]
    fn test_decode_from_headers() {
        let envelope = decode_from_headers(&header_request(), b"payload").unwrap();

        assert_eq!(envelope.spec_version, "0.1");
        assert_eq!(envelope.event_type, "com.example.someevent");
        assert_eq!(envelope.event_type_version, "1.0");
        assert_eq!(envelope.event_id, "aaa-bbb-ccc");
        assert_eq!(envelope.source, "/mycontext");
        assert_eq!(envelope.event_time, "2018-04-05T17:31:00Z");
        assert_eq!(envelope.content_type, "text/plain");
        assert_eq!(envelope.data, Some(Data::Text("payload".into())));
        assert_eq!(envelope.extension("example"), Some(&json!("hello")));
        assert_eq!(envelope.extension("testextension"), Some(&json!("goodbye")));
    }

    #[test]
    fn test_text_body_is_not_parsed() {
        let body = br#"{"looks":"like json"}"#;
        let envelope = decode_from_headers(&header_request(), body).unwrap();

        assert_eq!(
            envelope.data,
            Some(Data::Text(r#"{"looks":"like json"}"#.into()))
        );
    }

    #[test]
    fn test_json_body_is_parsed() {
        let mut headers = header_request();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        let body = br#"{"a":1,"b":{"c":[true]},"d":null}"#;

        let envelope = decode_from_headers(&headers, body).unwrap();
        let data = envelope.data.unwrap();
        let data = data.as_json().unwrap().as_object().unwrap();

        assert_eq!(data.keys().collect::<Vec<_>>(), ["a", "b", "d"]);
        assert_eq!(data["b"], json!({ "c": [true] }));
    }

    #[test]
    fn test_json_body_variants() {
        let mut headers = header_request();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (body, expected) in [
            (r#""hello""#, json!("hello")),
            (r#"[1,"two",null]"#, json!([1, "two", null])),
            ("42", json!(42)),
        ] {
            let envelope = decode_from_headers(&headers, body.as_bytes()).unwrap();
            assert_eq!(envelope.data, Some(Data::Json(expected)));
        }
    }

    #[test]
    fn test_structured_json_string_data() {
        let envelope = decode_from_body(
            br#"{"eventType":"a","contentType":"application/json","data":"hello"}"#,
        )
        .unwrap();
        assert_eq!(envelope.data, Some(Data::Json(json!("hello"))));

        let envelope =
            decode_from_body(br#"{"eventType":"a","contentType":"text/xml","data":"<a/>"}"#)
                .unwrap();
        assert_eq!(envelope.data, Some(Data::Text("<a/>".into())));

        // re-encodes to the same wire shape either way.
        let raw = r#"{"eventType":"a","contentType":"application/json","data":"hello"}"#;
        let envelope = decode_from_body(raw.as_bytes()).unwrap();
        assert_eq!(serde_json::to_string(&envelope).unwrap(), raw);
    }

    #[test]
    fn test_null_attributes_in_body() {
        let envelope =
            decode_from_body(br#"{"eventType":"a","source":null}"#).unwrap();

        assert_eq!(envelope.event_type, "a");
        assert!(envelope.source.is_empty());
    }

    #[test]
    fn test_malformed_json_body() {
        let mut headers = header_request();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/json"));

        assert!(matches!(
            decode_from_headers(&headers, b"{"),
            Err(GatewayError::MalformedBody(_))
        ));
    }

    #[test]
    fn test_missing_headers_are_empty() {
        let envelope = decode_from_headers(&HeaderMap::new(), b"").unwrap();

        assert!(envelope.event_type.is_empty());
        assert!(envelope.content_type.is_empty());
        assert!(envelope.extensions.is_empty());
        assert_eq!(envelope.data, Some(Data::Text(String::new())));
    }

    #[test]
    fn test_extension_casing_and_first_value() {
        let mut headers = HeaderMap::new();
        headers.append("ce-x-MiXeD", HeaderValue::from_static("first"));
        headers.append("CE-X-MIXED", HeaderValue::from_static("second"));
        headers.append("Ce-X-Other", HeaderValue::from_static("other"));
        headers.append("x-ce-not-extension", HeaderValue::from_static("no"));

        let envelope = decode_from_headers(&headers, b"").unwrap();

        assert_eq!(envelope.extensions.len(), 2);
        assert_eq!(envelope.extension("mixed"), Some(&json!("first")));
        assert_eq!(envelope.extension("other"), Some(&json!("other")));
    }

    #[test]
    fn test_unsupported_encodings() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CE_EVENT_TYPE,
            HeaderValue::from_bytes(b"caf\xc3\xa9").unwrap(),
        );
        assert!(matches!(
            decode_from_headers(&headers, b""),
            Err(GatewayError::UnsupportedEncoding(_))
        ));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
        assert!(matches!(
            decode_from_headers(&headers, &[0xff, 0xfe]),
            Err(GatewayError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_decode_dispatch() {
        let envelope = decode(&header_request(), b"payload").unwrap();
        assert_eq!(envelope.event_id, "aaa-bbb-ccc");

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(STRUCTURED_CONTENT_TYPE));
        let body = include_str!("../tests/fixtures/cloudevents-xml.json");

        assert_eq!(Mode::detect(&headers), Mode::Structured);
        let envelope = decode(&headers, body.as_bytes()).unwrap();
        assert_eq!(envelope.event_id, "A234-1234-1234");
    }

    #[test]
    fn test_structured_type_with_parameters_uses_headers() {
        let mut headers = header_request();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/cloudevents+json; charset=utf-8"),
        );
        assert_eq!(Mode::detect(&headers), Mode::Headers);

        let envelope = decode(&headers, br#"{"eventID":"in-body"}"#).unwrap();
        assert_eq!(envelope.event_id, "aaa-bbb-ccc");
        assert_eq!(envelope.data, Some(Data::Json(json!({ "eventID": "in-body" }))));
    }

    #[test]
    fn test_decode_is_idempotent() {
        let body = include_str!("../tests/fixtures/cloudevents-json.json").as_bytes();

        assert_eq!(decode_from_body(body).unwrap(), decode_from_body(body).unwrap());
        assert_eq!(
            decode_from_headers(&header_request(), b"payload").unwrap(),
            decode_from_headers(&header_request(), b"payload").unwrap()
        );
    }

    #[test]
    fn test_is_json() {
        for hit in [
            "application/json",
            "text/json",
            "application/forever-chewing-bubble-gum+json",
            "Application/JSON",
            "application/json;charset=utf-8",
        ] {
            assert!(is_json(hit), "{hit}");
        }

        for miss in [
            "application/x-streussel-cake",
            "json/application",
            "text/plain+json-hippies",
            "",
        ] {
            assert!(!is_json(miss), "{miss}");
        }
    }
}
