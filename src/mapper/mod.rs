//! The CloudEvents Attribute Mapper (M): static per-version tables mapping
//! abstract attribute keys to wire (HTTP header) names and internal
//! (routing-message header) names, plus the `decode`/`encode` pure
//! functions built on top of them.

mod structured;
pub mod tables;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::message::Message;
use crate::spec_version::SpecVersion;
use tables::Attribute;

/// CloudEvents structured content mode's MIME type.
pub const CLOUDEVENTS_JSON_HEADER: &str = "application/cloudevents+json";

/// Abstraction over "anything that looks like an HTTP header map", so the
/// Inbound Dispatcher can decode against `actix_web::http::HeaderMap`
/// without this module depending on actix at all — the same seam the
/// teacher draws between its framework-agnostic `binding::http` module and
/// the `binding::actix` glue.
pub trait Headers<'a> {
    type Iterator: Iterator<Item = (&'a str, &'a str)>;

    fn get(&'a self, name: &str) -> Option<&'a str>;
    fn iter(&'a self) -> Self::Iterator;
}

/// Values this transport can synthesize for attributes missing from an
/// outbound message (§4.1: "For each mandatory attribute missing in the
/// input ... synthesise").
#[derive(Debug, Clone, Default)]
pub struct AttributeDefaults {
    /// `knative://<kind>/<name>`, per §9 "Attribute synthesis determinism".
    pub default_source: Option<String>,
    /// The service's `knative.event.type` metadata, if declared.
    pub default_type: Option<String>,
}

fn is_structured_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim_start().starts_with(CLOUDEVENTS_JSON_HEADER))
        .unwrap_or(false)
}

/// Sniffs the active spec version off a request, trying v0.2/v0.3's shared
/// `ce-specversion` header first, falling back to v0.1's
/// `CE-CloudEventsVersion`, and finally (structured mode) the JSON body's
/// `specversion`/`cloudEventsVersion` key.
pub fn detect_spec_version<'a, H: Headers<'a>>(
    headers: &'a H,
    body: &[u8],
    content_type: Option<&str>,
) -> Result<SpecVersion> {
    if let Some(v) = headers.get("ce-specversion") {
        return SpecVersion::try_from(v);
    }
    if let Some(v) = headers.get("CE-CloudEventsVersion") {
        return SpecVersion::try_from(v);
    }
    if is_structured_content_type(content_type) {
        let json: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| Error::decode(format!("malformed JSON body: {}", e)))?;
        if let Some(v) = json.get("specversion").and_then(|v| v.as_str()) {
            return SpecVersion::try_from(v);
        }
        if let Some(v) = json.get("cloudEventsVersion").and_then(|v| v.as_str()) {
            return SpecVersion::try_from(v);
        }
    }
    Err(Error::decode("request carries no specversion attribute"))
}

/// `M.decode`: turn HTTP headers + body into `(internal headers, payload)`,
/// represented here as a [`Message`].
///
/// Structured mode (`content_type` is `application/cloudevents+json`):
/// parses the JSON body, lifts each recognised attribute into its internal
/// header name, and takes `data` as the payload.
///
/// Binary mode: copies each recognised HTTP header to both its http-form
/// and internal-form names, and takes the request body as the payload.
pub fn decode<'a, H: Headers<'a>>(
    headers: &'a H,
    body: Vec<u8>,
    content_type: Option<&str>,
    spec: SpecVersion,
) -> Result<Message> {
    if is_structured_content_type(content_type) {
        decode_structured(body, spec)
    } else {
        decode_binary(headers, body, spec)
    }
}

fn decode_binary<'a, H: Headers<'a>>(
    headers: &'a H,
    body: Vec<u8>,
    spec: SpecVersion,
) -> Result<Message> {
    let mut message = Message::with_payload(body);
    for row in tables::table(spec) {
        let http_name = match row.http_name {
            Some(n) => n,
            None => continue,
        };
        if let Some(value) = headers.get(http_name) {
            message.set_header(http_name, value);
            message.set_header(row.attribute.internal_name(), value);
        }
    }
    Ok(message)
}

fn decode_structured(body: Vec<u8>, spec: SpecVersion) -> Result<Message> {
    let json: serde_json::Value =
        serde_json::from_slice(&body).map_err(|e| Error::decode(format!("malformed JSON body: {}", e)))?;
    let object = json
        .as_object()
        .ok_or_else(|| Error::decode("structured CloudEvents body must be a JSON object"))?;

    let mut message = Message::new();
    for row in tables::table(spec) {
        let key = match row.structured_key {
            Some(k) => k,
            None => continue,
        };
        if let Some(value) = object.get(key) {
            if let Some(s) = value.as_str() {
                message.set_header(row.attribute.internal_name(), s);
            }
        }
    }

    message.set_payload(structured::extract_data(object)?);
    Ok(message)
}

/// `M.encode`: emit the binary-mode representation of a message's internal
/// headers for the given spec version, synthesising missing mandatory
/// attributes (`id`, `time`, `source`, `type`) per §4.1.
///
/// Returns the HTTP headers to emit (wire names) and the effective
/// content-type, if any.
pub fn encode(
    message: &Message,
    spec: SpecVersion,
    defaults: &AttributeDefaults,
) -> (Vec<(String, String)>, Option<String>) {
    let mut out = Vec::new();
    let mut content_type = None;

    for row in tables::table(spec) {
        let http_name = match row.http_name {
            Some(n) => n,
            None => continue,
        };

        let value = message
            .header(row.attribute.internal_name())
            .or_else(|| message.header(http_name))
            .map(str::to_owned)
            .or_else(|| synthesize(row.attribute, spec, defaults));

        if let Some(value) = value {
            if row.attribute == Attribute::DataContentType {
                content_type = Some(value.clone());
            }
            out.push((http_name.to_owned(), value));
        }
    }

    (out, content_type)
}

fn synthesize(attribute: Attribute, spec: SpecVersion, defaults: &AttributeDefaults) -> Option<String> {
    match attribute {
        Attribute::Version => Some(spec.to_string()),
        Attribute::Id => Some(Uuid::new_v4().to_string()),
        Attribute::Time => Some(Utc::now().to_rfc3339()),
        Attribute::Source => defaults.default_source.clone(),
        Attribute::Type => defaults.default_type.clone(),
        Attribute::DataContentType | Attribute::Subject => None,
    }
}
