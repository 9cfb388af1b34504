//! The Outbound Producer (P): for a target service definition, synthesises
//! CloudEvent headers, applies the six-layer override precedence of §4.5,
//! performs the HTTP request, and propagates the result or a structured
//! error back to the routing engine.
//!
//! Grounded directly on the teacher's `binding::reqwest` module
//! (`RequestSerializer`-style header synthesis, response read-back), using
//! `reqwest` with `rustls-tls` exactly as that module's `reqwest-lib`
//! dependency does.

use std::collections::HashMap;

use reqwest_lib as reqwest;

use crate::config::TransportConfig;
use crate::environment::ServiceDefinition;
use crate::error::{Error, Result};
use crate::mapper::{self, tables, AttributeDefaults};
use crate::message::Message;
use crate::spec_version::SpecVersion;
use crate::uri::EndpointUri;

const RESPONSE_CODE_HEADER: &str = "HTTP_RESPONSE_CODE";

/// The Outbound Producer. Owns the `reqwest::Client` and a reference to the
/// process-wide [`TransportConfig`] (§4.5 layer b, §4.5 "scheme = http
/// unless TLS is configured on the transport").
pub struct Producer {
    client: reqwest::Client,
    config: std::sync::Arc<TransportConfig>,
}

impl Producer {
    pub fn new(client: reqwest::Client, config: std::sync::Arc<TransportConfig>) -> Producer {
        Producer { client, config }
    }

    /// Delivers `message` as a CloudEvents HTTP request to the sink
    /// `service`, per §4.5.
    ///
    /// `uri` carries the Endpoint URI layer's query-parameter overrides
    /// (§4.5 layer c), if the call originated from a `knative:<kind>/<name>?...`
    /// endpoint URI rather than a bare environment lookup.
    pub async fn send(
        &self,
        service: &ServiceDefinition,
        spec: SpecVersion,
        message: Message,
        uri: Option<&EndpointUri>,
    ) -> Result<Message> {
        let body = message
            .payload()
            .ok_or_else(|| Error::illegal_argument("body must not be null"))?
            .to_vec();

        let host = service.host.as_deref().filter(|h| !h.is_empty()).ok_or_else(|| {
            Error::http_operation_failed(service.canonical_source(), None, "host is not defined")
        })?;

        let url = self.build_url(host, service.port, service.service_path());

        let defaults = AttributeDefaults {
            default_source: Some(service.canonical_source()),
            default_type: service.event_type().map(str::to_string),
        };

        let (headers, _) = self.synthesize_headers(service, spec, &message, &defaults, uri);

        let mut request = self.client.post(&url);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let request = request.body(body);

        let response = request.send().await.map_err(|e| {
            Error::http_operation_failed(url.clone(), None, format!("{}", e))
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::NO_CONTENT {
            let mut reply = Message::new();
            reply.set_header(RESPONSE_CODE_HEADER, status.as_u16().to_string());
            return Ok(reply);
        }

        if status.is_success() {
            let status_code = status.as_u16();
            let bytes = response.bytes().await.map_err(|e| {
                Error::http_operation_failed(url.clone(), Some(status_code), format!("{}", e))
            })?;
            let mut reply = Message::with_payload(bytes.to_vec());
            reply.set_header(RESPONSE_CODE_HEADER, status_code.to_string());
            return Ok(reply);
        }

        // 3xx/4xx/5xx: by default a failure, carrying URL, status code and
        // status message (§4.5).
        let status_code = status.as_u16();
        let reason = status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string();
        Err(Error::http_operation_failed(url, Some(status_code), reason))
    }

    fn build_url(&self, host: &str, port: Option<u16>, path: &str) -> String {
        let scheme = self.config.scheme();
        match port {
            Some(port) => format!("{}://{}:{}{}", scheme, host, port, path),
            None => format!("{}://{}{}", scheme, host, path),
        }
    }

    /// Applies the six-layer override precedence of §4.5: environment (a),
    /// component configuration (b), endpoint URI (c), the message's
    /// `CamelCloudEvent*` internal headers (d), the message's explicit
    /// wire-form headers (e), and content-type (f).
    ///
    /// `M.encode`'s output already reflects (d) and (e) for the seven known
    /// CloudEvent attributes (it prefers internal-form values, falling
    /// back to wire-form, per §4.1/§9 "Message-header identity"). Layers
    /// (a)-(c) are applied on top of that baseline and then (d)/(e) are
    /// *reapplied* so they retain the higher priority the spec assigns them
    /// even where an override layer names the same header.
    fn synthesize_headers(
        &self,
        service: &ServiceDefinition,
        spec: SpecVersion,
        message: &Message,
        defaults: &AttributeDefaults,
        uri: Option<&EndpointUri>,
    ) -> (Vec<(String, String)>, Option<String>) {
        let (base, _) = mapper::encode(message, spec, defaults);
        let mut map: HashMap<String, String> = base.into_iter().collect();

        // (a) environment layer
        for (header, value) in service.overrides() {
            map.insert(header.to_string(), value.to_string());
        }
        // (b) component configuration layer
        for (header, value) in self.config.overrides().iter() {
            map.insert(header.clone(), value.clone());
        }
        // (c) endpoint URI layer
        if let Some(uri) = uri {
            for (header, value) in uri.overrides() {
                map.insert(header.to_string(), value.to_string());
            }
        }
        // (d) route layer: CamelCloudEvent* internal headers win over (a)-(c)
        for row in tables::table(spec) {
            if let Some(http_name) = row.http_name {
                if let Some(value) = message.header(row.attribute.internal_name()) {
                    map.insert(http_name.to_string(), value.to_string());
                }
            }
        }
        // (e) route layer: explicit HTTP-wire headers on the message win over everything
        let internal_names: Vec<&str> = tables::table(spec)
            .iter()
            .map(|row| row.attribute.internal_name())
            .collect();
        for (name, value) in message.headers() {
            if internal_names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                continue;
            }
            map.insert(name.to_string(), value.to_string());
        }

        // (f) content-type
        let content_type = message
            .header("Content-Type")
            .map(str::to_string)
            .or_else(|| service.content_type().map(str::to_string));
        match &content_type {
            Some(ct) => {
                map.insert("Content-Type".to_string(), ct.clone());
            }
            None => {
                map.remove("Content-Type");
            }
        }

        (map.into_iter().collect(), content_type)
    }
}
