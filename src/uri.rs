//! The endpoint URI grammar (§6) that the hosting routing engine uses to
//! name a Knative destination:
//!
//! ```text
//! knative:<kind>/<name>[?<key>=<value>(&<key>=<value>)*]
//! ```
//!
//! Recognised query keys: `kind`, `apiVersion`, `replyWithCloudEvent`, and
//! any `ce.override.<http-header>` key. This module only parses the
//! grammar; resolving it against an [`Environment`](crate::environment::Environment)
//! is the attach/produce path's job (§4.2, §4.5).

use std::collections::HashMap;

use crate::environment::Kind;
use crate::error::{Error, Result};

/// A parsed `knative:<kind>/<name>[?...]` endpoint URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointUri {
    pub kind: Kind,
    pub name: String,
    pub query: HashMap<String, String>,
}

impl EndpointUri {
    /// `ce.override.<header>` query parameters, stripped of their prefix —
    /// the Endpoint URI layer of §4.5's override precedence.
    pub fn overrides(&self) -> Vec<(&str, &str)> {
        self.query
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix("ce.override.")
                    .map(|header| (header, v.as_str()))
            })
            .collect()
    }

    /// The `kind` query parameter, if present — part of the open question
    /// in §9 about strict-vs-wildcard matching against environment
    /// metadata; see `DESIGN.md` for the resolution.
    pub fn kind_override(&self) -> Option<&str> {
        self.query.get("kind").map(String::as_str)
    }

    pub fn api_version(&self) -> Option<&str> {
        self.query.get("apiVersion").map(String::as_str)
    }

    pub fn reply_with_cloudevent(&self) -> bool {
        self.query
            .get("replyWithCloudEvent")
            .map(|v| v == "true")
            .unwrap_or(false)
    }
}

/// Parses a `knative:<kind>/<name>[?<key>=<value>&...]` URI.
pub fn parse(uri: &str) -> Result<EndpointUri> {
    let rest = uri
        .strip_prefix("knative:")
        .ok_or_else(|| Error::config(format!("endpoint URI '{}' is missing the knative: scheme", uri)))?;

    let (path, query_str) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };

    let (kind_str, name) = path
        .split_once('/')
        .ok_or_else(|| Error::config(format!("endpoint URI '{}' is missing a <kind>/<name>", uri)))?;

    let kind = match kind_str {
        "endpoint" => Kind::Endpoint,
        "channel" => Kind::Channel,
        "event" => Kind::Event,
        other => return Err(Error::config(format!("unknown endpoint kind '{}'", other))),
    };

    if name.is_empty() {
        return Err(Error::config(format!("endpoint URI '{}' has an empty name", uri)));
    }

    let mut query = HashMap::new();
    if let Some(query_str) = query_str {
        for pair in query_str.split('&').filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some((k, v)) => {
                    query.insert(urlencoding_decode(k), urlencoding_decode(v));
                }
                None => {
                    query.insert(urlencoding_decode(pair), String::new());
                }
            }
        }
    }

    Ok(EndpointUri {
        kind,
        name: name.to_string(),
        query,
    })
}

/// Minimal percent-decoding for query values; the grammar in scope here
/// never needs full IRI normalisation, only the `%XX` escapes a caller
/// might use for `/` or `&` inside an override value.
fn urlencoding_decode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            let hi = chars.next();
            let lo = chars.next();
            if let (Some(hi), Some(lo)) = (hi, lo) {
                if let Ok(byte) = u8::from_str_radix(&format!("{}{}", hi, lo), 16) {
                    out.push(byte as char);
                    continue;
                }
            }
            out.push('%');
        } else if c == '+' {
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}
