//! The Environment (E): an immutable catalogue of named service
//! definitions, each tagged by `kind` and `role`, carrying the metadata
//! that the Attribute Mapper, Consumer Registry and Outbound Producer
//! read from it.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

/// The three kinds of logical service this transport knows about. `Channel`
/// is wire-identical to `Endpoint`; it only differs in discovery
/// conventions, which live entirely in how an Environment is populated, not
/// in this crate's routing logic (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Endpoint,
    Channel,
    Event,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Endpoint => write!(f, "endpoint"),
            Kind::Channel => write!(f, "channel"),
            Kind::Event => write!(f, "event"),
        }
    }
}

/// A service's role: sources receive inbound traffic, sinks are invoked by
/// outbound traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Source,
    Sink,
}

/// Recognised metadata keys that carry a single fixed meaning. The
/// `filter.<header>` and `ce.override.<header>` families are prefixes,
/// handled by [`ServiceDefinition::filters`] and
/// [`ServiceDefinition::overrides`] rather than by a constant here.
pub mod metadata_keys {
    pub const SERVICE_PATH: &str = "service.path";
    pub const CONTENT_TYPE: &str = "content.type";
    pub const EVENT_TYPE: &str = "knative.event.type";
    pub const KNATIVE_KIND: &str = "knative.kind";
    pub const API_VERSION: &str = "knative.apiVersion";
    pub const FILTER_PREFIX: &str = "filter.";
    pub const OVERRIDE_PREFIX: &str = "ce.override.";
}

/// An immutable service definition, the unit an [`Environment`] catalogues.
///
/// `port` uses `Option<u16>` where the original design uses a `-1` sentinel
/// for "unset" — a representation choice, not a semantic change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceDefinition {
    pub name: String,
    pub kind: Kind,
    pub role: Role,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ServiceDefinition {
    /// `service.path` metadata, defaulting to `/` per §3/§4.4.
    pub fn service_path(&self) -> &str {
        self.metadata
            .get(metadata_keys::SERVICE_PATH)
            .map(String::as_str)
            .unwrap_or("/")
    }

    pub fn content_type(&self) -> Option<&str> {
        self.metadata.get(metadata_keys::CONTENT_TYPE).map(String::as_str)
    }

    pub fn event_type(&self) -> Option<&str> {
        self.metadata.get(metadata_keys::EVENT_TYPE).map(String::as_str)
    }

    /// `filter.<header>` metadata entries, stripped of their prefix.
    pub fn filters(&self) -> Vec<(&str, &str)> {
        self.metadata
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(metadata_keys::FILTER_PREFIX)
                    .map(|header| (header, v.as_str()))
            })
            .collect()
    }

    /// `ce.override.<header>` metadata entries, stripped of their prefix.
    /// Applies only to outbound traffic on a sink (§3 invariant).
    pub fn overrides(&self) -> Vec<(&str, &str)> {
        self.metadata
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(metadata_keys::OVERRIDE_PREFIX)
                    .map(|header| (header, v.as_str()))
            })
            .collect()
    }

    /// `knative://<kind>/<name>`, the canonical default `source` attribute
    /// (§4.1, §9 "Attribute synthesis determinism").
    pub fn canonical_source(&self) -> String {
        format!("knative://{}/{}", self.kind, self.name)
    }
}

/// An ordered, immutable catalogue of [`ServiceDefinition`]s.
///
/// Constructed once from configuration and never mutated; lookups are by
/// `(kind, name)` with ambiguity resolved by first match in declaration
/// order, exactly as specified in §4.2.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Environment {
    services: Vec<ServiceDefinition>,
}

impl Environment {
    pub fn new(services: Vec<ServiceDefinition>) -> Environment {
        Environment { services }
    }

    /// Parses an Environment from a JSON document: an array of
    /// service-definition records, per §6 "Environment representation".
    pub fn from_json(data: &str) -> crate::error::Result<Environment> {
        serde_json::from_str(data)
            .map_err(|e| crate::error::Error::config(format!("invalid environment JSON: {}", e)))
    }

    /// Parses an Environment from a YAML document, the shape used by this
    /// crate's own test fixtures.
    pub fn from_yaml(data: &str) -> crate::error::Result<Environment> {
        serde_yaml::from_str(data)
            .map_err(|e| crate::error::Error::config(format!("invalid environment YAML: {}", e)))
    }

    pub fn services(&self) -> &[ServiceDefinition] {
        &self.services
    }

    /// First source entry matching `kind` and `name`, in declaration order.
    pub fn find_source(&self, kind: Kind, name: &str) -> Option<&ServiceDefinition> {
        self.services
            .iter()
            .find(|s| s.kind == kind && s.role == Role::Source && s.name == name)
    }

    /// First sink entry matching `kind` and `name`, in declaration order.
    /// A missing host is a call-time error (see [`crate::producer`]), not a
    /// lookup-time one.
    pub fn find_sink(&self, kind: Kind, name: &str) -> Option<&ServiceDefinition> {
        self.services
            .iter()
            .find(|s| s.kind == kind && s.role == Role::Sink && s.name == name)
    }

    /// All sources of a given kind, in declaration order. Used at
    /// consumer-attach time to resolve the `event` kind's
    /// `knative:event/<type>` equivalence (§4.2 paragraph 2).
    pub fn find_sources_by_kind(&self, kind: Kind) -> Vec<&ServiceDefinition> {
        self.services
            .iter()
            .filter(|s| s.kind == kind && s.role == Role::Source)
            .collect()
    }
}
