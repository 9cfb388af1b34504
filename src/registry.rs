//! The Consumer Registry (R): the mutable set of active inbound consumers,
//! each binding a [`ServiceDefinition`] (role = source) to a receiver
//! callback and a compiled filter predicate.
//!
//! Concurrency is a copy-on-write snapshot via [`arc_swap::ArcSwap`] (§9
//! "Consumer registry concurrency"): `attach`/`detach` build a new `Vec` and
//! swap it in atomically, so `lookup` never observes a partially-attached
//! consumer and a detach racing an in-flight dispatch can never crash it
//! (§5 "Safe detach") — no per-consumer mutex is used.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use regex::Regex;

use crate::environment::{metadata_keys, Environment, Kind, ServiceDefinition};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::uri::EndpointUri;

/// The routing engine's receiver callback: takes the decoded inbound
/// [`Message`] and returns the pipeline's reply, if any. `Ok(None)` means
/// "no body" (§4.4 step 6, HTTP 204); `Err` becomes HTTP 500.
#[async_trait]
pub trait Receiver: Send + Sync {
    async fn receive(&self, message: Message) -> Result<Option<Message>>;
}

/// A single declared filter: either a literal string to compare verbatim,
/// or a regular expression anchored to the full header value (§4.3).
///
/// The literal-first semantics of §4.3 ("if declared value equals the
/// header verbatim, no regex engine is invoked") are implemented by storing
/// both forms and trying the literal comparison first in
/// [`FilterValue::matches`].
#[derive(Debug, Clone)]
pub struct FilterValue {
    literal: String,
    regex: Regex,
}

impl FilterValue {
    pub fn new(declared: &str) -> Result<FilterValue> {
        let anchored = format!("^(?:{})$", declared);
        let regex = Regex::new(&anchored)
            .map_err(|e| crate::error::Error::config(format!("invalid filter regex '{}': {}", declared, e)))?;
        Ok(FilterValue {
            literal: declared.to_string(),
            regex,
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        value == self.literal || self.regex.is_match(value)
    }
}

/// A compiled, active inbound consumer registration.
pub struct Consumer {
    pub service: ServiceDefinition,
    pub base_path: String,
    pub effective_path: String,
    pub filters: Vec<(String, FilterValue)>,
    pub reply_with_cloudevent: bool,
    pub receiver: Arc<dyn Receiver>,
}

impl Consumer {
    pub fn new(
        service: ServiceDefinition,
        base_path: impl Into<String>,
        reply_with_cloudevent: bool,
        receiver: Arc<dyn Receiver>,
    ) -> Result<Consumer> {
        let base_path = base_path.into();
        let effective_path = format!("{}{}", base_path, service.service_path());
        let filters = service
            .filters()
            .into_iter()
            .map(|(header, value)| Ok((header.to_string(), FilterValue::new(value)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Consumer {
            service,
            base_path,
            effective_path,
            filters,
            reply_with_cloudevent,
            receiver,
        })
    }

    /// Evaluates this consumer's filter predicate against a request's
    /// headers, per §4.3: every declared filter must match a header that is
    /// present (case-insensitively).
    pub fn matches<'a>(&self, header: impl Fn(&str) -> Option<&'a str>) -> bool {
        self.filters
            .iter()
            .all(|(name, value)| header(name).map(|v| value.matches(v)).unwrap_or(false))
    }
}

/// An opaque handle returned by [`ConsumerRegistry::attach`], used to
/// [`ConsumerRegistry::detach`] the same registration later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerHandle(u64);

#[derive(Clone)]
struct Entry {
    handle: ConsumerHandle,
    consumer: Arc<Consumer>,
}

/// The active set of inbound consumers, readable lock-free and mutated via
/// an atomically-swapped immutable snapshot.
///
/// Writers (`attach`/`detach`) serialize through `write_lock` so two
/// concurrent mutations can't race and drop each other's update, but that
/// lock is never on the read path: [`lookup`](Self::lookup) only ever calls
/// `ArcSwap::load`, which is wait-free.
pub struct ConsumerRegistry {
    entries: ArcSwap<Vec<Entry>>,
    write_lock: Mutex<()>,
    next_id: AtomicU64,
}

impl Default for ConsumerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsumerRegistry {
    pub fn new() -> ConsumerRegistry {
        ConsumerRegistry {
            entries: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Indexes the consumer under its `effective_path`. Returns a handle
    /// usable with [`detach`](Self::detach).
    pub fn attach(&self, consumer: Consumer) -> ConsumerHandle {
        let handle = ConsumerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let consumer = Arc::new(consumer);
        let _guard = self.write_lock.lock().unwrap();
        let mut next: Vec<Entry> = (**self.entries.load()).clone();
        next.push(Entry { handle, consumer });
        self.entries.store(Arc::new(next));
        handle
    }

    /// Removes the consumer registered under `handle`. In-flight dispatches
    /// already holding a strong reference to the consumer (acquired via
    /// [`lookup`](Self::lookup) before this call) complete normally; the
    /// `Arc` keeps the data alive until they finish.
    pub fn detach(&self, handle: ConsumerHandle) {
        let _guard = self.write_lock.lock().unwrap();
        let next: Vec<Entry> = self
            .entries
            .load()
            .iter()
            .filter(|e| e.handle != handle)
            .cloned()
            .collect();
        self.entries.store(Arc::new(next));
    }

    /// Selects, at most, one consumer for a request by path then filter
    /// predicate, per §4.3/§4.4: among candidates whose `effective_path`
    /// equals `path` and whose filters all match, prefer the consumer with
    /// a strictly larger filter set, tie-breaking by declaration order.
    pub fn lookup<'a>(&self, path: &str, header: impl Fn(&str) -> Option<&'a str>) -> Option<Arc<Consumer>> {
        let snapshot = self.entries.load();
        let mut best: Option<&Entry> = None;
        for entry in snapshot.iter() {
            if entry.consumer.effective_path != path {
                continue;
            }
            if !entry.consumer.matches(&header) {
                continue;
            }
            match best {
                None => best = Some(entry),
                Some(current_best) => {
                    if entry.consumer.filters.len() > current_best.consumer.filters.len() {
                        best = Some(entry);
                    }
                }
            }
        }
        best.map(|e| e.consumer.clone())
    }
}

/// The header a synthesised `event`-kind filter matches against. §4.2's
/// `knative:event/<type>` equivalence describes the effective filter only
/// as "`<ce-type-header>` equals `<type>`"; this crate resolves that to the
/// v0.2/v0.3 wire name, since every concrete scenario in scope names it
/// that way and a single fixed header keeps the filter predicate model
/// (one header name per filter entry) from needing an OR-of-header-names
/// extension that nothing else in this spec requires.
pub const EVENT_TYPE_FILTER_HEADER: &str = "ce-type";

/// Resolves the `event` kind's `knative:event/<type>` equivalence (§4.2
/// paragraph 2) and attaches one [`Consumer`] per selected source to
/// `registry`.
///
/// Selects every source with role=source, kind=event whose
/// `knative.event.type` metadata matches `event_type`; if none declare that
/// type explicitly, falls back to the generic (no `knative.event.type`)
/// sources of kind=event, using `event_type` as their synthesised filter.
/// Each selected consumer's filter predicate gains an additional
/// `<ce-type-header> equals <type>` entry on top of its declared filters.
pub fn attach_event(
    registry: &ConsumerRegistry,
    environment: &Environment,
    event_type: &str,
    base_path: &str,
    reply_with_cloudevent: bool,
    receiver: Arc<dyn Receiver>,
) -> Result<Vec<ConsumerHandle>> {
    let sources = environment.find_sources_by_kind(Kind::Event);
    let matching: Vec<&ServiceDefinition> = sources
        .iter()
        .copied()
        .filter(|s| s.event_type() == Some(event_type))
        .collect();
    let selected: Vec<&ServiceDefinition> = if !matching.is_empty() {
        matching
    } else {
        sources.into_iter().filter(|s| s.event_type().is_none()).collect()
    };

    if selected.is_empty() {
        return Err(Error::config(format!(
            "no event source matches knative:event/{}",
            event_type
        )));
    }

    let mut handles = Vec::with_capacity(selected.len());
    for service in selected {
        let mut consumer = Consumer::new(service.clone(), base_path, reply_with_cloudevent, receiver.clone())?;
        consumer
            .filters
            .push((EVENT_TYPE_FILTER_HEADER.to_string(), FilterValue::new(event_type)?));
        handles.push(registry.attach(consumer));
    }
    Ok(handles)
}

/// Resolves the Open Question of §9: an `endpoint/<name>` binding's URI may
/// carry `kind`/`apiVersion` query parameters matched against a
/// [`ServiceDefinition`]'s `knative.kind`/`knative.apiVersion` metadata.
/// Resolved here as: unspecified (the query parameter absent) is a
/// wildcard match; specified is strict equality. See `DESIGN.md` for the
/// rationale.
pub fn matches_kind_and_api_version(service: &ServiceDefinition, uri: &EndpointUri) -> bool {
    let kind_ok = match uri.kind_override() {
        None => true,
        Some(k) => service
            .metadata
            .get(metadata_keys::KNATIVE_KIND)
            .map(String::as_str)
            == Some(k),
    };
    let api_ok = match uri.api_version() {
        None => true,
        Some(v) => service
            .metadata
            .get(metadata_keys::API_VERSION)
            .map(String::as_str)
            == Some(v),
    };
    kind_ok && api_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Kind, Role};
    use std::collections::HashMap;

    struct Echo;

    #[async_trait]
    impl Receiver for Echo {
        async fn receive(&self, message: Message) -> Result<Option<Message>> {
            Ok(Some(message))
        }
    }

    fn service(name: &str, filters: &[(&str, &str)]) -> ServiceDefinition {
        let mut metadata = HashMap::new();
        for (k, v) in filters {
            metadata.insert(format!("filter.{}", k), v.to_string());
        }
        ServiceDefinition {
            name: name.to_string(),
            kind: Kind::Endpoint,
            role: Role::Source,
            host: None,
            port: None,
            metadata,
        }
    }

    #[test]
    fn regex_filter_matches_anchored_to_full_value() {
        let svc = service("a", &[("ce-source", "CE[01234]")]);
        let consumer = Consumer::new(svc, "", false, Arc::new(Echo)).unwrap();
        assert!(consumer.matches(|h| if h == "ce-source" { Some("CE0") } else { None }));
        assert!(!consumer.matches(|h| if h == "ce-source" { Some("CE9") } else { None }));
        assert!(!consumer.matches(|h| if h == "ce-source" { Some("XCE0") } else { None }));
    }

    #[test]
    fn literal_match_does_not_need_regex_semantics() {
        let svc = service("a", &[("ce-source", "exact.value")]);
        let consumer = Consumer::new(svc, "", false, Arc::new(Echo)).unwrap();
        assert!(consumer.matches(|h| if h == "ce-source" { Some("exact.value") } else { None }));
    }

    #[test]
    fn selection_prefers_larger_filter_set_then_declaration_order() {
        let registry = ConsumerRegistry::new();
        let plain = Consumer::new(service("plain", &[]), "", false, Arc::new(Echo)).unwrap();
        let filtered = Consumer::new(
            service("filtered", &[("ce-source", "CE0")]),
            "",
            false,
            Arc::new(Echo),
        )
        .unwrap();
        registry.attach(plain);
        let filtered_handle = registry.attach(filtered);

        let found = registry
            .lookup("/", |h| if h == "ce-source" { Some("CE0") } else { None })
            .unwrap();
        assert_eq!(found.service.name, "filtered");

        registry.detach(filtered_handle);
        let found = registry
            .lookup("/", |h| if h == "ce-source" { Some("CE0") } else { None })
            .unwrap();
        assert_eq!(found.service.name, "plain");
    }

    #[test]
    fn detach_then_lookup_misses() {
        let registry = ConsumerRegistry::new();
        let handle = registry.attach(Consumer::new(service("a", &[]), "", false, Arc::new(Echo)).unwrap());
        registry.detach(handle);
        assert!(registry.lookup("/", |_| None).is_none());
    }

    fn event_service(name: &str, event_type: Option<&str>) -> ServiceDefinition {
        let mut metadata = HashMap::new();
        if let Some(t) = event_type {
            metadata.insert("knative.event.type".to_string(), t.to_string());
        }
        ServiceDefinition {
            name: name.to_string(),
            kind: Kind::Event,
            role: crate::environment::Role::Source,
            host: None,
            port: None,
            metadata,
        }
    }

    #[test]
    fn event_kind_selects_sources_declaring_the_matching_type() {
        let env = Environment::new(vec![
            event_service("specific", Some("org.example.widget")),
            event_service("other", Some("org.example.gadget")),
        ]);
        let registry = ConsumerRegistry::new();
        let handles = attach_event(&registry, &env, "org.example.widget", "", false, Arc::new(Echo)).unwrap();
        assert_eq!(handles.len(), 1);
        let found = registry
            .lookup("/", |h| if h == EVENT_TYPE_FILTER_HEADER { Some("org.example.widget") } else { None })
            .unwrap();
        assert_eq!(found.service.name, "specific");
    }

    #[test]
    fn event_kind_falls_back_to_generic_source_when_unspecified() {
        let env = Environment::new(vec![event_service("generic", None)]);
        let registry = ConsumerRegistry::new();
        attach_event(&registry, &env, "org.example.widget", "", false, Arc::new(Echo)).unwrap();
        let found = registry
            .lookup("/", |h| if h == EVENT_TYPE_FILTER_HEADER { Some("org.example.widget") } else { None })
            .unwrap();
        assert_eq!(found.service.name, "generic");
    }

    #[test]
    fn kind_and_api_version_are_wildcards_when_unspecified_strict_when_present() {
        let mut svc = service("a", &[]);
        svc.metadata
            .insert(crate::environment::metadata_keys::KNATIVE_KIND.to_string(), "Deployment".to_string());

        let unspecified = crate::uri::parse("knative:endpoint/a").unwrap();
        assert!(matches_kind_and_api_version(&svc, &unspecified));

        let matching = crate::uri::parse("knative:endpoint/a?kind=Deployment").unwrap();
        assert!(matches_kind_and_api_version(&svc, &matching));

        let mismatching = crate::uri::parse("knative:endpoint/a?kind=Service").unwrap();
        assert!(!matches_kind_and_api_version(&svc, &mismatching));
    }
}
