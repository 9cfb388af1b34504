//! The Inbound Dispatcher (D): owns one HTTP listener per port, routes
//! each request to zero or one consumer by path plus header-predicate,
//! decodes the CloudEvent, hands off to the consumer's receiver, and
//! shapes the HTTP response.
//!
//! The routing algorithm (§4.4) is implemented as a framework-agnostic
//! core (`dispatch`) operating over the [`crate::mapper::Headers`]
//! abstraction and raw bytes, with a thin actix-web adapter at the edge —
//! the same separation the teacher draws between its framework-agnostic
//! `binding::http` module and the `binding::actix` glue on top of it.

use std::sync::Arc;

use log::{debug, error, warn};

use crate::environment::ServiceDefinition;
use crate::mapper::{self, AttributeDefaults, Headers};
use crate::registry::ConsumerRegistry;
use crate::spec_version::SpecVersion;

/// The shaped result of a single dispatch, independent of any HTTP
/// framework. §4.4 step 6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl DispatchResponse {
    fn not_found() -> DispatchResponse {
        DispatchResponse {
            status: 404,
            headers: Vec::new(),
            body: None,
        }
    }

    fn bad_request(message: impl Into<String>) -> DispatchResponse {
        DispatchResponse {
            status: 400,
            headers: Vec::new(),
            body: Some(message.into().into_bytes()),
        }
    }

    fn internal_error(message: impl Into<String>) -> DispatchResponse {
        DispatchResponse {
            status: 500,
            headers: Vec::new(),
            body: Some(message.into().into_bytes()),
        }
    }

    fn no_content() -> DispatchResponse {
        DispatchResponse {
            status: 204,
            headers: Vec::new(),
            body: None,
        }
    }
}

/// The Inbound Dispatcher. Holds a shared reference to the
/// [`ConsumerRegistry`] it routes against; one `Dispatcher` per configured
/// port (§4.4 "Owns one HTTP listener per port").
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ConsumerRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConsumerRegistry>) -> Dispatcher {
        Dispatcher { registry }
    }

    /// Runs the full routing algorithm of §4.4 against one inbound
    /// request. Framework-agnostic: `headers` only needs to satisfy
    /// [`crate::mapper::Headers`].
    ///
    /// State machine: `Received -> Matched -> Decoded -> Delivered ->
    /// Responded`; any transition may fail to `Responded(error)` with the
    /// status codes below.
    pub async fn dispatch<'a, H: Headers<'a>>(
        &self,
        method: &str,
        path: &str,
        headers: &'a H,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> DispatchResponse {
        // Step 1: method gate.
        if method != "POST" {
            debug!("rejecting {} {} (only POST is routable)", method, path);
            return DispatchResponse::not_found();
        }

        // Steps 2-3: path + filter match, via the registry's combined
        // lookup (§4.3's selection ordering is implemented there).
        let consumer = match self.registry.lookup(path, |name| headers.get(name)) {
            Some(c) => c,
            None => {
                debug!("no consumer matched path={} ", path);
                return DispatchResponse::not_found();
            }
        };
        debug!("matched consumer for service={}", consumer.service.name);

        // Step 4: decode.
        let spec = match mapper::detect_spec_version(headers, &body, content_type) {
            Ok(spec) => spec,
            Err(e) => {
                warn!("decode error detecting spec version: {}", e);
                return DispatchResponse::bad_request(e.to_string());
            }
        };
        let message = match mapper::decode(headers, body, content_type, spec) {
            Ok(m) => m,
            Err(e) => {
                warn!("decode error: {}", e);
                return DispatchResponse::bad_request(e.to_string());
            }
        };

        // Step 5: deliver, synchronously from the dispatcher's perspective.
        let outcome = consumer.receiver.receive(message).await;

        // Step 6: shape the response.
        match outcome {
            Ok(Some(reply)) if reply.payload().is_some() => {
                build_reply_response(&consumer.service, consumer.reply_with_cloudevent, &reply, spec)
            }
            Ok(_) => DispatchResponse::no_content(),
            Err(e) => {
                error!("receiver raised an error: {}", e);
                DispatchResponse::internal_error(e.to_string())
            }
        }
    }
}

fn build_reply_response(
    service: &ServiceDefinition,
    reply_with_cloudevent: bool,
    reply: &crate::message::Message,
    spec: SpecVersion,
) -> DispatchResponse {
    let content_type = reply
        .header("Content-Type")
        .map(str::to_string)
        .or_else(|| service.content_type().map(str::to_string));

    let mut headers = Vec::new();
    if reply_with_cloudevent {
        let defaults = AttributeDefaults {
            default_source: Some(service.canonical_source()),
            default_type: service.event_type().map(str::to_string),
        };
        let (wire_headers, _) = mapper::encode(reply, spec, &defaults);
        headers = wire_headers;
        // encode() already carries its own Content-Type entry if present;
        // only add the resolved one if encode didn't already supply it.
        if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("Content-Type")) {
            if let Some(ct) = &content_type {
                headers.push(("Content-Type".to_string(), ct.clone()));
            }
        }
    } else if let Some(ct) = &content_type {
        headers.push(("Content-Type".to_string(), ct.clone()));
    }

    DispatchResponse {
        status: 200,
        headers,
        body: reply.payload().map(|b| b.to_vec()),
    }
}

#[cfg(feature = "actix")]
pub mod actix_adapter {
    //! **[AMBIENT]** The actix-web wire adapter, grounded directly on the
    //! teacher's `binding::actix` module: implement [`Headers`] for
    //! `actix_web::http::HeaderMap`, then a thin handler that reads the
    //! body into memory and hands off to [`Dispatcher::dispatch`].

    use actix_web::http::HeaderMap;
    use actix_web::web::BytesMut;
    use actix_web::{web, HttpRequest, HttpResponse};
    use futures::StreamExt;

    use super::{DispatchResponse, Dispatcher};
    use crate::mapper::Headers;

    impl<'a> Headers<'a> for HeaderMap {
        type Iterator = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

        fn get(&'a self, name: &str) -> Option<&'a str> {
            HeaderMap::get(self, name).and_then(|v| v.to_str().ok())
        }

        fn iter(&'a self) -> Self::Iterator {
            Box::new(
                HeaderMap::iter(self).filter_map(|(k, v)| v.to_str().ok().map(|s| (k.as_str(), s))),
            )
        }
    }

    /// actix-web handler: POST any configured path to this function (one
    /// registration per [`Dispatcher`]/port, with the `Dispatcher` placed
    /// in `web::Data`).
    pub async fn handle(
        req: HttpRequest,
        mut payload: web::Payload,
        dispatcher: web::Data<Dispatcher>,
    ) -> HttpResponse {
        let mut bytes = BytesMut::new();
        while let Some(chunk) = payload.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(_) => return HttpResponse::BadRequest().finish(),
            };
            bytes.extend_from_slice(&chunk);
        }

        let content_type = req
            .headers()
            .get(actix_web::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());

        let response = dispatcher
            .dispatch(
                req.method().as_str(),
                req.path(),
                req.headers(),
                bytes.to_vec(),
                content_type,
            )
            .await;

        to_http_response(response)
    }

    fn to_http_response(response: DispatchResponse) -> HttpResponse {
        let mut builder = HttpResponse::build(
            actix_web::http::StatusCode::from_u16(response.status)
                .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
        );
        for (name, value) in &response.headers {
            builder.insert_header((name.as_str(), value.as_str()));
        }
        match response.body {
            Some(body) => builder.body(body),
            None => builder.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Kind, Role};
    use crate::message::Message;
    use crate::registry::{Consumer, Receiver};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct MapHeaders(HashMap<String, String>);

    impl<'a> Headers<'a> for MapHeaders {
        type Iterator = std::iter::Map<
            std::collections::hash_map::Iter<'a, String, String>,
            fn((&'a String, &'a String)) -> (&'a str, &'a str),
        >;

        fn get(&'a self, name: &str) -> Option<&'a str> {
            self.0
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }

        fn iter(&'a self) -> Self::Iterator {
            self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
        }
    }

    fn headers(pairs: &[(&str, &str)]) -> MapHeaders {
        MapHeaders(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    struct Echo;

    #[async_trait]
    impl Receiver for Echo {
        async fn receive(&self, message: Message) -> crate::error::Result<Option<Message>> {
            Ok(Some(message))
        }
    }

    struct NoReply;

    #[async_trait]
    impl Receiver for NoReply {
        async fn receive(&self, _message: Message) -> crate::error::Result<Option<Message>> {
            Ok(None)
        }
    }

    struct Boom;

    #[async_trait]
    impl Receiver for Boom {
        async fn receive(&self, _message: Message) -> crate::error::Result<Option<Message>> {
            Err(crate::error::Error::illegal_argument("boom"))
        }
    }

    fn service(path: &str, event_type: &str) -> ServiceDefinition {
        let mut metadata = HashMap::new();
        metadata.insert("service.path".to_string(), path.to_string());
        metadata.insert("knative.event.type".to_string(), event_type.to_string());
        ServiceDefinition {
            name: "myEndpoint".to_string(),
            kind: Kind::Endpoint,
            role: Role::Source,
            host: None,
            port: None,
            metadata,
        }
    }

    #[tokio::test]
    async fn binary_source_basic_scenario() {
        let registry = Arc::new(ConsumerRegistry::new());
        let consumer = Consumer::new(
            service("/a/path", "org.apache.camel.event"),
            "",
            false,
            Arc::new(Echo),
        )
        .unwrap();
        registry.attach(consumer);
        let dispatcher = Dispatcher::new(registry);

        let h = headers(&[
            ("ce-specversion", "0.3"),
            ("ce-type", "org.apache.camel.event"),
            ("ce-id", "X"),
            ("ce-source", "/somewhere"),
            ("Content-Type", "text/plain"),
        ]);
        let response = dispatcher
            .dispatch("POST", "/a/path", &h, b"test".to_vec(), Some("text/plain"))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, Some(b"test".to_vec()));
    }

    #[tokio::test]
    async fn structured_mode_v02_scenario() {
        let registry = Arc::new(ConsumerRegistry::new());
        let consumer = Consumer::new(
            service("/", "org.apache.camel.event"),
            "",
            false,
            Arc::new(Echo),
        )
        .unwrap();
        registry.attach(consumer);
        let dispatcher = Dispatcher::new(registry);

        let body = serde_json::json!({
            "specversion": "0.2",
            "type": "org.apache.camel.event",
            "id": "E",
            "source": "/s",
            "contenttype": "text/plain",
            "data": "test"
        })
        .to_string();
        let h = headers(&[]);
        let response = dispatcher
            .dispatch(
                "POST",
                "/",
                &h,
                body.into_bytes(),
                Some("application/cloudevents+json"),
            )
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, Some(b"test".to_vec()));
    }

    #[tokio::test]
    async fn non_post_method_is_404() {
        let registry = Arc::new(ConsumerRegistry::new());
        let dispatcher = Dispatcher::new(registry);
        let h = headers(&[]);
        let response = dispatcher.dispatch("GET", "/", &h, Vec::new(), None).await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn unmatched_path_is_404() {
        let registry = Arc::new(ConsumerRegistry::new());
        let consumer = Consumer::new(service("/a/path", "t"), "", false, Arc::new(Echo)).unwrap();
        registry.attach(consumer);
        let dispatcher = Dispatcher::new(registry);
        let h = headers(&[("ce-specversion", "0.3"), ("ce-type", "t"), ("ce-id", "1"), ("ce-source", "/s")]);
        let response = dispatcher.dispatch("POST", "/other", &h, Vec::new(), None).await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn malformed_structured_body_is_400() {
        let registry = Arc::new(ConsumerRegistry::new());
        let consumer = Consumer::new(service("/", "t"), "", false, Arc::new(Echo)).unwrap();
        registry.attach(consumer);
        let dispatcher = Dispatcher::new(registry);
        let h = headers(&[]);
        let response = dispatcher
            .dispatch(
                "POST",
                "/",
                &h,
                b"not json".to_vec(),
                Some("application/cloudevents+json"),
            )
            .await;
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn no_reply_is_204() {
        let registry = Arc::new(ConsumerRegistry::new());
        let consumer = Consumer::new(service("/", "t"), "", false, Arc::new(NoReply)).unwrap();
        registry.attach(consumer);
        let dispatcher = Dispatcher::new(registry);
        let h = headers(&[("ce-specversion", "0.3"), ("ce-type", "t"), ("ce-id", "1"), ("ce-source", "/s")]);
        let response = dispatcher.dispatch("POST", "/", &h, Vec::new(), None).await;
        assert_eq!(response.status, 204);
        assert_eq!(response.body, None);
    }

    #[tokio::test]
    async fn receiver_error_is_500() {
        let registry = Arc::new(ConsumerRegistry::new());
        let consumer = Consumer::new(service("/", "t"), "", false, Arc::new(Boom)).unwrap();
        registry.attach(consumer);
        let dispatcher = Dispatcher::new(registry);
        let h = headers(&[("ce-specversion", "0.3"), ("ce-type", "t"), ("ce-id", "1"), ("ce-source", "/s")]);
        let response = dispatcher.dispatch("POST", "/", &h, b"x".to_vec(), None).await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body, Some(b"illegal argument: boom".to_vec()));
    }

    struct CustomType;
    #[async_trait]
    impl Receiver for CustomType {
        async fn receive(&self, mut message: Message) -> crate::error::Result<Option<Message>> {
            message.set_header("CamelCloudEventType", "custom");
            message.set_payload(Some(b"body".to_vec()));
            Ok(Some(message))
        }
    }

    #[tokio::test]
    async fn reply_without_cloudevent_flag_strips_ce_headers() {
        let registry = Arc::new(ConsumerRegistry::new());
        registry.attach(Consumer::new(service("/", "t"), "", false, Arc::new(CustomType)).unwrap());
        let dispatcher = Dispatcher::new(registry);

        let h = headers(&[("ce-specversion", "0.3"), ("ce-type", "t"), ("ce-id", "1"), ("ce-source", "/s")]);
        let response = dispatcher.dispatch("POST", "/", &h, Vec::new(), None).await;
        assert!(!response.headers.iter().any(|(k, _)| k == "ce-type"));
    }

    #[tokio::test]
    async fn reply_with_cloudevent_flag_carries_full_header_set() {
        let registry = Arc::new(ConsumerRegistry::new());
        registry.attach(Consumer::new(service("/", "t"), "", true, Arc::new(CustomType)).unwrap());
        let dispatcher = Dispatcher::new(registry);

        let h = headers(&[("ce-specversion", "0.3"), ("ce-type", "t"), ("ce-id", "1"), ("ce-source", "/s")]);
        let response = dispatcher.dispatch("POST", "/", &h, Vec::new(), None).await;
        assert!(response.headers.iter().any(|(k, v)| k == "ce-type" && v == "custom"));
    }
}
