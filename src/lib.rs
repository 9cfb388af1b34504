//! This crate implements the **Knative HTTP Transport Core**: the subsystem
//! that bridges an in-process message-routing runtime to the Knative
//! eventing wire protocol, transporting payloads as CloudEvents over HTTP.
//!
//! Five components compose the crate:
//!
//! * [`environment`] — the Environment (E): an immutable catalogue of named
//!   service definitions a host process loads once from configuration.
//! * [`registry`] — the Consumer Registry (R): the mutable, concurrently
//!   readable set of active inbound consumers.
//! * [`dispatcher`] — the Inbound Dispatcher (D): routes an HTTP request to
//!   a consumer, decodes it, and shapes the reply.
//! * [`producer`] — the Outbound Producer (P): delivers a message to a sink
//!   service as a CloudEvents HTTP request.
//! * [`mapper`] — the CloudEvents Attribute Mapper (M) underlying both: the
//!   per-version attribute tables and the `decode`/`encode` functions.
//!
//! ```no_run
//! use knative_transport::environment::Environment;
//! use knative_transport::registry::{Consumer, ConsumerRegistry, Receiver};
//! use knative_transport::message::Message;
//! use knative_transport::error::Result;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct PrintReceiver;
//!
//! #[async_trait]
//! impl Receiver for PrintReceiver {
//!     async fn receive(&self, message: Message) -> Result<Option<Message>> {
//!         println!("received: {}", message);
//!         Ok(None)
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let env = Environment::from_json(r#"[
//!     {"name": "myEndpoint", "kind": "endpoint", "role": "source",
//!      "metadata": {"service.path": "/a/path"}}
//! ]"#)?;
//!
//! let service = env.find_source(knative_transport::environment::Kind::Endpoint, "myEndpoint")
//!     .expect("declared above")
//!     .clone();
//!
//! let registry = ConsumerRegistry::new();
//! let consumer = Consumer::new(service, "", false, Arc::new(PrintReceiver))?;
//! let handle = registry.attach(consumer);
//! registry.detach(handle);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatcher;
pub mod environment;
pub mod error;
pub mod mapper;
pub mod message;
#[cfg(feature = "reqwest")]
pub mod producer;
pub mod registry;
pub mod spec_version;
pub mod uri;

pub use environment::{Environment, Kind, Role, ServiceDefinition};
pub use error::{Error, Result};
pub use message::Message;
pub use registry::{Consumer, ConsumerHandle, ConsumerRegistry, Receiver};
pub use spec_version::SpecVersion;
