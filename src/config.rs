//! **[AMBIENT]** Process-wide transport configuration: the `ce-override`
//! map (§4.5 layer b, §5 "last-writer-wins semantics are acceptable; the
//! map must be replaceable atomically") and the TLS-vs-plain toggle that
//! decides the `scheme` half of outbound URL construction (§4.5).
//!
//! Uses `arc_swap::ArcSwap` the same way [`crate::registry`] does, per the
//! teacher's convention of reaching for `arc-swap` rather than a mutex for
//! infrequently-written, frequently-read shared state.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

/// Process-wide configuration read by every outbound [`crate::producer`]
/// call.
pub struct TransportConfig {
    overrides: ArcSwap<HashMap<String, String>>,
    tls: std::sync::atomic::AtomicBool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportConfig {
    pub fn new() -> TransportConfig {
        TransportConfig {
            overrides: ArcSwap::from_pointee(HashMap::new()),
            tls: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Replaces the component configuration's `ce-override` map
    /// atomically. Last-writer-wins: a concurrent reader either sees the
    /// old or the new map in full, never a partial mix.
    pub fn set_overrides(&self, overrides: HashMap<String, String>) {
        self.overrides.store(Arc::new(overrides));
    }

    pub fn overrides(&self) -> Arc<HashMap<String, String>> {
        self.overrides.load_full()
    }

    pub fn set_tls(&self, enabled: bool) {
        self.tls.store(enabled, std::sync::atomic::Ordering::Relaxed);
    }

    /// The URL scheme outbound requests should use: `https` when TLS is
    /// configured on the transport, `http` otherwise (§4.5).
    pub fn scheme(&self) -> &'static str {
        if self.tls.load(std::sync::atomic::Ordering::Relaxed) {
            "https"
        } else {
            "http"
        }
    }
}
