use std::fmt;

/// The message that flows between the Attribute Mapper, a `Consumer`'s
/// receiver, and the Outbound Producer.
///
/// This is the transport's equivalent of a typed `Event` value in a
/// general-purpose CloudEvents SDK, but shaped around this spec's
/// "internal-header namespace" rather than a strongly-typed CloudEvent
/// object: decoding never needs to validate or construct a full CloudEvent
/// independent of a wire encoding, it only needs to carry header key/value
/// pairs (both wire-form and internal-form) alongside a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    headers: Vec<(String, String)>,
    payload: Option<Vec<u8>>,
}

impl Message {
    pub fn new() -> Message {
        Message {
            headers: Vec::new(),
            payload: None,
        }
    }

    pub fn with_payload(payload: Vec<u8>) -> Message {
        Message {
            headers: Vec::new(),
            payload: Some(payload),
        }
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    pub fn set_payload(&mut self, payload: Option<Vec<u8>>) {
        self.payload = payload;
    }

    /// Case-insensitive header lookup, matching HTTP header semantics.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a header, replacing any existing entry with the same name
    /// (case-insensitively). Wire-form and internal-form keys (e.g.
    /// `ce-type` and `CamelCloudEventType`) are different names and so
    /// coexist as distinct entries.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if let Some(slot) = self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            slot.0 = name;
            slot.1 = value.into();
        } else {
            self.headers.push((name, value.into()));
        }
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message {{ headers: {}, payload: {} bytes }}",
            self.headers.len(),
            self.payload.as_ref().map(|p| p.len()).unwrap_or(0)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut m = Message::new();
        m.set_header("Ce-Type", "example");
        assert_eq!(m.header("ce-type"), Some("example"));
        assert_eq!(m.header("CE-TYPE"), Some("example"));
    }

    #[test]
    fn set_header_overwrites_case_insensitively() {
        let mut m = Message::new();
        m.set_header("ce-type", "a");
        m.set_header("ce-type", "b");
        assert_eq!(m.headers().count(), 1);
        assert_eq!(m.header("ce-type"), Some("b"));
    }
}
