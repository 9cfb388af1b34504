use std::convert::TryFrom;
use std::fmt;

use crate::error::Error;

/// The three CloudEvents specification versions this transport reconciles.
///
/// Modeled as a flat enum with a lookup table per variant (see
/// [`crate::mapper::tables`]) rather than as a class hierarchy over a
/// `CloudEvent` trait object — each version is a record of field names, not
/// a subclass.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum SpecVersion {
    V01,
    V02,
    V03,
}

impl SpecVersion {
    pub const ALL: [SpecVersion; 3] = [SpecVersion::V01, SpecVersion::V02, SpecVersion::V03];
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecVersion::V01 => write!(f, "0.1"),
            SpecVersion::V02 => write!(f, "0.2"),
            SpecVersion::V03 => write!(f, "0.3"),
        }
    }
}

impl TryFrom<&str> for SpecVersion {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Error> {
        match value {
            "0.1" => Ok(SpecVersion::V01),
            "0.2" => Ok(SpecVersion::V02),
            "0.3" => Ok(SpecVersion::V03),
            other => Err(Error::config(format!("unknown spec version '{}'", other))),
        }
    }
}

impl TryFrom<String> for SpecVersion {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Error> {
        SpecVersion::try_from(value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_display_and_parse() {
        for v in SpecVersion::ALL {
            assert_eq!(SpecVersion::try_from(v.to_string().as_str()).unwrap(), v);
        }
    }

    #[test]
    fn rejects_unknown_version() {
        assert!(SpecVersion::try_from("9.9").is_err());
    }
}
