use crate::spec_version::SpecVersion;

/// The seven abstract CloudEvent attributes this transport knows how to map.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum Attribute {
    Version,
    Type,
    Id,
    Source,
    Time,
    DataContentType,
    Subject,
}

impl Attribute {
    pub const ALL: [Attribute; 7] = [
        Attribute::Version,
        Attribute::Type,
        Attribute::Id,
        Attribute::Source,
        Attribute::Time,
        Attribute::DataContentType,
        Attribute::Subject,
    ];

    /// The stable, version-independent internal header name the in-process
    /// routing engine uses for this attribute (the "id name" of §4.1).
    pub fn internal_name(&self) -> &'static str {
        match self {
            Attribute::Version => "CamelCloudEventVersion",
            Attribute::Type => "CamelCloudEventType",
            Attribute::Id => "CamelCloudEventId",
            Attribute::Source => "CamelCloudEventSource",
            Attribute::Time => "CamelCloudEventTime",
            Attribute::DataContentType => "CamelCloudEventContentType",
            Attribute::Subject => "CamelCloudEventSubject",
        }
    }
}

/// One row of the per-version attribute table: the wire (HTTP header) name
/// for this attribute under a given spec version, or `None` if the version
/// does not carry this attribute at all (e.g. `subject` was not part of
/// CloudEvents until 0.3).
#[derive(Debug, Clone, Copy)]
pub struct AttributeRow {
    pub attribute: Attribute,
    pub http_name: Option<&'static str>,
    pub structured_key: Option<&'static str>,
}

/// Static per-version attribute table. A lookup table keyed by spec
/// version, not an inheritance hierarchy over `CloudEvent` objects — each
/// version is a plain record of names.
pub fn table(version: SpecVersion) -> &'static [AttributeRow] {
    match version {
        SpecVersion::V01 => &V01_TABLE,
        SpecVersion::V02 => &V02_TABLE,
        SpecVersion::V03 => &V03_TABLE,
    }
}

static V01_TABLE: [AttributeRow; 7] = [
    AttributeRow {
        attribute: Attribute::Version,
        http_name: Some("CE-CloudEventsVersion"),
        structured_key: Some("cloudEventsVersion"),
    },
    AttributeRow {
        attribute: Attribute::Type,
        http_name: Some("CE-EventType"),
        structured_key: Some("eventType"),
    },
    AttributeRow {
        attribute: Attribute::Id,
        http_name: Some("CE-EventID"),
        structured_key: Some("eventID"),
    },
    AttributeRow {
        attribute: Attribute::Source,
        http_name: Some("CE-Source"),
        structured_key: Some("source"),
    },
    AttributeRow {
        attribute: Attribute::Time,
        http_name: Some("CE-EventTime"),
        structured_key: Some("eventTime"),
    },
    AttributeRow {
        attribute: Attribute::DataContentType,
        http_name: Some("Content-Type"),
        structured_key: Some("contentType"),
    },
    AttributeRow {
        attribute: Attribute::Subject,
        http_name: None,
        structured_key: None,
    },
];

static V02_TABLE: [AttributeRow; 7] = [
    AttributeRow {
        attribute: Attribute::Version,
        http_name: Some("ce-specversion"),
        structured_key: Some("specversion"),
    },
    AttributeRow {
        attribute: Attribute::Type,
        http_name: Some("ce-type"),
        structured_key: Some("type"),
    },
    AttributeRow {
        attribute: Attribute::Id,
        http_name: Some("ce-id"),
        structured_key: Some("id"),
    },
    AttributeRow {
        attribute: Attribute::Source,
        http_name: Some("ce-source"),
        structured_key: Some("source"),
    },
    AttributeRow {
        attribute: Attribute::Time,
        http_name: Some("ce-time"),
        structured_key: Some("time"),
    },
    AttributeRow {
        attribute: Attribute::DataContentType,
        http_name: Some("Content-Type"),
        structured_key: Some("contenttype"),
    },
    AttributeRow {
        attribute: Attribute::Subject,
        http_name: None,
        structured_key: None,
    },
];

static V03_TABLE: [AttributeRow; 7] = [
    AttributeRow {
        attribute: Attribute::Version,
        http_name: Some("ce-specversion"),
        structured_key: Some("specversion"),
    },
    AttributeRow {
        attribute: Attribute::Type,
        http_name: Some("ce-type"),
        structured_key: Some("type"),
    },
    AttributeRow {
        attribute: Attribute::Id,
        http_name: Some("ce-id"),
        structured_key: Some("id"),
    },
    AttributeRow {
        attribute: Attribute::Source,
        http_name: Some("ce-source"),
        structured_key: Some("source"),
    },
    AttributeRow {
        attribute: Attribute::Time,
        http_name: Some("ce-time"),
        structured_key: Some("time"),
    },
    AttributeRow {
        attribute: Attribute::DataContentType,
        http_name: Some("Content-Type"),
        structured_key: Some("datacontenttype"),
    },
    AttributeRow {
        attribute: Attribute::Subject,
        http_name: Some("ce-subject"),
        structured_key: Some("subject"),
    },
];

pub fn row(version: SpecVersion, attribute: Attribute) -> AttributeRow {
    *table(version)
        .iter()
        .find(|r| r.attribute == attribute)
        .expect("every attribute has a row in every version table")
}
