use std::collections::HashSet;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::attribute::AttributeSpec;
use crate::error::ConfigError;
use crate::guard;
use crate::lookup::Substitutor;
use crate::record::LogRecord;

/// Timestamp layout of the `timestamp` key: ISO-8601, UTC, milliseconds.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

const RESERVED_KEYS: [&str; 3] = ["timestamp", "level", "message"];

/// Result of [`EventEncoder::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
    Document(String),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No record was supplied.
    Absent,
    /// The record was logged by this crate.
    Recursive,
    /// The JSON serializer rejected the document.
    Unencodable,
}

/// Renders records into the JSON documents accepted by the ingest endpoint.
///
/// The attribute list is fixed at construction, so `encode` takes `&self`
/// and can run on any number of threads at once.
#[derive(Debug, Clone)]
pub struct EventEncoder {
    attributes: Vec<AttributeSpec>,
    substitutor: Substitutor,
}

impl EventEncoder {
    /// Build an encoder, rejecting duplicate, empty or reserved attribute
    /// names.
    pub fn new(attributes: Vec<AttributeSpec>, substitutor: Substitutor) -> Result<Self, ConfigError> {
        let mut seen = HashSet::with_capacity(attributes.len());
        for attribute in &attributes {
            if attribute.name.is_empty() {
                return Err(ConfigError::EmptyAttributeName);
            }
            if RESERVED_KEYS.contains(&attribute.name.as_str()) {
                return Err(ConfigError::ReservedAttribute(attribute.name.clone()));
            }
            if !seen.insert(attribute.name.as_str()) {
                return Err(ConfigError::DuplicateAttribute(attribute.name.clone()));
            }
        }

        Ok(EventEncoder {
            attributes,
            substitutor,
        })
    }

    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    pub fn encode(&self, record: Option<&LogRecord>) -> Encoded {
        let Some(record) = record else {
            return Encoded::Skipped(SkipReason::Absent);
        };

        if guard::is_own_source(&record.source) {
            if !guard::is_emitting() {
                let _scope = guard::EmitScope::enter();
                tracing::warn!(source = %record.source, "recursive logging into the ingest pipeline, record skipped");
            }
            return Encoded::Skipped(SkipReason::Recursive);
        }

        let message = record.message.to_text();
        let attributes = self
            .attributes
            .iter()
            .map(|attribute| (attribute.name.as_str(), attribute.resolve(record, &self.substitutor)))
            .collect();

        let document = EventDocument {
            timestamp: record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            level: record.level.as_str(),
            attributes,
            message: &message,
        };

        match serde_json::to_string(&document) {
            Ok(json) => Encoded::Document(json),
            Err(e) => {
                let _scope = guard::EmitScope::enter();
                tracing::error!(error = %e, "cannot encode log record");
                Encoded::Skipped(SkipReason::Unencodable)
            }
        }
    }
}

struct EventDocument<'a> {
    timestamp: String,
    level: &'static str,
    attributes: Vec<(&'a str, String)>,
    message: &'a str,
}

impl Serialize for EventDocument<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(3 + self.attributes.len()))?;
        map.serialize_entry("timestamp", &self.timestamp)?;
        map.serialize_entry("level", self.level)?;
        for (name, value) in &self.attributes {
            map.serialize_entry(name, value)?;
        }
        map.serialize_entry("message", self.message)?;
        map.end()
    }
}
