use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::Level;

/// Snapshot of one log event handed to the encoder.
///
/// Built by the layer from a `tracing` event and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    /// Originating target (logger name) of the event.
    pub source: String,
    pub message: RenderedMessage,
    /// Span and event fields, keyed by field name.
    pub context: BTreeMap<String, String>,
}

impl LogRecord {
    pub fn new(level: Level, source: impl Into<String>, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp: Utc::now(),
            level,
            source: source.into(),
            message: RenderedMessage::Single(message.into().into_bytes()),
            context: BTreeMap::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_message(mut self, message: RenderedMessage) -> Self {
        self.message = message;
        self
    }
}

/// Message bytes as produced by a [`Layout`](crate::layout::Layout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedMessage {
    Single(Vec<u8>),
    /// Serialized form made of a layout header followed by the event body.
    Framed { header: Vec<u8>, body: Vec<u8> },
}

impl RenderedMessage {
    /// Interpret the message as text, header bytes first.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            RenderedMessage::Single(bytes) => String::from_utf8_lossy(bytes),
            RenderedMessage::Framed { header, body } => {
                let mut joined = Vec::with_capacity(header.len() + body.len());
                joined.extend_from_slice(header);
                joined.extend_from_slice(body);
                Cow::Owned(String::from_utf8_lossy(&joined).into_owned())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framed_message_puts_header_first() {
        let message = RenderedMessage::Framed {
            header: b"[app] ".to_vec(),
            body: b"started".to_vec(),
        };
        assert_eq!(message.to_text(), "[app] started");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let message = RenderedMessage::Single(vec![b'o', b'k', 0xff]);
        assert_eq!(message.to_text(), "ok\u{fffd}");
    }
}
