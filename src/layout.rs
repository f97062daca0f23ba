use crate::record::RenderedMessage;

/// Renders the message part of an event into bytes.
///
/// The encoder only sees the resulting [`RenderedMessage`]; layouts decide
/// whether that is a single byte sequence or a header + body pair.
pub trait Layout: Send + Sync {
    fn render(&self, message: &str) -> RenderedMessage;
}

/// Uses the event message as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainLayout;

impl Layout for PlainLayout {
    fn render(&self, message: &str) -> RenderedMessage {
        RenderedMessage::Single(message.as_bytes().to_vec())
    }
}

/// Prefixes every message with a fixed header.
#[derive(Debug, Clone)]
pub struct HeaderLayout {
    header: Vec<u8>,
}

impl HeaderLayout {
    pub fn new(header: impl Into<String>) -> Self {
        HeaderLayout {
            header: header.into().into_bytes(),
        }
    }
}

impl Layout for HeaderLayout {
    fn render(&self, message: &str) -> RenderedMessage {
        RenderedMessage::Framed {
            header: self.header.clone(),
            body: message.as_bytes().to_vec(),
        }
    }
}
