use crate::sink::IngestSink;
use crate::status::Status;

/// A sink that drops every document and reports success.
///
/// Useful for measuring the overhead of the layer and encoder without any
/// network I/O, and for tests that don't care about delivery.
#[derive(Clone, Default)]
pub struct NoopSink;

impl IngestSink for NoopSink {
    fn send(&self, document: &str) -> Status {
        if document.trim().is_empty() {
            Status::EmptyMessage
        } else {
            Status::Success
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_documents_are_empty_messages() {
        assert_eq!(NoopSink.send("  "), Status::EmptyMessage);
        assert_eq!(NoopSink.send("{}"), Status::Success);
    }
}
