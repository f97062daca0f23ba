use crate::status::Status;

/// Destination for encoded JSON documents.
///
/// [`IngestManager`](crate::manager::IngestManager) is the HTTP
/// implementation; the layer only depends on this trait.
pub trait IngestSink: Send + Sync {
    /// Deliver a single document.
    ///
    /// **Parameters**
    /// - `document`: JSON document produced by the
    ///   [`EventEncoder`](crate::encoder::EventEncoder).
    ///
    /// **Returns**
    /// - a [`Status`] classifying the attempt. Implementations never panic
    ///   and never retry; a failed document is dropped by the caller.
    ///
    /// This method is called synchronously from the thread that emitted the
    /// event and may be called from many threads at once.
    fn send(&self, document: &str) -> Status;
}
