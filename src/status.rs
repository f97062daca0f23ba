use std::fmt;

/// Outcome of a single [`send`](crate::sink::IngestSink::send) call.
///
/// Exactly one value is produced per call; outcomes are never combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The endpoint answered `200` or `204`.
    Success,
    /// The endpoint answered with any other status code.
    Failed,
    /// The request never produced a response (connect, timeout, TLS, I/O),
    /// or the manager was already stopped.
    Exception,
    /// The document was blank; no request was issued.
    EmptyMessage,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::Failed => "FAILED",
            Status::Exception => "EXCEPTION",
            Status::EmptyMessage => "EMPTY_MESSAGE",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Status;

    #[test]
    fn displays_wire_names() {
        assert_eq!(Status::Success.to_string(), "SUCCESS");
        assert_eq!(Status::EmptyMessage.to_string(), "EMPTY_MESSAGE");
        assert!(!Status::Failed.is_success());
    }
}
