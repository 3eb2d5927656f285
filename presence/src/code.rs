use std::fmt;
use tokio::time::Instant;

/// Opaque, time-bounded code issued for one session.
///
/// The client never looks inside: presenters render it, participants forward
/// whatever the decoder read back verbatim.
#[derive(Clone, PartialEq, Eq)]
pub struct Code(String);

impl Code {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

// Rendered codes are long data URLs; keep them out of logs.
impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code({} bytes)", self.0.len())
    }
}

/// A code delivered by one rotation of the refresh loop.
#[derive(Debug, Clone)]
pub struct RotatedCode {
    pub session_id: String,
    pub code: Code,
    pub received_at: Instant,
}

/// String read out of a camera frame, waiting to be submitted.
///
/// Not `Clone`: submitting consumes it, so one detection cannot turn into two
/// submissions.
#[derive(Debug, PartialEq, Eq)]
pub struct DecodedPayload(String);

impl DecodedPayload {
    pub fn new(data: impl Into<String>) -> Self {
        Self(data.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}
