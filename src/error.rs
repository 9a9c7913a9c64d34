//! Failure taxonomy shared by the network-facing clients.

/// Errors produced by the spamd protocol client and the LLM judge.
///
/// The screening pipeline converts every one of these into "signal absent"
/// at the orchestration boundary; a message always gets a verdict.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure: dial, reset, or broken pipe.
    #[error("connection error: {0}")]
    Connection(String),

    /// The peer answered, but the response was malformed or unsuccessful.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The caller-supplied deadline elapsed before the exchange finished.
    #[error("operation timed out")]
    Timeout,

    /// No usable provider is configured. Distinct from a runtime failure.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
