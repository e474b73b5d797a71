//! Error types for the notification domain.

use thiserror::Error;

/// Errors raised while encoding or decoding events for the transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventCodecError {
    /// The payload is not a valid event envelope.
    #[error("malformed event payload: {0}")]
    Malformed(String),

    /// The envelope carries a schema version this build does not read.
    #[error("unsupported event schema version: {0}")]
    UnsupportedVersion(u32),
}

/// Error returned while parsing an event type tag.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown event type: {0}")]
pub struct ParseEventTypeError(pub String);
