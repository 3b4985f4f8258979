//! Error and warning types for wire decoding

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while decoding a captured wire buffer.
///
/// None of these ever escape a reconstructor: they are caught at message
/// granularity and turned into an `ERROR` field on the published record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// A primitive read ran past the end of the captured bytes
    #[error("Malformed wire buffer: wanted {wanted} bytes at offset {offset}, {available} available")]
    MalformedWireBuffer {
        offset: usize,
        wanted: usize,
        available: usize,
    },

    /// Variable-length integer had no terminating group within 10 groups
    #[error("Malformed varint at offset {offset}")]
    MalformedVarint { offset: usize },

    /// A code did not map to any entry of a code table
    #[error("Unknown {table} code: {code}")]
    UnknownCode { table: &'static str, code: i64 },

    /// A field the protocol fixes to one value (or shape) had another
    #[error("Protocol invariant violated: {0}")]
    ProtocolInvariantViolation(String),

    /// Payload text was not valid hex (or decimal byte) notation
    #[error("Invalid hex payload: {0}")]
    InvalidHex(String),

    /// String bytes could not be decoded
    #[error("Invalid string encoding at offset {offset}")]
    InvalidString { offset: usize },
}

impl DecodeError {
    /// Shorthand for an invariant violation.
    pub fn invariant(msg: impl Into<String>) -> Self {
        DecodeError::ProtocolInvariantViolation(msg.into())
    }
}

/// Non-fatal observations about the trace itself.
///
/// Warnings never stop decoding. Reconstructors log them and publish them
/// on the output channel next to the messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "Kind")]
pub enum ProtocolWarning {
    /// A header arrived while the previous message on the same connection
    /// was still waiting for its body.
    SequencingWarning {
        #[serde(rename = "Connection")]
        connection: String,
        #[serde(rename = "Type")]
        message_type: String,
    },

    /// Security flag set on an outbound message with no footer trace before it.
    MissingSecurityFooter {
        #[serde(rename = "ThreadId")]
        thread_id: String,
        #[serde(rename = "Type")]
        message_type: String,
    },

    /// A chunked response header arrived before the previous chunked
    /// response on the same connection completed.
    ChunkSequencing {
        #[serde(rename = "Connection")]
        connection: String,
    },
}

impl std::fmt::Display for ProtocolWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolWarning::SequencingWarning {
                connection,
                message_type,
            } => write!(
                f,
                "{} header on connection {} arrived before previous body",
                message_type, connection
            ),
            ProtocolWarning::MissingSecurityFooter {
                thread_id,
                message_type,
            } => write!(
                f,
                "{} on thread {} has security flag set but no security footer was added",
                message_type, thread_id
            ),
            ProtocolWarning::ChunkSequencing { connection } => write!(
                f,
                "chunked response header on connection {} arrived before previous response completed",
                connection
            ),
        }
    }
}
