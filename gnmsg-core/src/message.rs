//! Decoded message records and the output channel payload.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Serialize, Serializer};

use crate::error::{DecodeError, ProtocolWarning};
use crate::protocol::codes::MessageType;
use crate::protocol::parts::Fields;
use crate::protocol::wire::{Result, WireReader};

/// Bytes in the fixed header in front of every client/server message.
pub const MESSAGE_HEADER_LEN: usize = 17;

/// `ERROR` text for any message whose body failed to decode.
pub const DECODE_FAILED: &str = "decode failed, message likely incomplete";

// =============================================================================
// Direction / Timestamp
// =============================================================================

/// Which way a message travelled, from the client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    #[serde(rename = "--->")]
    Outbound,
    #[serde(rename = "<---")]
    Inbound,
}

/// Log line timestamp. Older traces carry only the time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    DateTime(NaiveDateTime),
    Time(NaiveTime),
}

impl Timestamp {
    /// Parse `HH:MM:SS.frac` with an optional `YYYY/MM/DD` date.
    pub fn parse(date: Option<&str>, time: &str) -> Option<Self> {
        let time = NaiveTime::parse_from_str(time, "%H:%M:%S%.f").ok()?;
        match date {
            Some(d) => {
                let date = NaiveDate::parse_from_str(d, "%Y/%m/%d").ok()?;
                Some(Timestamp::DateTime(date.and_time(time)))
            }
            None => Some(Timestamp::Time(time)),
        }
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timestamp::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.6f")),
            Timestamp::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.6f")),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// Message header
// =============================================================================

/// Fixed message header.
///
/// ```text
/// ┌──────────┬──────────┬──────────┬──────────┬───────┐
/// │ type i32 │ len i32  │ parts i32│ txid i32 │ flags │
/// └──────────┴──────────┴──────────┴──────────┴───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub type_code: i32,
    pub message_type: Option<MessageType>,
    pub length: i32,
    pub part_count: i32,
    pub transaction_id: i32,
    pub flags: u8,
}

impl MessageHeader {
    pub fn parse(r: &mut WireReader<'_>) -> Result<Self> {
        let type_code = r.read_i32()?;
        Ok(MessageHeader {
            type_code,
            message_type: MessageType::from_repr(type_code),
            length: r.read_i32()?,
            part_count: r.read_i32()?,
            transaction_id: r.read_i32()?,
            flags: r.read_u8()?,
        })
    }

    pub fn security_flag(&self) -> u8 {
        (self.flags & 0x02) >> 1
    }

    /// Symbolic type name, `UNKNOWN(<code>)` for codes outside the table.
    pub fn type_name(&self) -> String {
        match self.message_type {
            Some(t) => t.to_string(),
            None => format!("UNKNOWN({})", self.type_code),
        }
    }
}

// =============================================================================
// Decoded message
// =============================================================================

/// One reconstructed protocol message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DecodedMessage {
    pub timestamp: Option<Timestamp>,
    #[serde(rename = "Type")]
    pub message_type: String,
    pub direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_flag: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_chunks: Option<u32>,
    #[serde(flatten)]
    pub parts: Fields,
    #[serde(rename = "ERROR", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

/// Body grammar for one message type.
pub type Grammar = fn(&MessageHeader, &mut WireReader<'_>, &mut Fields) -> Result<()>;

impl DecodedMessage {
    pub fn new(message_type: impl Into<String>, direction: Direction) -> Self {
        DecodedMessage {
            timestamp: None,
            message_type: message_type.into(),
            direction,
            connection: None,
            thread_id: None,
            transaction_id: None,
            part_count: None,
            length: None,
            security_flag: None,
            response_size: None,
            number_of_chunks: None,
            parts: Fields::new(),
            error: None,
            error_detail: None,
        }
    }

    /// Record with the header fields filled in. An unknown type is marked
    /// as failed straight away.
    pub fn from_header(header: &MessageHeader, direction: Direction) -> Self {
        let mut msg = DecodedMessage::new(header.type_name(), direction);
        msg.length = Some(header.length);
        msg.part_count = Some(header.part_count);
        msg.transaction_id = Some(header.transaction_id);
        msg.security_flag = Some(header.security_flag());
        if header.message_type.is_none() {
            msg.fail(&DecodeError::UnknownCode {
                table: "message type",
                code: i64::from(header.type_code),
            });
        }
        msg
    }

    /// Run a body grammar. Fields decoded before a failure are kept.
    pub fn decode_body(&mut self, header: &MessageHeader, body: &[u8], grammar: Grammar) {
        let mut r = WireReader::new(body);
        if let Err(e) = grammar(header, &mut r, &mut self.parts) {
            log::debug!("{} body decode failed: {}", self.message_type, e);
            self.fail(&e);
        }
    }

    pub fn fail(&mut self, error: &DecodeError) {
        self.error = Some(DECODE_FAILED.to_string());
        self.error_detail = Some(error.to_string());
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

// =============================================================================
// Output
// =============================================================================

/// Everything the reconstructors publish, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Output {
    Message(DecodedMessage),
    Handshake(Fields),
    Warning(ProtocolWarning),
}

impl Output {
    pub fn thread_id(&self) -> Option<&str> {
        match self {
            Output::Message(m) => m.thread_id.as_deref(),
            Output::Handshake(h) => h.get("ThreadId").and_then(|v| v.as_str()),
            Output::Warning(_) => None,
        }
    }
}
