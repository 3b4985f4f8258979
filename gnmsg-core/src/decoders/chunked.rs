//! Chunked response reassembly.
//!
//! A chunked response starts with a response header that already describes
//! its first chunk:
//!
//! ```text
//! ┌──────────┬───────────┬──────────┬──────────────┬───────┐
//! │ type i32 │ parts i32 │ txid i32 │ chunkLen i32 │ flags │
//! └──────────┴───────────┴──────────┴──────────────┴───────┘
//! ```
//!
//! Every further chunk is announced by its own chunk header trace. Bit 0 of
//! the flags byte marks the last chunk.

use crate::message::{DecodedMessage, Direction, Timestamp};
use crate::protocol::codes::MessageType;
use crate::protocol::wire::{Result, WireReader};

const LAST_CHUNK: u8 = 0x01;

#[derive(Debug, Clone, PartialEq)]
struct ResponseHeader {
    type_code: i32,
    part_count: i32,
    transaction_id: i32,
}

/// Running totals for one chunked response.
#[derive(Debug, Clone, Default)]
pub struct ChunkedResponseDecoder {
    header: Option<ResponseHeader>,
    response_size: u64,
    chunks: u32,
    last_flags: u8,
    timestamp: Option<Timestamp>,
}

impl ChunkedResponseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A response header has been seen and the last chunk has not.
    pub fn in_progress(&self) -> bool {
        self.header.is_some() && !self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.header.is_some() && self.last_flags & LAST_CHUNK != 0
    }

    /// Start a response from its header bytes. The embedded first chunk is
    /// counted like any other.
    pub fn add_header(&mut self, bytes: &[u8], timestamp: Option<Timestamp>) -> Result<()> {
        let mut r = WireReader::new(bytes);
        let header = ResponseHeader {
            type_code: r.read_i32()?,
            part_count: r.read_i32()?,
            transaction_id: r.read_i32()?,
        };
        let chunk_len = r.read_i32()?;
        let flags = r.read_u8()?;

        self.reset();
        self.header = Some(header);
        self.add_chunk_header(u32::try_from(chunk_len).unwrap_or(0), flags, timestamp);
        Ok(())
    }

    pub fn add_chunk_header(&mut self, chunk_len: u32, flags: u8, timestamp: Option<Timestamp>) {
        self.response_size += u64::from(chunk_len);
        self.chunks += 1;
        self.last_flags = flags;
        if timestamp.is_some() {
            self.timestamp = timestamp;
        }
    }

    /// Hand out the finished record and start over. Returns `None` until
    /// the last chunk has been seen.
    pub fn take_message(&mut self) -> Option<DecodedMessage> {
        if !self.is_complete() {
            return None;
        }
        let header = self.header.take()?;
        let name = match MessageType::from_repr(header.type_code) {
            Some(t) => t.to_string(),
            None => format!("UNKNOWN({})", header.type_code),
        };
        let mut msg = DecodedMessage::new(name, Direction::Inbound);
        msg.timestamp = self.timestamp;
        msg.part_count = Some(header.part_count);
        msg.transaction_id = Some(header.transaction_id);
        msg.response_size = Some(self.response_size);
        msg.number_of_chunks = Some(self.chunks);
        self.reset();
        Some(msg)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
