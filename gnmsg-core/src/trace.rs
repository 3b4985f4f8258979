//! Recognizers for the client's diagnostic trace lines.
//!
//! Every log line starts with a prefix like
//!
//! ```text
//! [debug 2021/03/04 10:11:12.345678 PST host:4711 140234] TcrConnection::send: ...
//!        └─ date ─┘ └─── time ──────┘      └pid┘ └ tid ┘
//! ```
//!
//! followed by the trace text. Two generations of clients exist: current
//! ones dump payloads as packed hex, 9.x clients dump them as
//! space-separated decimal bytes and do not identify the sending thread.
//! [`TraceGrammar`] hides that difference; [`GrammarSelector`] picks one
//! per input stream and keeps it.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::message::Timestamp;
use crate::protocol::wire::{parse_decimal_bytes, parse_hex};

const TS: &str = r"(?:(\d{4}/\d{2}/\d{2})\s+)?(\d{2}:\d{2}:\d{2}\.\d+)";
const PTR: &str = r"[0-9a-fA-FxX]+";

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("trace pattern is a valid regex")
}

// =============================================================================
// Trace records
// =============================================================================

/// Outbound message dump.
#[derive(Debug, Clone, PartialEq)]
pub struct SendTrace {
    pub timestamp: Option<Timestamp>,
    pub thread_id: String,
    pub connection: String,
    pub bytes: Vec<u8>,
}

/// Security footer added to the next outbound message of a thread.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityTrace {
    pub timestamp: Option<Timestamp>,
    pub thread_id: String,
    pub connection: String,
    pub length: usize,
}

/// 17-byte header of an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderTrace {
    pub timestamp: Option<Timestamp>,
    pub thread_id: String,
    pub connection: Option<String>,
    pub bytes: Vec<u8>,
}

/// Body of an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyTrace {
    pub thread_id: String,
    pub connection: Option<String>,
    pub bytes: Vec<u8>,
}

/// Header of a chunked response, including its first chunk header.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHeaderTrace {
    pub timestamp: Option<Timestamp>,
    pub thread_id: String,
    pub connection: Option<String>,
    pub endpoint: String,
    pub bytes: Vec<u8>,
}

/// Header of one further chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkHeaderTrace {
    pub timestamp: Option<Timestamp>,
    pub thread_id: String,
    pub connection: Option<String>,
    pub chunk_len: u32,
    pub flags: u8,
}

/// A payload dump that carries no message framing (handshakes, locator
/// traffic).
#[derive(Debug, Clone, PartialEq)]
pub struct BlobTrace {
    pub timestamp: Option<Timestamp>,
    pub thread_id: Option<String>,
    pub bytes: Vec<u8>,
}

fn timestamp(caps: &Captures<'_>, date: usize, time: usize) -> Option<Timestamp> {
    let time = caps.get(time)?.as_str();
    Timestamp::parse(caps.get(date).map(|m| m.as_str()), time)
}

fn text(caps: &Captures<'_>, i: usize) -> Option<String> {
    caps.get(i).map(|m| m.as_str().to_string())
}

fn hex_payload(caps: &Captures<'_>, i: usize) -> Option<Vec<u8>> {
    let payload = caps.get(i)?.as_str();
    parse_hex(payload)
        .map_err(|e| log::debug!("ignoring trace payload: {}", e))
        .ok()
}

fn decimal_payload(caps: &Captures<'_>, i: usize) -> Option<Vec<u8>> {
    let payload = caps.get(i)?.as_str();
    parse_decimal_bytes(payload)
        .map_err(|e| log::debug!("ignoring trace payload: {}", e))
        .ok()
}

// =============================================================================
// TraceGrammar
// =============================================================================

/// Version-dependent part of the trace format.
pub trait TraceGrammar: Send + Sync {
    fn name(&self) -> &'static str;

    fn send(&self, line: &str) -> Option<SendTrace>;

    fn header(&self, line: &str) -> Option<HeaderTrace>;

    fn body(&self, line: &str) -> Option<BodyTrace>;
}

/// Current clients: packed hex payloads, thread id in every prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseGrammar;

/// 9.x clients: decimal payloads, no thread id on send traces.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyV9Grammar;

static BASE_SEND: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"{TS}.+:\d+\s+({PTR})\]\s*TcrConnection::send:\s*\[({PTR}).*sending request to endpoint.*bytes:\s*([0-9a-fA-F]+)\s*$"
    ))
});

static BASE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"{TS}.*:\d+\s+({PTR})\]\s*TcrConnection::readMessage(?:\(({PTR})\))?:\s*received header from endpoint.*bytes:\s*([0-9a-fA-F]+)\s*$"
    ))
});

static BASE_BODY: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r":\d+\s+({PTR})\]\s*TcrConnection::readMessage(?:\(({PTR})\))?:\s*received message body from endpoint.*bytes:\s*([0-9a-fA-F]*)\s*$"
    ))
});

static V9_SEND: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"{TS}.*TcrConnection::send:\s*\[({PTR}).*sending request to endpoint.*bytes:\s*([\d ]+)$"
    ))
});

static V9_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"{TS}.*:\d+\s+(\d+)\]\s*TcrConnection::readMessage:\s*received header from endpoint.*bytes:\s*([\d ]+)$"
    ))
});

static V9_BODY: LazyLock<Regex> = LazyLock::new(|| {
    compile(r":\d+\s+(\d+)\]\s*TcrConnection::readMessage:\s*received message body from endpoint.*bytes:\s*([\d ]*)$")
});

impl TraceGrammar for BaseGrammar {
    fn name(&self) -> &'static str {
        "base"
    }

    fn send(&self, line: &str) -> Option<SendTrace> {
        let caps = BASE_SEND.captures(line)?;
        Some(SendTrace {
            timestamp: timestamp(&caps, 1, 2),
            thread_id: text(&caps, 3)?,
            connection: text(&caps, 4)?,
            bytes: hex_payload(&caps, 5)?,
        })
    }

    fn header(&self, line: &str) -> Option<HeaderTrace> {
        let caps = BASE_HEADER.captures(line)?;
        Some(HeaderTrace {
            timestamp: timestamp(&caps, 1, 2),
            thread_id: text(&caps, 3)?,
            connection: text(&caps, 4),
            bytes: hex_payload(&caps, 5)?,
        })
    }

    fn body(&self, line: &str) -> Option<BodyTrace> {
        let caps = BASE_BODY.captures(line)?;
        Some(BodyTrace {
            thread_id: text(&caps, 1)?,
            connection: text(&caps, 2),
            bytes: hex_payload(&caps, 3)?,
        })
    }
}

impl TraceGrammar for LegacyV9Grammar {
    fn name(&self) -> &'static str {
        "v9"
    }

    fn send(&self, line: &str) -> Option<SendTrace> {
        let caps = V9_SEND.captures(line)?;
        Some(SendTrace {
            timestamp: timestamp(&caps, 1, 2),
            thread_id: "0".to_string(),
            connection: text(&caps, 3)?,
            bytes: decimal_payload(&caps, 4)?,
        })
    }

    fn header(&self, line: &str) -> Option<HeaderTrace> {
        let caps = V9_HEADER.captures(line)?;
        Some(HeaderTrace {
            timestamp: timestamp(&caps, 1, 2),
            thread_id: text(&caps, 3)?,
            connection: None,
            bytes: decimal_payload(&caps, 4)?,
        })
    }

    fn body(&self, line: &str) -> Option<BodyTrace> {
        let caps = V9_BODY.captures(line)?;
        Some(BodyTrace {
            thread_id: text(&caps, 1)?,
            connection: None,
            bytes: decimal_payload(&caps, 2)?,
        })
    }
}

// =============================================================================
// Grammar selection
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarKind {
    Base,
    LegacyV9,
}

impl GrammarKind {
    pub fn grammar(self) -> &'static dyn TraceGrammar {
        match self {
            GrammarKind::Base => &BaseGrammar,
            GrammarKind::LegacyV9 => &LegacyV9Grammar,
        }
    }
}

static PRODUCT_VERSION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"Product version:.*Native (\d+)\.(\d+)\.(\d+)-"));

/// Picks the trace grammar for one input stream.
///
/// A product version banner fixes the choice. Without one, the first
/// grammar that recognizes a line wins and is kept for the rest of the
/// stream.
#[derive(Debug, Clone, Default)]
pub struct GrammarSelector {
    locked: Option<GrammarKind>,
}

impl GrammarSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locked(&self) -> Option<GrammarKind> {
        self.locked
    }

    /// Check a line for the product version banner. Returns true if the
    /// line was a banner.
    pub fn observe_version(&mut self, line: &str) -> bool {
        if !line.contains("Product version") {
            return false;
        }
        let Some(caps) = PRODUCT_VERSION.captures(line) else {
            return false;
        };
        let major = caps.get(1).map_or("", |m| m.as_str());
        let kind = if major == "9" {
            GrammarKind::LegacyV9
        } else {
            GrammarKind::Base
        };
        log::debug!("native client {} detected, using {:?} trace grammar", &caps[0], kind);
        self.locked = Some(kind);
        true
    }

    /// Run `recognize` with the locked grammar, or with each candidate in
    /// turn until one matches (locking it).
    pub fn select<T>(&mut self, recognize: impl Fn(&dyn TraceGrammar) -> Option<T>) -> Option<T> {
        if let Some(kind) = self.locked {
            return recognize(kind.grammar());
        }
        for kind in [GrammarKind::Base, GrammarKind::LegacyV9] {
            if let Some(found) = recognize(kind.grammar()) {
                log::debug!("locking {} trace grammar", kind.grammar().name());
                self.locked = Some(kind);
                return Some(found);
            }
        }
        None
    }
}

// =============================================================================
// Version-independent traces
// =============================================================================

static SECURITY: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"{TS}.*:\d+\s+({PTR})\]\s*TcrMessage::addSecurityPart\s*\[(0x[0-9a-fA-F]*).*length\s*=\s*(\d+)\s*,\s*encrypted\s+ID\s*=\s*([0-9a-fA-F]+)"
    ))
});

static RESPONSE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"{TS}.*:\d+\s+({PTR})\]\s*TcrConnection::readResponseHeader(?:\(({PTR})\))?:\s*received header from endpoint\s*([\w:.\-]+);\s*bytes:\s*([0-9a-fA-F]+)"
    ))
});

static CHUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"{TS}.*:\d+\s+({PTR})\]\s*TcrConnection::readChunkHeader(?:\(({PTR})\))?:\s*.*, chunkLen=(\d+), lastChunkAndSecurityFlags=0[xX]([0-9a-fA-F]+)"
    ))
});

static PREFIX: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"{TS}.*:\d+\s+({PTR})\]")));

static HANDSHAKE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"Handshake bytes: \(\d+\):\s*([0-9a-fA-F]+)"));

static LOCATOR_REQUEST: LazyLock<Regex> =
    LazyLock::new(|| compile(r"sending\s+(\d+)\s+bytes\s+to\s+locator:\s*([0-9a-fA-F]+)"));

static LOCATOR_RESPONSE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"received\s+(\d+)\s+bytes\s+from\s+locator:\s*([0-9a-fA-F]+)"));

pub fn security(line: &str) -> Option<SecurityTrace> {
    let caps = SECURITY.captures(line)?;
    Some(SecurityTrace {
        timestamp: timestamp(&caps, 1, 2),
        thread_id: text(&caps, 3)?,
        connection: text(&caps, 4)?,
        length: caps.get(5)?.as_str().parse().ok()?,
    })
}

pub fn response_header(line: &str) -> Option<ResponseHeaderTrace> {
    let caps = RESPONSE_HEADER.captures(line)?;
    Some(ResponseHeaderTrace {
        timestamp: timestamp(&caps, 1, 2),
        thread_id: text(&caps, 3)?,
        connection: text(&caps, 4),
        endpoint: text(&caps, 5)?,
        bytes: hex_payload(&caps, 6)?,
    })
}

pub fn chunk_header(line: &str) -> Option<ChunkHeaderTrace> {
    let caps = CHUNK_HEADER.captures(line)?;
    Some(ChunkHeaderTrace {
        timestamp: timestamp(&caps, 1, 2),
        thread_id: text(&caps, 3)?,
        connection: text(&caps, 4),
        chunk_len: caps.get(5)?.as_str().parse().ok()?,
        // some builds print the flags word wider than a byte
        flags: (u32::from_str_radix(caps.get(6)?.as_str(), 16).ok()? & 0xFF) as u8,
    })
}

fn blob(line: &str, pattern: &Regex, payload: usize) -> Option<BlobTrace> {
    let caps = pattern.captures(line)?;
    let bytes = hex_payload(&caps, payload)?;
    let prefix = PREFIX.captures(line);
    Some(BlobTrace {
        timestamp: prefix.as_ref().and_then(|p| timestamp(p, 1, 2)),
        thread_id: prefix.as_ref().and_then(|p| text(p, 3)),
        bytes,
    })
}

pub fn handshake(line: &str) -> Option<BlobTrace> {
    blob(line, &HANDSHAKE, 1)
}

pub fn locator_request(line: &str) -> Option<BlobTrace> {
    blob(line, &LOCATOR_REQUEST, 2)
}

pub fn locator_response(line: &str) -> Option<BlobTrace> {
    blob(line, &LOCATOR_RESPONSE, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HDR: &str = "00000001000000100000000200000005";

    #[test]
    fn test_base_send() {
        let line = format!(
            "[debug 2021/03/04 10:11:12.345678 PST host:4711 140234] TcrConnection::send: [0x55d1c2e0] sending request to endpoint server:40404; bytes: {}00",
            HDR
        );
        let t = BaseGrammar.send(&line).unwrap();
        assert_eq!(t.thread_id, "140234");
        assert_eq!(t.connection, "0x55d1c2e0");
        assert_eq!(t.bytes.len(), 17);
        assert!(matches!(t.timestamp, Some(Timestamp::DateTime(_))));
    }

    #[test]
    fn test_v9_send_has_no_thread() {
        let line = "[fine 10:11:12.345 host:4711 1] TcrConnection::send: [0x55d1] sending request to endpoint s:1; bytes: 0 0 0 7 0 0 0 0 0 0 0 0 0 0 0 1 0";
        assert!(BaseGrammar.send(line).is_none());
        let t = LegacyV9Grammar.send(line).unwrap();
        assert_eq!(t.thread_id, "0");
        assert_eq!(t.bytes[3], 7);
        assert!(matches!(t.timestamp, Some(Timestamp::Time(_))));
    }

    #[test]
    fn test_header_with_and_without_pointer() {
        let with = format!(
            "[debug 2021/03/04 10:11:12.1 PST host:1 77] TcrConnection::readMessage(0xabc): received header from endpoint s:1; bytes: {}00",
            HDR
        );
        let t = BaseGrammar.header(&with).unwrap();
        assert_eq!(t.connection.as_deref(), Some("0xabc"));
        assert_eq!(t.thread_id, "77");

        let without = format!(
            "[debug 2021/03/04 10:11:12.1 PST host:1 77] TcrConnection::readMessage: received header from endpoint s:1; bytes: {}00",
            HDR
        );
        assert_eq!(BaseGrammar.header(&without).unwrap().connection, None);
    }

    #[test]
    fn test_body() {
        let line = "[debug 2021/03/04 10:11:12.1 PST host:1 77] TcrConnection::readMessage: received message body from endpoint s:1; bytes: 0000000100";
        let t = BaseGrammar.body(line).unwrap();
        assert_eq!(t.thread_id, "77");
        assert_eq!(t.bytes, vec![0, 0, 0, 1, 0]);
    }

    #[test]
    fn test_security() {
        let line = "[debug 2021/03/04 10:11:12.1 PST host:1 140234] TcrMessage::addSecurityPart [0x7f00] length = 16 , encrypted ID = 0a0b";
        let t = security(line).unwrap();
        assert_eq!(t.thread_id, "140234");
        assert_eq!(t.connection, "0x7f00");
        assert_eq!(t.length, 16);
    }

    #[test]
    fn test_chunk_traces() {
        let line = "[debug 2021/03/04 10:11:12.1 PST host:1 77] TcrConnection::readResponseHeader(0xabc): received header from endpoint server-1:40404; bytes: 000000010000000100000005000000200001";
        let t = response_header(line).unwrap();
        assert_eq!(t.endpoint, "server-1:40404");
        assert_eq!(t.connection.as_deref(), Some("0xabc"));
        assert_eq!(t.bytes.len(), 17);

        let line = "[debug 2021/03/04 10:11:12.2 PST host:1 77] TcrConnection::readChunkHeader(0xabc): , chunkLen=64, lastChunkAndSecurityFlags=0x01";
        let t = chunk_header(line).unwrap();
        assert_eq!(t.chunk_len, 64);
        assert_eq!(t.flags, 1);

        let wide = line.replace("=0x01", "=0x0001");
        assert_eq!(chunk_header(&wide).unwrap().flags, 1);
    }

    #[test]
    fn test_blob_traces() {
        let line = "[debug 2021/03/04 10:11:12.2 PST host:1 77] Handshake bytes: (3): 647d3b";
        let t = handshake(line).unwrap();
        assert_eq!(t.bytes, vec![0x64, 0x7d, 0x3b]);
        assert_eq!(t.thread_id.as_deref(), Some("77"));

        let t = locator_request("sending 2 bytes to locator: 03ea").unwrap();
        assert_eq!(t.bytes, vec![0x03, 0xea]);
        assert_eq!(t.thread_id, None);
        assert!(locator_response("received 1 bytes from locator: 01").is_some());
    }

    #[test]
    fn test_selector_locks_first_match() {
        let mut selector = GrammarSelector::new();
        let line = "[fine 10:11:12.345 host:4711 1] TcrConnection::send: [0x55d1] sending request to endpoint s:1; bytes: 0 0 0 7";
        assert!(selector.select(|g| g.send(line)).is_some());
        assert_eq!(selector.locked(), Some(GrammarKind::LegacyV9));
    }

    #[test]
    fn test_selector_version_banner() {
        let mut selector = GrammarSelector::new();
        assert!(selector.observe_version("[info 10:00:00.1 h:1 1] Product version: Pivotal GemFire Native 10.1.3-b12 (64bit)"));
        assert_eq!(selector.locked(), Some(GrammarKind::Base));
        assert!(selector.observe_version("Product version:  Native 9.1.1-b2"));
        assert_eq!(selector.locked(), Some(GrammarKind::LegacyV9));
        assert!(!selector.observe_version("nothing to see"));
    }
}
