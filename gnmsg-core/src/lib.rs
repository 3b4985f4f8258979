//! # gnmsg-core
//!
//! Forensic decoder for the Geode client/server wire protocol, working from
//! the byte dumps a native client writes into its debug log.
//!
//! Nothing here touches a socket or a file. Input is a stream of log lines,
//! output is a stream of decoded records.
//!
//! ## Architecture
//!
//! ```text
//!            log line
//!               │
//!     ┌─────────┼───────────────────────┐
//!     ▼         ▼                       ▼
//! Handshake   ClientDecoder ──────▶ ServerDecoder
//! Decoder     (per thread)  last    (per connection,
//!     │            │        request  chunk reassembly)
//!     │            │                    │
//!     └────────────┴──── Output ────────┘
//!                   crossbeam channel
//!                        │
//!                     Scanner ──▶ Vec<Output>
//! ```
//!
//! ## Key Modules
//!
//! - [`trace`] - recognizers for the trace line formats of each client generation
//! - [`protocol`] - byte-level grammars and code tables
//! - [`decoders`] - the line-driven reconstructors
//! - [`connection`] - reconstructor states and the shared cross-reference table
//! - [`scanner`] - wires everything to one channel
//!
//! ## Example
//!
//! ```rust
//! use gnmsg_core::{Output, ScanOptions, Scanner};
//!
//! let mut scanner = Scanner::new(ScanOptions::default());
//! let line = "[debug 2021/03/04 10:11:12.345678 PST host:4711 140234] \
//!     TcrConnection::send: [0x55d1] sending request to endpoint server:40404; \
//!     bytes: 0000000500000000000000000000000100";
//! let out = scanner.scan_line(line);
//! match &out[0] {
//!     Output::Message(m) => assert_eq!(m.message_type, "PING"),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

pub mod connection;
pub mod decoders;
pub mod error;
pub mod message;
pub mod protocol;
pub mod scanner;
pub mod trace;

pub use connection::{ClientState, ProtocolState, ServerState};
pub use decoders::{ClientDecoder, HandshakeDecoder, LineDecoder, ServerDecoder};
pub use error::{DecodeError, ProtocolWarning};
pub use message::{DecodedMessage, Direction, Output, Timestamp};
pub use scanner::{ScanOptions, Scanner};
