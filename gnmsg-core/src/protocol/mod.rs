//! Wire protocol grammars.
//!
//! Everything here works on plain byte slices recovered from trace lines.
//! All functions are pure.
//!
//! # Structure
//!
//! - [`wire`] - big-endian field reader and payload text normalization
//! - [`mutf8`] - modified UTF-8 string codec
//! - [`codes`] - code tables (message types, DS codes, fixed ids, ...)
//! - [`values`] - scalar decoding of serialized values
//! - [`parts`] - part shapes shared by the message grammars
//! - [`client`] / [`server`] - message body grammars per direction
//! - [`handshake`] - connection setup and locator exchanges
//!
//! # Example
//!
//! ```rust
//! use gnmsg_core::protocol::wire::{parse_hex, WireReader};
//!
//! let bytes = parse_hex("0000000700").unwrap();
//! let mut r = WireReader::new(&bytes);
//! assert_eq!(r.read_i32().unwrap(), 7);
//! assert_eq!(r.remaining(), 1);
//! ```

pub mod client;
pub mod codes;
pub mod handshake;
pub mod mutf8;
pub mod parts;
pub mod server;
pub mod values;
pub mod wire;
