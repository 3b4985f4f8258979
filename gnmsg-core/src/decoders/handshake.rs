//! One-shot decoding of connection setup dumps: the server handshake and
//! the locator request/response pair. Each recognized line produces
//! exactly one record; nothing carries over between lines.

use crossbeam::channel::Sender;
use serde_json::json;

use super::{publish, LineDecoder};
use crate::message::{Output, DECODE_FAILED};
use crate::protocol::handshake::{handshake, locator_request, locator_response};
use crate::protocol::parts::Fields;
use crate::protocol::wire::{Result, WireReader};
use crate::trace::{self, BlobTrace};

type BlobGrammar = fn(&mut WireReader<'_>, &mut Fields) -> Result<()>;

pub struct HandshakeDecoder {
    tx: Sender<Output>,
}

impl HandshakeDecoder {
    pub fn new(tx: Sender<Output>) -> Self {
        HandshakeDecoder { tx }
    }

    fn emit(&self, kind: &str, blob: BlobTrace, grammar: BlobGrammar) {
        let mut record = Fields::new();
        if let Some(ts) = blob.timestamp {
            record.insert("Timestamp".into(), json!(ts.to_string()));
        }
        if let Some(tid) = blob.thread_id {
            record.insert("ThreadId".into(), json!(tid));
        }
        record.insert("Kind".into(), json!(kind));

        let mut r = WireReader::new(&blob.bytes);
        if let Err(e) = grammar(&mut r, &mut record) {
            log::debug!("{} decode failed: {}", kind, e);
            record.insert("ERROR".into(), json!(DECODE_FAILED));
            record.insert("ErrorDetail".into(), json!(e.to_string()));
        }
        publish(&self.tx, Output::Handshake(record));
    }
}

impl LineDecoder for HandshakeDecoder {
    fn process_line(&mut self, line: &str) {
        if let Some(blob) = trace::handshake(line) {
            self.emit("Handshake", blob, handshake);
        } else if let Some(blob) = trace::locator_request(line) {
            self.emit("LocatorRequest", blob, locator_request);
        } else if let Some(blob) = trace::locator_response(line) {
            self.emit("LocatorResponse", blob, locator_response);
        }
    }

    fn name(&self) -> &'static str {
        "handshake"
    }
}
