//! Inbound message reconstruction.
//!
//! Two independent flows share one decoder:
//!
//! ```text
//! readMessage header ──▶ AWAITING_BODY ──▶ readMessage body ──▶ emit
//!
//! readResponseHeader ──▶ readChunkHeader* ──▶ (last chunk flag) ──▶ emit
//! ```
//!
//! Traces are tracked per connection. Header traces that carry no
//! connection pointer are attributed through the thread's most recent send
//! trace; when even that is unknown the thread id stands in for the
//! connection.

use std::collections::HashMap;

use crossbeam::channel::Sender;

use super::{publish, publish_warning, ChunkedResponseDecoder, LineDecoder};
use crate::connection::{ProtocolState, ServerState};
use crate::error::ProtocolWarning;
use crate::message::{DecodedMessage, Direction, MessageHeader, Output};
use crate::protocol::server::{composite_key, grammar_for};
use crate::protocol::wire::WireReader;
use crate::trace::{
    self, BodyTrace, ChunkHeaderTrace, GrammarSelector, HeaderTrace, ResponseHeaderTrace,
};

/// Connection id reported when nothing better is known.
const UNKNOWN_CONNECTION: &str = "0";

struct PendingBody {
    header: MessageHeader,
    message: DecodedMessage,
}

pub struct ServerDecoder {
    tx: Sender<Output>,
    state: ProtocolState,
    grammar: GrammarSelector,
    /// thread id → connection, from send traces and header pointers
    connections: HashMap<String, String>,
    states: HashMap<String, ServerState>,
    pending: HashMap<String, PendingBody>,
    chunks: HashMap<String, ChunkedResponseDecoder>,
}

impl ServerDecoder {
    pub fn new(tx: Sender<Output>, state: ProtocolState) -> Self {
        ServerDecoder {
            tx,
            state,
            grammar: GrammarSelector::new(),
            connections: HashMap::new(),
            states: HashMap::new(),
            pending: HashMap::new(),
            chunks: HashMap::new(),
        }
    }

    fn is_candidate(line: &str) -> bool {
        line.contains("TcrConn") || line.contains("TcrMess")
    }

    /// Resolve the connection of a trace, remembering an explicit pointer.
    fn connection_for(&mut self, thread_id: &str, pointer: Option<String>) -> String {
        match pointer {
            Some(ptr) => {
                self.connections.insert(thread_id.to_string(), ptr.clone());
                ptr
            }
            None => self
                .connections
                .get(thread_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_CONNECTION.to_string()),
        }
    }

    fn state_key(thread_id: &str, connection: &str) -> String {
        if connection == UNKNOWN_CONNECTION {
            format!("thread {}", thread_id)
        } else {
            connection.to_string()
        }
    }

    // =========================================================================
    // Two-part messages
    // =========================================================================

    fn on_header(&mut self, trace: HeaderTrace) {
        let connection = self.connection_for(&trace.thread_id, trace.connection);
        let key = Self::state_key(&trace.thread_id, &connection);

        let mut r = WireReader::new(&trace.bytes);
        let parsed = MessageHeader::parse(&mut r);

        if self.states.get(&key).is_some_and(ServerState::is_pending) {
            let message_type = match &parsed {
                Ok(h) => h.type_name(),
                Err(_) => "UNKNOWN".to_string(),
            };
            publish_warning(
                &self.tx,
                ProtocolWarning::SequencingWarning {
                    connection: connection.clone(),
                    message_type,
                },
            );
            self.pending.remove(&key);
            self.states.insert(key.clone(), ServerState::Neutral);
        }

        let header = match parsed {
            Ok(h) => h,
            Err(e) => {
                let mut msg = DecodedMessage::new("UNKNOWN", Direction::Inbound);
                msg.timestamp = trace.timestamp;
                msg.thread_id = Some(trace.thread_id);
                msg.connection = Some(connection);
                msg.fail(&e);
                publish(&self.tx, Output::Message(msg));
                return;
            }
        };

        let mut message = DecodedMessage::from_header(&header, Direction::Inbound);
        message.timestamp = trace.timestamp;
        message.thread_id = Some(trace.thread_id);
        message.connection = Some(connection);
        log::debug!("server {} header on {}", message.message_type, key);

        self.pending.insert(key.clone(), PendingBody { header, message });
        self.states.insert(key, ServerState::AwaitingBody);
    }

    fn on_body(&mut self, trace: BodyTrace) {
        let connection = self.connection_for(&trace.thread_id, trace.connection);
        let key = Self::state_key(&trace.thread_id, &connection);

        if !self.states.get(&key).is_some_and(ServerState::is_pending) {
            log::debug!("message body on {} without a header, ignored", key);
            return;
        }
        self.states.insert(key.clone(), ServerState::Neutral);
        let Some(PendingBody { header, mut message }) = self.pending.remove(&key) else {
            return;
        };

        if let Some(response) = header.message_type.filter(|_| !message.is_error()) {
            let last_request = self.state.last_client_message(&trace.thread_id);
            match grammar_for(response, last_request) {
                Some(grammar) => message.decode_body(&header, &trace.bytes, grammar),
                None => {
                    if let Some(request) = last_request {
                        log::debug!(
                            "no grammar for {}",
                            composite_key(request, response)
                        );
                    }
                }
            }
        }
        publish(&self.tx, Output::Message(message));
    }

    // =========================================================================
    // Chunked responses
    // =========================================================================

    fn on_response_header(&mut self, trace: ResponseHeaderTrace) {
        let connection = self.connection_for(&trace.thread_id, trace.connection);
        let key = Self::state_key(&trace.thread_id, &connection);
        let decoder = self.chunks.entry(key.clone()).or_default();

        if decoder.in_progress() {
            publish_warning(
                &self.tx,
                ProtocolWarning::ChunkSequencing {
                    connection: connection.clone(),
                },
            );
            decoder.reset();
        }
        if let Err(e) = decoder.add_header(&trace.bytes, trace.timestamp) {
            log::debug!("unreadable response header from {}: {}", trace.endpoint, e);
            return;
        }
        log::debug!("chunked response header on {}", key);
        self.complete_chunked(&key, &trace.thread_id, connection);
    }

    fn on_chunk_header(&mut self, trace: ChunkHeaderTrace) {
        let connection = self.connection_for(&trace.thread_id, trace.connection);
        let key = Self::state_key(&trace.thread_id, &connection);
        match self.chunks.get_mut(&key) {
            Some(decoder) if decoder.in_progress() => {
                decoder.add_chunk_header(trace.chunk_len, trace.flags, trace.timestamp);
                self.complete_chunked(&key, &trace.thread_id, connection);
            }
            _ => log::debug!("chunk header on {} without a response header, ignored", key),
        }
    }

    fn complete_chunked(&mut self, key: &str, thread_id: &str, connection: String) {
        let Some(mut msg) = self.chunks.get_mut(key).and_then(|d| d.take_message()) else {
            return;
        };
        msg.thread_id = Some(thread_id.to_string());
        msg.connection = Some(connection);
        publish(&self.tx, Output::Message(msg));
    }
}

impl LineDecoder for ServerDecoder {
    fn process_line(&mut self, line: &str) {
        if self.grammar.observe_version(line) || !Self::is_candidate(line) {
            return;
        }

        if line.contains("TcrConnection::send") {
            if let Some(send) = self.grammar.select(|g| g.send(line)) {
                self.connections.insert(send.thread_id, send.connection);
            }
        } else if let Some(header) = trace::response_header(line) {
            self.on_response_header(header);
        } else if let Some(chunk) = trace::chunk_header(line) {
            self.on_chunk_header(chunk);
        } else if line.contains("readChunkBody") {
            log::trace!("chunk body trace skipped");
        } else if let Some(header) = self.grammar.select(|g| g.header(line)) {
            self.on_header(header);
        } else if let Some(body) = self.grammar.select(|g| g.body(line)) {
            self.on_body(body);
        }
    }

    fn name(&self) -> &'static str {
        "server"
    }
}
