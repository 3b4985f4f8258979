//! Outbound message reconstruction.
//!
//! ```text
//!            addSecurityPart                 send
//! NEUTRAL ─────────────────▶ AWAITING ─────────────────▶ emit ─▶ NEUTRAL
//!    │                                                     ▲
//!    └──────────────────────── send ───────────────────────┘
//! ```
//!
//! State is kept per thread id: the footer trace and the send trace of one
//! message are always written by the same thread.

use std::collections::HashMap;

use crossbeam::channel::Sender;

use super::{publish, publish_warning, LineDecoder};
use crate::connection::{ClientState, ProtocolState};
use crate::error::ProtocolWarning;
use crate::message::{DecodedMessage, Direction, MessageHeader, Output};
use crate::protocol::client::grammar_for;
use crate::protocol::wire::WireReader;
use crate::trace::{self, GrammarSelector, SendTrace};

pub struct ClientDecoder {
    tx: Sender<Output>,
    state: ProtocolState,
    grammar: GrammarSelector,
    threads: HashMap<String, ClientState>,
}

impl ClientDecoder {
    pub fn new(tx: Sender<Output>, state: ProtocolState) -> Self {
        ClientDecoder {
            tx,
            state,
            grammar: GrammarSelector::new(),
            threads: HashMap::new(),
        }
    }

    fn is_candidate(line: &str) -> bool {
        line.contains("TcrConnection::send") || line.contains("addSecurityPart")
    }

    fn on_send(&mut self, send: SendTrace) {
        let footer_seen = matches!(
            self.threads.insert(send.thread_id.clone(), ClientState::Neutral),
            Some(ClientState::AwaitingSecurityOrSend)
        );

        let (mut msg, header) = decode(&send.bytes);
        msg.timestamp = send.timestamp;
        msg.thread_id = Some(send.thread_id.clone());
        msg.connection = Some(send.connection);

        if let Some(header) = header {
            let needs_footer = header
                .message_type
                .is_some_and(|t| t.requires_security_footer());
            if header.security_flag() == 1 && needs_footer && !footer_seen {
                publish_warning(
                    &self.tx,
                    ProtocolWarning::MissingSecurityFooter {
                        thread_id: send.thread_id.clone(),
                        message_type: msg.message_type.clone(),
                    },
                );
            }
            if let (Some(message_type), false) = (header.message_type, msg.is_error()) {
                self.state.record_client_message(&send.thread_id, message_type);
            }
        }

        log::debug!("client {} on thread {}", msg.message_type, send.thread_id);
        publish(&self.tx, Output::Message(msg));
    }
}

/// Decode a complete outbound buffer. The header is returned when it could
/// be read at all.
fn decode(bytes: &[u8]) -> (DecodedMessage, Option<MessageHeader>) {
    let mut r = WireReader::new(bytes);
    let header = match MessageHeader::parse(&mut r) {
        Ok(h) => h,
        Err(e) => {
            let mut msg = DecodedMessage::new("UNKNOWN", Direction::Outbound);
            msg.fail(&e);
            return (msg, None);
        }
    };
    let mut msg = DecodedMessage::from_header(&header, Direction::Outbound);
    if let Some(grammar) = header.message_type.and_then(grammar_for) {
        if !msg.is_error() {
            msg.decode_body(&header, r.read_rest(), grammar);
        }
    }
    (msg, Some(header))
}

impl LineDecoder for ClientDecoder {
    fn process_line(&mut self, line: &str) {
        if self.grammar.observe_version(line) || !Self::is_candidate(line) {
            return;
        }

        if let Some(security) = trace::security(line) {
            log::debug!(
                "security footer ({} bytes) on thread {}",
                security.length,
                security.thread_id
            );
            self.threads
                .insert(security.thread_id, ClientState::AwaitingSecurityOrSend);
        } else if let Some(send) = self.grammar.select(|g| g.send(line)) {
            self.on_send(send);
        }
    }

    fn name(&self) -> &'static str {
        "client"
    }
}
