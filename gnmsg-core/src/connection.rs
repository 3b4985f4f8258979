//! Per-connection reconstruction state and the state shared between the
//! client and server reconstructors.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   record_client_message   ┌────────────────────┐
//! │ ClientDecoder        │ ─────────────────────────▶│  ProtocolState     │
//! │ (per-thread state)   │                           │  tid → last type   │
//! └──────────────────────┘                           └─────────┬──────────┘
//!                                                              │ last_client_message
//!                                                    ┌─────────▼──────────┐
//!                                                    │ ServerDecoder      │
//!                                                    │ (per-conn state)   │
//!                                                    └────────────────────┘
//! ```
//!
//! Scans are single threaded; the table sits behind a lock only so that a
//! `ProtocolState` can be cloned into both decoders.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::protocol::codes::MessageType;

// =============================================================================
// Reconstructor states
// =============================================================================

/// Client side, per thread id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    /// Nothing pending
    #[default]
    Neutral,
    /// A security footer was added; the send trace is expected next
    AwaitingSecurityOrSend,
}

/// Server side, per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerState {
    /// Nothing pending
    #[default]
    Neutral,
    /// Header decoded, waiting for the message body trace
    AwaitingBody,
}

impl ServerState {
    pub fn is_pending(&self) -> bool {
        matches!(self, ServerState::AwaitingBody)
    }
}

// =============================================================================
// Shared cross-reference state
// =============================================================================

/// Last outbound message type per client thread.
///
/// Written by the client decoder after every published message, read by
/// the server decoder to choose a grammar for generic replies. Clones share
/// the same table; a fresh `ProtocolState` starts empty.
#[derive(Debug, Clone, Default)]
pub struct ProtocolState {
    last_client_message: Arc<RwLock<HashMap<String, MessageType>>>,
}

impl ProtocolState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_client_message(&self, thread_id: &str, message_type: MessageType) {
        let mut table = self
            .last_client_message
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        table.insert(thread_id.to_string(), message_type);
    }

    pub fn last_client_message(&self, thread_id: &str) -> Option<MessageType> {
        let table = self
            .last_client_message
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        table.get(thread_id).copied()
    }

    /// Forget everything, e.g. between independent scans.
    pub fn clear(&self) {
        self.last_client_message
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_states() {
        assert_eq!(ClientState::default(), ClientState::Neutral);
        assert!(!ServerState::default().is_pending());
        assert!(ServerState::AwaitingBody.is_pending());
    }

    #[test]
    fn test_last_message_wins() {
        let state = ProtocolState::new();
        assert_eq!(state.last_client_message("1"), None);
        state.record_client_message("1", MessageType::PUT);
        state.record_client_message("1", MessageType::REQUEST);
        state.record_client_message("2", MessageType::QUERY);
        assert_eq!(state.last_client_message("1"), Some(MessageType::REQUEST));
        assert_eq!(state.last_client_message("2"), Some(MessageType::QUERY));
    }

    #[test]
    fn test_clones_share_table() {
        let writer = ProtocolState::new();
        let reader = writer.clone();
        writer.record_client_message("7", MessageType::DESTROY);
        assert_eq!(reader.last_client_message("7"), Some(MessageType::DESTROY));

        reader.clear();
        assert_eq!(writer.last_client_message("7"), None);
    }

    #[test]
    fn test_fresh_state_is_isolated() {
        let a = ProtocolState::new();
        let b = ProtocolState::new();
        a.record_client_message("1", MessageType::PUT);
        assert_eq!(b.last_client_message("1"), None);
    }
}
