//! Line scanner: feeds every line to the reconstructors and collects what
//! they publish.

use crossbeam::channel::{unbounded, Receiver};
use serde::Deserialize;

use crate::connection::ProtocolState;
use crate::decoders::{ClientDecoder, HandshakeDecoder, LineDecoder, ServerDecoder};
use crate::message::Output;

/// What a scan reports.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ScanOptions {
    /// Decode handshake and locator dumps
    pub handshakes: bool,
    /// Decode client and server messages
    pub messages: bool,
    /// Only report records written by this thread
    pub thread_id: Option<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            handshakes: false,
            messages: true,
            thread_id: None,
        }
    }
}

/// Reconstructors wired to one output channel and one [`ProtocolState`].
pub struct Scanner {
    options: ScanOptions,
    decoders: Vec<Box<dyn LineDecoder>>,
    rx: Receiver<Output>,
    state: ProtocolState,
}

impl Scanner {
    pub fn new(options: ScanOptions) -> Self {
        let (tx, rx) = unbounded();
        let state = ProtocolState::new();

        let mut decoders: Vec<Box<dyn LineDecoder>> = Vec::new();
        if options.handshakes {
            decoders.push(Box::new(HandshakeDecoder::new(tx.clone())));
        }
        if options.messages {
            decoders.push(Box::new(ClientDecoder::new(tx.clone(), state.clone())));
            decoders.push(Box::new(ServerDecoder::new(tx, state.clone())));
        }
        log::debug!(
            "scanner with {}",
            decoders.iter().map(|d| d.name()).collect::<Vec<_>>().join(", ")
        );

        Scanner {
            options,
            decoders,
            rx,
            state,
        }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Cross-reference table shared by the client and server reconstructors.
    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    /// Feed one line; returns the records it completed, filtered.
    pub fn scan_line(&mut self, line: &str) -> Vec<Output> {
        for decoder in &mut self.decoders {
            decoder.process_line(line);
        }
        self.rx
            .try_iter()
            .filter(|output| self.wanted(output))
            .collect()
    }

    pub fn scan_lines<I, S>(&mut self, lines: I) -> Vec<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Vec::new();
        for line in lines {
            out.extend(self.scan_line(line.as_ref()));
        }
        out
    }

    fn wanted(&self, output: &Output) -> bool {
        match (&self.options.thread_id, output) {
            (_, Output::Warning(_)) => true,
            (Some(tid), o) => o.thread_id() == Some(tid.as_str()),
            (None, _) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::testing::*;
    use crate::protocol::codes::MessageType;

    fn options(json: &str) -> ScanOptions {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_default_options() {
        assert_eq!(options("{}"), ScanOptions::default());
        let opts = options(r#"{"handshakes": true, "thread_id": "7"}"#);
        assert!(opts.handshakes && opts.messages);
        assert_eq!(opts.thread_id.as_deref(), Some("7"));
    }

    #[test]
    fn test_request_and_reply() {
        let mut scanner = Scanner::new(ScanOptions::default());
        let size = message(81, 1, 0, &part(0, b"orders"));
        let reply_body = part(0, &12i32.to_be_bytes());
        let out = scanner.scan_lines([
            send_line("77", "0xabc", &size),
            header_line("77", None, &header(1, reply_body.len(), 1, 1, 0)),
            body_line("77", &reply_body),
        ]);

        assert_eq!(out.len(), 2);
        assert!(matches!(&out[0], Output::Message(m) if m.message_type == "SIZE"));
        let Output::Message(reply) = &out[1] else {
            panic!("expected message");
        };
        assert_eq!(reply.message_type, "RESPONSE");
        assert_eq!(reply.connection.as_deref(), Some("0xabc"));
        assert!(reply.parts.contains_key("RegionSize"));
        assert_eq!(scanner.state().last_client_message("77"), Some(MessageType::SIZE));
    }

    fn decimal(bytes: &[u8]) -> String {
        bytes.iter().map(|b| b.to_string()).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_v9_log() {
        let mut body = part(1, &[0xac, 0xed, 0x00]);
        body.extend(part(0, b"java.lang.Exception: boom"));
        let lines = [
            format!("{} 1] Product version: Pivotal GemFire Native 9.2.4-b1 (64bit)", PREFIX),
            format!(
                "{} 1] TcrConnection::send: [0x55d1] sending request to endpoint server:40404; bytes: {}",
                PREFIX,
                decimal(&message(5, 0, 0, &[]))
            ),
            format!(
                "{} 77] TcrConnection::readMessage: received header from endpoint server:40404; bytes: {}",
                PREFIX,
                decimal(&header(2, body.len(), 2, 9, 0))
            ),
            format!(
                "{} 77] TcrConnection::readMessage: received message body from endpoint server:40404; bytes: {}",
                PREFIX,
                decimal(&body)
            ),
        ];

        let mut scanner = Scanner::new(ScanOptions::default());
        let out = scanner.scan_lines(&lines);
        assert_eq!(out.len(), 2, "{:?}", out);

        let Output::Message(ping) = &out[0] else {
            panic!("expected message");
        };
        assert_eq!(ping.message_type, "PING");
        assert_eq!(ping.thread_id.as_deref(), Some("0"));
        assert_eq!(ping.connection.as_deref(), Some("0x55d1"));

        let Output::Message(exception) = &out[1] else {
            panic!("expected message");
        };
        assert_eq!(exception.message_type, "EXCEPTION");
        assert_eq!(exception.thread_id.as_deref(), Some("77"));
        assert_eq!(exception.connection.as_deref(), Some("0"));
        assert_eq!(exception.transaction_id, Some(9));
        assert!(!exception.is_error(), "{:?}", exception.error_detail);
        assert_eq!(
            exception.parts["StringRepresentationPart"]["ExceptionMessageAndCallstack"],
            "java.lang.Exception: boom"
        );
    }

    #[test]
    fn test_thread_filter() {
        let mut scanner = Scanner::new(ScanOptions {
            thread_id: Some("2".to_string()),
            ..ScanOptions::default()
        });
        let ping = message(5, 0, 0, &[]);
        assert!(scanner.scan_line(&send_line("1", "0x1", &ping)).is_empty());
        assert_eq!(scanner.scan_line(&send_line("2", "0x1", &ping)).len(), 1);

        // Warnings are not attributed to a thread and always pass.
        let size = message(81, 1, 0x02, &part(0, b"r"));
        let out = scanner.scan_line(&send_line("1", "0x1", &size));
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Output::Warning(_)));
    }

    #[test]
    fn test_category_toggles() {
        let handshake = "[fine 10:11:12.5 host:1 42] Handshake bytes: (3): 647d3b";
        let ping = send_line("1", "0x1", &message(5, 0, 0, &[]));

        let mut messages_only = Scanner::new(ScanOptions::default());
        assert!(messages_only.scan_line(handshake).is_empty());
        assert_eq!(messages_only.scan_line(&ping).len(), 1);

        let mut handshakes_only = Scanner::new(ScanOptions {
            handshakes: true,
            messages: false,
            thread_id: None,
        });
        assert_eq!(handshakes_only.scan_line(handshake).len(), 1);
        assert!(handshakes_only.scan_line(&ping).is_empty());
    }

    #[test]
    fn test_scans_are_isolated() {
        let mut first = Scanner::new(ScanOptions::default());
        first.scan_line(&send_line("1", "0x1", &message(5, 0, 0, &[])));
        let second = Scanner::new(ScanOptions::default());
        assert_eq!(first.state().last_client_message("1"), Some(MessageType::PING));
        assert_eq!(second.state().last_client_message("1"), None);
    }
}
