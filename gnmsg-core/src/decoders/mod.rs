//! Line-driven reconstructors.
//!
//! Each reconstructor looks at every input line, keeps whatever per-thread
//! or per-connection state it needs, and publishes finished records on the
//! shared output channel. A line that means nothing to a reconstructor is
//! ignored silently.

mod chunked;
mod client;
mod handshake;
mod server;

pub use chunked::ChunkedResponseDecoder;
pub use client::ClientDecoder;
pub use handshake::HandshakeDecoder;
pub use server::ServerDecoder;

use crossbeam::channel::Sender;

use crate::error::ProtocolWarning;
use crate::message::Output;

// =============================================================================
// LineDecoder Trait
// =============================================================================

/// Trait for trace line reconstructors.
///
/// `process_line` never fails: a line that cannot be decoded yields a
/// record carrying `ERROR`, a warning, or nothing at all.
pub trait LineDecoder: Send {
    /// Feed one log line.
    fn process_line(&mut self, line: &str);

    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;
}

// =============================================================================
// Publishing
// =============================================================================

fn publish(tx: &Sender<Output>, output: Output) {
    if tx.send(output).is_err() {
        log::debug!("output receiver dropped, record discarded");
    }
}

fn publish_warning(tx: &Sender<Output>, warning: ProtocolWarning) {
    log::warn!("{}", warning);
    publish(tx, Output::Warning(warning));
}
