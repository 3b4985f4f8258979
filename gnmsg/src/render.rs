//! JSON rendering of scan results.
//!
//! Records are written as one JSON array, each element tagged by kind:
//!
//! ```text
//! [
//!   { "message":   { "Timestamp": ..., "Type": "PUT", ... } },
//!   { "handshake": { "Kind": "Handshake", ... } }
//! ]
//! ```
//!
//! Warnings never reach the renderer; they are reported through the log.

use std::io::Write;

use gnmsg_core::Output;
use miette::{IntoDiagnostic, Result};

pub fn is_rendered(output: &Output) -> bool {
    !matches!(output, Output::Warning(_))
}

pub fn render<W: Write>(writer: &mut W, outputs: &[Output], compact: bool) -> Result<()> {
    let records: Vec<&Output> = outputs.iter().filter(|o| is_rendered(o)).collect();
    if compact {
        serde_json::to_writer(&mut *writer, &records).into_diagnostic()?;
    } else {
        serde_json::to_writer_pretty(&mut *writer, &records).into_diagnostic()?;
    }
    writeln!(writer).into_diagnostic()?;
    Ok(())
}
