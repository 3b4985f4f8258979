//! # gnmsg
//!
//! Command-line front end for [`gnmsg_core`]: reads native client log files
//! and prints the protocol traffic found in them as JSON.
//!
//! ## Usage
//!
//! ```text
//! gnmsg [OPTIONS] <FILES>...
//!
//!   --handshakes        also decode handshake and locator dumps
//!   --no-messages       skip client/server messages
//!   --thread-id <TID>   only report records of one thread
//!   --compact           single-line JSON
//!   -v / -q             more / less logging on stderr
//! ```
//!
//! A directory argument stands for all `*.log` files in it, oldest rolled
//! file first.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use gnmsg_core::{Output, ScanOptions, Scanner};
use miette::Result;

pub mod input;
pub mod render;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Clone, Debug)]
#[command(version, about)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::WarnLevel>,

    /// Log files or directories of rolled log files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Decode handshake and locator traffic
    #[arg(long, default_value_t = false)]
    pub handshakes: bool,

    /// Do not decode client/server messages
    #[arg(long, default_value_t = false)]
    pub no_messages: bool,

    /// Only report records written by this thread
    #[arg(short, long)]
    pub thread_id: Option<String>,

    /// Print single-line JSON
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

impl Cli {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            handshakes: self.handshakes,
            messages: !self.no_messages,
            thread_id: self.thread_id.clone(),
        }
    }
}

/// Scan `lines` in up to two passes: handshakes first, then messages.
pub fn scan(options: &ScanOptions, lines: &[String]) -> Vec<Output> {
    let mut passes = Vec::new();
    if options.handshakes {
        passes.push(ScanOptions {
            messages: false,
            ..options.clone()
        });
    }
    if options.messages {
        passes.push(ScanOptions {
            handshakes: false,
            ..options.clone()
        });
    }

    let mut outputs = Vec::new();
    for pass in passes {
        let mut scanner = Scanner::new(pass);
        outputs.extend(scanner.scan_lines(lines));
    }
    outputs
}

pub fn run<W: Write>(cli: &Cli, writer: &mut W) -> Result<()> {
    let files = input::expand(&cli.files)?;
    log::info!("gnmsg {} scanning {} file(s)", VERSION, files.len());
    let lines = input::read_lines(&files)?;

    let outputs = scan(&cli.scan_options(), &lines);
    log::info!("{} records from {} lines", outputs.len(), lines.len());
    render::render(writer, &outputs, cli.compact)
}
