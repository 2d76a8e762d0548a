//! Console sink.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use super::LogSink;
use crate::record::LogRecord;

/// Which standard stream to write to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStream {
    #[default]
    Stderr,
    Stdout,
}

/// Writes one line per record to stderr or stdout.
#[derive(Debug)]
pub struct ConsoleSink {
    stream: ConsoleStream,
}

impl ConsoleSink {
    pub fn new(stream: ConsoleStream) -> Self {
        Self { stream }
    }

    pub fn stream(&self) -> ConsoleStream {
        self.stream
    }
}

impl LogSink for ConsoleSink {
    fn emit(&self, _record: &LogRecord, line: &str) -> io::Result<()> {
        match self.stream {
            ConsoleStream::Stderr => writeln!(io::stderr().lock(), "{}", line),
            ConsoleStream::Stdout => writeln!(io::stdout().lock(), "{}", line),
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self.stream {
            ConsoleStream::Stderr => io::stderr().flush(),
            ConsoleStream::Stdout => io::stdout().flush(),
        }
    }

    fn destination(&self) -> String {
        match self.stream {
            ConsoleStream::Stderr => "<stderr>".to_string(),
            ConsoleStream::Stdout => "<stdout>".to_string(),
        }
    }
}
