//! Queue sink.

use std::io;

use tokio::sync::mpsc::UnboundedSender;

use super::LogSink;
use crate::record::LogRecord;

/// A record handed to a queue consumer together with its formatted line.
#[derive(Debug, Clone)]
pub struct QueuedRecord {
    pub record: LogRecord,
    pub line: String,
}

/// Pushes records into an unbounded channel for another task to drain.
pub struct QueueSink {
    sender: UnboundedSender<QueuedRecord>,
}

impl QueueSink {
    pub fn new(sender: UnboundedSender<QueuedRecord>) -> Self {
        Self { sender }
    }
}

impl LogSink for QueueSink {
    fn emit(&self, record: &LogRecord, line: &str) -> io::Result<()> {
        // A dropped receiver just means nobody is listening anymore
        let _ = self.sender.send(QueuedRecord {
            record: record.clone(),
            line: line.to_string(),
        });
        Ok(())
    }

    fn destination(&self) -> String {
        "<queue>".to_string()
    }
}
