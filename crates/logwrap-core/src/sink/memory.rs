//! In-memory buffering sink.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use chrono::NaiveDateTime;
use parking_lot::Mutex;

use super::{LogSink, Sink};
use crate::level::Level;
use crate::record::LogRecord;

/// Capacity used by configuration-built memory sinks.
pub const DEFAULT_MEMORY_CAPACITY: usize = 1024;

struct BufferState {
    capacity: usize,
    records: VecDeque<(LogRecord, String)>,
}

/// Shared handle to the records held by a memory sink.
///
/// Clone it before handing it to [`Sink::memory`] to read captured lines
/// later.
#[derive(Clone)]
pub struct MemoryBuffer {
    state: Arc<Mutex<BufferState>>,
}

impl MemoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BufferState {
                capacity: capacity.max(1),
                records: VecDeque::new(),
            })),
        }
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Formatted lines currently buffered, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.state
            .lock()
            .records
            .iter()
            .map(|(_, line)| line.clone())
            .collect()
    }

    /// Records currently buffered, oldest first.
    pub fn records(&self) -> Vec<LogRecord> {
        self.state
            .lock()
            .records
            .iter()
            .map(|(record, _)| record.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.state.lock().records.clear();
    }
}

/// Buffers records and optionally forwards them to a target sink.
///
/// With a target, the buffer is drained into it when it reaches capacity
/// or when a record at `flush_level` or above arrives. Without a target
/// only the most recent `capacity` records are kept.
pub struct MemorySink {
    buffer: MemoryBuffer,
    flush_level: Level,
    target: Option<Box<Sink>>,
}

impl MemorySink {
    pub fn new(buffer: MemoryBuffer, flush_level: Level, target: Option<Box<Sink>>) -> Self {
        Self {
            buffer,
            flush_level,
            target,
        }
    }

    pub fn buffer(&self) -> &MemoryBuffer {
        &self.buffer
    }

    pub fn flush_level(&self) -> Level {
        self.flush_level
    }

    pub fn target(&self) -> Option<&Sink> {
        self.target.as_deref()
    }

    pub(crate) fn prepare(self, date_filename: bool, at: NaiveDateTime) -> io::Result<Self> {
        let target = match self.target {
            Some(target) => Some(Box::new(target.prepare(date_filename, at)?)),
            None => None,
        };
        Ok(Self {
            buffer: self.buffer,
            flush_level: self.flush_level,
            target,
        })
    }

    fn drain_into(&self, target: &Sink) {
        let drained: Vec<_> = self.buffer.state.lock().records.drain(..).collect();
        for (record, line) in &drained {
            target.handle(record, line);
        }
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: &LogRecord, line: &str) -> io::Result<()> {
        let should_flush = {
            let mut state = self.buffer.state.lock();
            state.records.push_back((record.clone(), line.to_string()));
            let full = state.records.len() >= state.capacity;
            if self.target.is_none() {
                while state.records.len() > state.capacity {
                    state.records.pop_front();
                }
            }
            full || record.level >= self.flush_level
        };

        if let Some(target) = self.target.as_deref() {
            if should_flush {
                self.drain_into(target);
            }
        }
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        match self.target.as_deref() {
            Some(target) => {
                self.drain_into(target);
                target.flush()
            }
            None => Ok(()),
        }
    }

    fn failed_deliveries(&self) -> u64 {
        self.target.as_deref().map_or(0, Sink::error_count)
    }

    fn destination(&self) -> String {
        "<mem>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(level: Level, msg: &str) -> LogRecord {
        LogRecord::new("t", level, msg)
    }

    #[test]
    fn test_without_target_keeps_latest() {
        let buffer = MemoryBuffer::new(2);
        let sink = MemorySink::new(buffer.clone(), Level::Error, None);

        for msg in ["a", "b", "c"] {
            sink.emit(&record(Level::Info, msg), msg).unwrap();
        }

        assert_eq!(buffer.lines(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_flushes_to_target_on_level() {
        let buffer = MemoryBuffer::new(10);
        let captured = MemoryBuffer::new(10);
        let sink = MemorySink::new(
            buffer.clone(),
            Level::Error,
            Some(Box::new(Sink::memory(captured.clone()))),
        );

        sink.emit(&record(Level::Info, "one"), "one").unwrap();
        assert_eq!(buffer.len(), 1);
        assert!(captured.is_empty());

        sink.emit(&record(Level::Error, "two"), "two").unwrap();
        assert!(buffer.is_empty());
        assert_eq!(captured.lines(), vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_flushes_to_target_when_full() {
        let buffer = MemoryBuffer::new(2);
        let captured = MemoryBuffer::new(10);
        let sink = MemorySink::new(
            buffer.clone(),
            Level::Critical,
            Some(Box::new(Sink::memory(captured.clone()))),
        );

        sink.emit(&record(Level::Debug, "a"), "a").unwrap();
        sink.emit(&record(Level::Debug, "b"), "b").unwrap();
        assert_eq!(captured.len(), 2);

        sink.emit(&record(Level::Debug, "c"), "c").unwrap();
        sink.flush().unwrap();
        assert_eq!(captured.len(), 3);
        assert!(buffer.is_empty());
    }
}
