//! Output sinks.
//!
//! A [`Sink`] pairs one concrete output target with a minimum level. The
//! set of targets is closed: classification for path reporting and
//! removal is a `match` on [`SinkKind`], not a runtime type test.
//!
//! ```text
//! Any
//! ├── Stream
//! │   ├── Console   <stderr> / <stdout>
//! │   └── File      /abs/path/app_20230501120000.log
//! ├── Syslog        /dev/log | host:port
//! ├── Socket        host:port
//! ├── Mail          ops@example.com,dev@example.com
//! ├── Memory        <mem>
//! ├── Http          http://collector/logs
//! └── Queue         <queue>
//! ```

mod console;
mod file;
mod http;
mod mail;
mod memory;
mod queue;
mod socket;
mod syslog;

use std::fmt;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::level::Level;
use crate::record::LogRecord;

pub use console::{ConsoleSink, ConsoleStream};
pub use file::{FileMode, FileSink};
pub use http::{HttpMethod, HttpSink};
pub use mail::{MailSettings, MailSink};
pub use memory::{MemoryBuffer, MemorySink, DEFAULT_MEMORY_CAPACITY};
pub use queue::{QueueSink, QueuedRecord};
pub use socket::SocketSink;
pub use syslog::{Facility, SyslogAddress, SyslogSink};

/// Upper bound on establishing a TCP connection for a network sink.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect to `address` (`host:port`), trying each resolved address with
/// `timeout`. Returns the last failure when none accepts.
pub(crate) fn connect_tcp(address: &str, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_error = None;
    for addr in address.to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{} did not resolve to any address", address),
        )
    }))
}

/// Behaviour shared by every output target.
pub trait LogSink: Send + Sync {
    /// Write one formatted record.
    fn emit(&self, record: &LogRecord, line: &str) -> io::Result<()>;

    /// Push buffered output to its destination.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    /// Failures from deliveries that completed after `emit` returned.
    fn failed_deliveries(&self) -> u64 {
        0
    }

    /// Human-readable destination (stream name, path, address, URL, marker).
    fn destination(&self) -> String;
}

/// Sink classification.
///
/// `Any` and `Stream` never describe a concrete sink; they select groups
/// when querying or removing sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Every sink
    Any,
    /// Console and file sinks
    Stream,
    Console,
    File,
    Syslog,
    Socket,
    Mail,
    Memory,
    Http,
    Queue,
}

impl SinkKind {
    /// True when a sink of kind `other` is selected by `self`.
    pub fn includes(self, other: SinkKind) -> bool {
        match self {
            SinkKind::Any => true,
            SinkKind::Stream => matches!(
                other,
                SinkKind::Stream | SinkKind::Console | SinkKind::File
            ),
            kind => kind == other,
        }
    }
}

/// The concrete output behind a [`Sink`].
pub enum SinkTarget {
    Console(ConsoleSink),
    File(FileSink),
    Syslog(SyslogSink),
    Socket(SocketSink),
    Mail(MailSink),
    Memory(MemorySink),
    Http(HttpSink),
    Queue(QueueSink),
}

impl SinkTarget {
    fn as_log_sink(&self) -> &dyn LogSink {
        match self {
            SinkTarget::Console(s) => s,
            SinkTarget::File(s) => s,
            SinkTarget::Syslog(s) => s,
            SinkTarget::Socket(s) => s,
            SinkTarget::Mail(s) => s,
            SinkTarget::Memory(s) => s,
            SinkTarget::Http(s) => s,
            SinkTarget::Queue(s) => s,
        }
    }

    fn kind(&self) -> SinkKind {
        match self {
            SinkTarget::Console(_) => SinkKind::Console,
            SinkTarget::File(_) => SinkKind::File,
            SinkTarget::Syslog(_) => SinkKind::Syslog,
            SinkTarget::Socket(_) => SinkKind::Socket,
            SinkTarget::Mail(_) => SinkKind::Mail,
            SinkTarget::Memory(_) => SinkKind::Memory,
            SinkTarget::Http(_) => SinkKind::Http,
            SinkTarget::Queue(_) => SinkKind::Queue,
        }
    }
}

/// An output target with its own minimum level.
pub struct Sink {
    target: SinkTarget,
    level: Level,
    errors: AtomicU64,
}

impl Sink {
    fn new(target: SinkTarget) -> Self {
        Self {
            target,
            level: Level::Debug,
            errors: AtomicU64::new(0),
        }
    }

    /// Standard error.
    pub fn console() -> Self {
        Self::new(SinkTarget::Console(ConsoleSink::new(ConsoleStream::Stderr)))
    }

    /// Standard output.
    pub fn stdout() -> Self {
        Self::new(SinkTarget::Console(ConsoleSink::new(ConsoleStream::Stdout)))
    }

    /// Append to a file. The file is opened when the sink is attached.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::file_with_mode(path, FileMode::Append)
    }

    /// File sink with an explicit open mode.
    pub fn file_with_mode(path: impl Into<PathBuf>, mode: FileMode) -> Self {
        Self::new(SinkTarget::File(FileSink::new(path, mode)))
    }

    /// Syslog with the default facility.
    pub fn syslog(address: SyslogAddress) -> Self {
        Self::new(SinkTarget::Syslog(SyslogSink::new(address, Facility::default())))
    }

    /// Syslog with an explicit facility.
    pub fn syslog_with_facility(address: SyslogAddress, facility: Facility) -> Self {
        Self::new(SinkTarget::Syslog(SyslogSink::new(address, facility)))
    }

    /// Length-prefixed JSON records over TCP.
    pub fn socket(address: impl Into<String>) -> Self {
        Self::new(SinkTarget::Socket(SocketSink::new(address)))
    }

    /// One mail per record.
    pub fn mail(settings: MailSettings) -> Self {
        Self::new(SinkTarget::Mail(MailSink::new(settings)))
    }

    /// In-memory buffer without a flush target.
    pub fn memory(buffer: MemoryBuffer) -> Self {
        Self::new(SinkTarget::Memory(MemorySink::new(buffer, Level::Error, None)))
    }

    /// In-memory buffer that flushes into `target` when full or when a
    /// record at `flush_level` or above arrives.
    pub fn memory_with_target(buffer: MemoryBuffer, flush_level: Level, target: Sink) -> Self {
        Self::new(SinkTarget::Memory(MemorySink::new(
            buffer,
            flush_level,
            Some(Box::new(target)),
        )))
    }

    /// HTTP GET or POST per record.
    pub fn http(url: impl Into<String>, method: HttpMethod) -> Self {
        Self::new(SinkTarget::Http(HttpSink::new(url, method)))
    }

    /// Hand records to a channel.
    pub fn queue(sender: tokio::sync::mpsc::UnboundedSender<QueuedRecord>) -> Self {
        Self::new(SinkTarget::Queue(QueueSink::new(sender)))
    }

    /// Set the minimum level this sink accepts.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Concrete kind of this sink.
    pub fn kind(&self) -> SinkKind {
        self.target.kind()
    }

    /// Minimum accepted level.
    pub fn level(&self) -> Level {
        self.level
    }

    /// The underlying target.
    pub fn target(&self) -> &SinkTarget {
        &self.target
    }

    /// Destination descriptor for output path reporting.
    pub fn destination(&self) -> String {
        self.target.as_log_sink().destination()
    }

    /// Number of failed emits since the sink was created, including
    /// deliveries that failed in the background.
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed) + self.target.as_log_sink().failed_deliveries()
    }

    /// Emit a record if it passes this sink's level. Failures are counted,
    /// never returned.
    pub fn handle(&self, record: &LogRecord, line: &str) {
        if record.level < self.level {
            return;
        }
        if let Err(e) = self.target.as_log_sink().emit(record, line) {
            self.errors.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                sink = ?self.kind(),
                destination = %self.destination(),
                error = %e,
                "sink emit failed"
            );
        }
    }

    /// Flush buffered output.
    pub fn flush(&self) -> io::Result<()> {
        self.target.as_log_sink().flush()
    }

    /// Resolve the final file name and open file sinks.
    pub(crate) fn prepare(self, date_filename: bool, at: NaiveDateTime) -> io::Result<Self> {
        let Sink {
            target,
            level,
            errors,
        } = self;
        let target = match target {
            SinkTarget::File(file) => SinkTarget::File(file.open(date_filename, at)?),
            SinkTarget::Memory(memory) => SinkTarget::Memory(memory.prepare(date_filename, at)?),
            other => other,
        };
        Ok(Self {
            target,
            level,
            errors,
        })
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("kind", &self.kind())
            .field("destination", &self.destination())
            .field("level", &self.level)
            .finish()
    }
}
