//! Syslog sink.
//!
//! Messages are sent as `<PRI>line` where PRI is `facility * 8 + severity`.
//! Unix datagrams are NUL-terminated, TCP messages are newline-framed and
//! UDP datagrams carry the bare message. The connection is opened on the
//! first record and re-opened after a failed write.

use std::fmt;
use std::io::{self, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs, UdpSocket};
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{connect_tcp, LogSink, CONNECT_TIMEOUT};
use crate::record::LogRecord;

/// Where syslog messages are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport", content = "address", rename_all = "lowercase")]
pub enum SyslogAddress {
    /// Local daemon socket such as `/dev/log`
    Unix(PathBuf),
    /// `host:port` over UDP
    Udp(String),
    /// `host:port` over TCP
    Tcp(String),
}

impl Default for SyslogAddress {
    fn default() -> Self {
        SyslogAddress::Udp("localhost:514".to_string())
    }
}

impl fmt::Display for SyslogAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyslogAddress::Unix(path) => write!(f, "{}", path.display()),
            SyslogAddress::Udp(addr) | SyslogAddress::Tcp(addr) => f.write_str(addr),
        }
    }
}

/// Syslog facility (RFC 5424).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facility {
    Kernel,
    #[default]
    User,
    Mail,
    Daemon,
    Auth,
    Syslog,
    Local0,
    Local1,
    Local2,
    Local3,
    Local4,
    Local5,
    Local6,
    Local7,
}

impl Facility {
    /// Numeric facility code.
    pub fn code(self) -> u8 {
        match self {
            Facility::Kernel => 0,
            Facility::User => 1,
            Facility::Mail => 2,
            Facility::Daemon => 3,
            Facility::Auth => 4,
            Facility::Syslog => 5,
            Facility::Local0 => 16,
            Facility::Local1 => 17,
            Facility::Local2 => 18,
            Facility::Local3 => 19,
            Facility::Local4 => 20,
            Facility::Local5 => 21,
            Facility::Local6 => 22,
            Facility::Local7 => 23,
        }
    }
}

enum Connection {
    #[cfg(unix)]
    Datagram(std::os::unix::net::UnixDatagram),
    Udp(UdpSocket),
    Tcp(BufWriter<TcpStream>),
}

impl Connection {
    fn open(address: &SyslogAddress) -> io::Result<Self> {
        match address {
            #[cfg(unix)]
            SyslogAddress::Unix(path) => {
                let socket = std::os::unix::net::UnixDatagram::unbound()?;
                socket.connect(path)?;
                Ok(Connection::Datagram(socket))
            }
            #[cfg(not(unix))]
            SyslogAddress::Unix(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "unix syslog sockets are not available on this platform",
            )),
            SyslogAddress::Udp(addr) => {
                let remote = addr.to_socket_addrs()?.next().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::AddrNotAvailable, addr.clone())
                })?;
                let local = if remote.is_ipv4() {
                    "0.0.0.0:0"
                } else {
                    "[::]:0"
                };
                let socket = UdpSocket::bind(local)?;
                socket.connect(remote)?;
                Ok(Connection::Udp(socket))
            }
            SyslogAddress::Tcp(addr) => {
                let stream = connect_tcp(addr, CONNECT_TIMEOUT)?;
                Ok(Connection::Tcp(BufWriter::new(stream)))
            }
        }
    }

    fn send(&mut self, message: &str) -> io::Result<()> {
        match self {
            #[cfg(unix)]
            Connection::Datagram(socket) => {
                let mut payload = Vec::with_capacity(message.len() + 1);
                payload.extend_from_slice(message.as_bytes());
                payload.push(0);
                socket.send(&payload).map(|_| ())
            }
            Connection::Udp(socket) => socket.send(message.as_bytes()).map(|_| ()),
            Connection::Tcp(writer) => {
                writer.write_all(message.as_bytes())?;
                writer.write_all(b"\n")?;
                writer.flush()
            }
        }
    }
}

/// Forwards records to a syslog daemon.
pub struct SyslogSink {
    address: SyslogAddress,
    facility: Facility,
    connection: Mutex<Option<Connection>>,
}

impl SyslogSink {
    pub fn new(address: SyslogAddress, facility: Facility) -> Self {
        Self {
            address,
            facility,
            connection: Mutex::new(None),
        }
    }

    pub fn address(&self) -> &SyslogAddress {
        &self.address
    }

    pub fn facility(&self) -> Facility {
        self.facility
    }

    /// `<PRI>line` for a record.
    pub fn encode(&self, record: &LogRecord, line: &str) -> String {
        let priority =
            u16::from(self.facility.code()) * 8 + u16::from(record.level.syslog_severity());
        format!("<{}>{}", priority, line)
    }
}

impl LogSink for SyslogSink {
    fn emit(&self, record: &LogRecord, line: &str) -> io::Result<()> {
        let message = self.encode(record, line);
        let mut guard = self.connection.lock();
        if guard.is_none() {
            *guard = Some(Connection::open(&self.address)?);
        }
        let result = match guard.as_mut() {
            Some(connection) => connection.send(&message),
            None => Ok(()),
        };
        if result.is_err() {
            *guard = None;
        }
        result
    }

    fn flush(&self) -> io::Result<()> {
        match self.connection.lock().as_mut() {
            Some(Connection::Tcp(writer)) => writer.flush(),
            _ => Ok(()),
        }
    }

    fn destination(&self) -> String {
        self.address.to_string()
    }
}
