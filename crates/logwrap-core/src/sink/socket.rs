//! Network socket sink.
//!
//! Each record is serialized as JSON and framed with a 4-byte big-endian
//! length prefix, so a receiver can split the stream without scanning for
//! delimiters.

use std::io::{self, Write};
use std::net::TcpStream;
use std::time::Duration;

use parking_lot::Mutex;

use super::{connect_tcp, LogSink, CONNECT_TIMEOUT};
use crate::record::LogRecord;

const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Streams records to a TCP listener.
pub struct SocketSink {
    address: String,
    stream: Mutex<Option<TcpStream>>,
}

impl SocketSink {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            stream: Mutex::new(None),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn connect(&self) -> io::Result<TcpStream> {
        let stream = connect_tcp(&self.address, CONNECT_TIMEOUT)?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// Length-prefixed JSON frame for a record.
pub(crate) fn encode_frame(record: &LogRecord) -> io::Result<Vec<u8>> {
    let json = record
        .to_json()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(json.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "record too large"))?;

    let mut frame = Vec::with_capacity(4 + json.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(json.as_bytes());
    Ok(frame)
}

impl LogSink for SocketSink {
    fn emit(&self, record: &LogRecord, _line: &str) -> io::Result<()> {
        let frame = encode_frame(record)?;
        let mut guard = self.stream.lock();
        if guard.is_none() {
            *guard = Some(self.connect()?);
        }
        let result = match guard.as_mut() {
            Some(stream) => stream.write_all(&frame),
            None => Ok(()),
        };
        // Reconnect on the next record
        if result.is_err() {
            *guard = None;
        }
        result
    }

    fn flush(&self) -> io::Result<()> {
        match self.stream.lock().as_mut() {
            Some(stream) => stream.flush(),
            None => Ok(()),
        }
    }

    fn destination(&self) -> String {
        self.address.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use std::io::Read;
    use std::net::TcpListener;

    #[test]
    fn test_frame_layout() {
        let record = LogRecord::new("svc", Level::Info, "hello").with_instance("api");
        let frame = encode_frame(&record).unwrap();

        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);
        let body: serde_json::Value = serde_json::from_slice(&frame[4..]).unwrap();
        assert_eq!(body["message"], "hello");
        assert_eq!(body["instance"], "api");
    }

    #[test]
    fn test_delivers_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let reader = std::thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut len = [0u8; 4];
            conn.read_exact(&mut len).unwrap();
            let mut body = vec![0u8; u32::from_be_bytes(len) as usize];
            conn.read_exact(&mut body).unwrap();
            serde_json::from_slice::<serde_json::Value>(&body).unwrap()
        });

        let sink = SocketSink::new(&addr);
        let record = LogRecord::new("svc", Level::Error, "failed").with_instance("db");
        sink.emit(&record, "ignored").unwrap();

        let body = reader.join().unwrap();
        assert_eq!(body["message"], "failed");
        assert_eq!(body["level"], "error");
        assert_eq!(body["logger"], "svc");
    }
}
