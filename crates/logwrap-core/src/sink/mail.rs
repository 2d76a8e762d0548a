//! Mail sink.
//!
//! Sends one message per record over a plain SMTP session:
//!
//! ```text
//! HELO → MAIL FROM → RCPT TO (each) → DATA → body → . → QUIT
//! ```

use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{connect_tcp, LogSink};
use crate::record::LogRecord;

fn default_timeout_secs() -> u64 {
    5
}

fn default_subject() -> String {
    "Log record".to_string()
}

/// SMTP delivery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailSettings {
    /// `host:port` of the SMTP server
    pub mailhost: String,
    /// Envelope and header sender
    pub from: String,
    /// Recipients
    pub to: Vec<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl MailSettings {
    pub fn new(mailhost: impl Into<String>, from: impl Into<String>, to: Vec<String>) -> Self {
        Self {
            mailhost: mailhost.into(),
            from: from.into(),
            to,
            subject: default_subject(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }
}

/// Mails each record to a fixed recipient list.
pub struct MailSink {
    settings: MailSettings,
}

impl MailSink {
    pub fn new(settings: MailSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MailSettings {
        &self.settings
    }

    fn send(&self, record: &LogRecord, line: &str) -> io::Result<()> {
        let timeout = Duration::from_secs(self.settings.timeout_secs.max(1));
        let stream = connect_tcp(&self.settings.mailhost, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let mut session = SmtpSession {
            reader: BufReader::new(stream.try_clone()?),
            writer: stream,
        };

        session.expect(&[220])?;
        session.command("HELO localhost", &[250])?;
        session.command(&format!("MAIL FROM:<{}>", self.settings.from), &[250])?;
        for recipient in &self.settings.to {
            session.command(&format!("RCPT TO:<{}>", recipient), &[250, 251])?;
        }
        session.command("DATA", &[354])?;

        let mut message = format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\n\r\n",
            self.settings.from,
            self.settings.to.join(","),
            self.settings.subject,
            record.timestamp.to_rfc2822(),
        );
        for body_line in line.lines() {
            // Dot-stuffing per RFC 5321 4.5.2
            if body_line.starts_with('.') {
                message.push('.');
            }
            message.push_str(body_line);
            message.push_str("\r\n");
        }
        message.push_str(".\r\n");
        session.writer.write_all(message.as_bytes())?;
        session.writer.flush()?;
        session.expect(&[250])?;

        session.command("QUIT", &[221])
    }
}

struct SmtpSession {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl SmtpSession {
    fn command(&mut self, command: &str, accepted: &[u16]) -> io::Result<()> {
        self.writer.write_all(command.as_bytes())?;
        self.writer.write_all(b"\r\n")?;
        self.writer.flush()?;
        self.expect(accepted)
    }

    /// Read a (possibly multi-line) reply and check its code.
    fn expect(&mut self, accepted: &[u16]) -> io::Result<()> {
        loop {
            let mut reply = String::new();
            if self.reader.read_line(&mut reply)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "SMTP server closed the connection",
                ));
            }
            let code: u16 = reply
                .get(..3)
                .and_then(|c| c.parse().ok())
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("bad reply: {}", reply.trim_end()),
                    )
                })?;
            if reply.as_bytes().get(3) == Some(&b'-') {
                continue;
            }
            if accepted.contains(&code) {
                return Ok(());
            }
            return Err(io::Error::other(format!(
                "SMTP server rejected command: {}",
                reply.trim_end()
            )));
        }
    }
}

impl LogSink for MailSink {
    fn emit(&self, record: &LogRecord, line: &str) -> io::Result<()> {
        self.send(record, line)
    }

    fn destination(&self) -> String {
        self.settings.to.join(",")
    }
}
