//! HTTP sink.
//!
//! Sends the record fields as a query string (GET) or a form body (POST).
//! Requests run on a dedicated worker thread that owns a blocking client,
//! so logging from inside an async runtime never blocks on, or nests, the
//! client's own runtime. Failed deliveries are counted on the sink.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::LogSink;
use crate::record::LogRecord;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `flush` waits for queued requests to drain.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
}

enum Job {
    Deliver(Vec<(&'static str, String)>),
    Flush(std_mpsc::SyncSender<()>),
}

/// Delivers each record to an HTTP endpoint.
pub struct HttpSink {
    url: String,
    method: HttpMethod,
    worker: Mutex<Option<UnboundedSender<Job>>>,
    failures: Arc<AtomicU64>,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            url: url.into(),
            method,
            worker: Mutex::new(None),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Requests that failed on the worker thread.
    pub fn failed_requests(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Sender for the worker, spawning it on first use or after it died.
    fn sender(&self) -> io::Result<UnboundedSender<Job>> {
        let mut guard = self.worker.lock();
        if let Some(sender) = guard.as_ref().filter(|sender| !sender.is_closed()) {
            return Ok(sender.clone());
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = Worker {
            url: self.url.clone(),
            method: self.method,
            failures: self.failures.clone(),
        };
        std::thread::Builder::new()
            .name("logwrap-http".to_string())
            .spawn(move || worker.run(receiver))?;
        *guard = Some(sender.clone());
        Ok(sender)
    }
}

struct Worker {
    url: String,
    method: HttpMethod,
    failures: Arc<AtomicU64>,
}

impl Worker {
    fn run(self, mut jobs: UnboundedReceiver<Job>) {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build();
        if let Err(e) = &client {
            tracing::debug!(url = %self.url, error = %e, "failed to create HTTP client");
        }

        while let Some(job) = jobs.blocking_recv() {
            match job {
                Job::Deliver(fields) => {
                    let result = match &client {
                        Ok(client) => self.deliver(client, &fields),
                        Err(e) => Err(io::Error::other(e.to_string())),
                    };
                    if let Err(e) = result {
                        self.failures.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(url = %self.url, error = %e, "HTTP delivery failed");
                    }
                }
                Job::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
    }

    fn deliver(
        &self,
        client: &reqwest::blocking::Client,
        fields: &[(&'static str, String)],
    ) -> io::Result<()> {
        let request = match self.method {
            HttpMethod::Get => client.get(&self.url).query(fields),
            HttpMethod::Post => client.post(&self.url).form(fields),
        };
        let response = request
            .send()
            .map_err(|e| io::Error::other(format!("Request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(io::Error::other(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }
        Ok(())
    }
}

/// Name/value pairs sent for a record.
pub(crate) fn record_fields(record: &LogRecord, line: &str) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("name", record.logger.clone()),
        ("levelname", record.level.as_str().to_string()),
        ("created", record.timestamp.to_rfc3339()),
        ("process", record.pid.to_string()),
        ("thread", record.thread.clone()),
        ("message", record.message.clone()),
        ("formatted", line.to_string()),
    ];
    if let Some(app_name) = &record.app_name {
        fields.push(("app", app_name.clone()));
    }
    if let Some(instance) = &record.instance {
        fields.push(("instance", instance.clone()));
    }
    if let Some(site) = &record.call_site {
        fields.push(("module", site.module.to_string()));
        fields.push(("function", site.function.to_string()));
        fields.push(("lineno", site.line.to_string()));
    }
    fields
}

impl LogSink for HttpSink {
    fn emit(&self, record: &LogRecord, line: &str) -> io::Result<()> {
        let fields = record_fields(record, line);
        self.sender()?
            .send(Job::Deliver(fields))
            .map_err(|_| io::Error::other("HTTP worker stopped"))
    }

    /// Wait until every queued request has been attempted.
    fn flush(&self) -> io::Result<()> {
        let Some(sender) = self.worker.lock().clone() else {
            return Ok(());
        };
        let (done, drained) = std_mpsc::sync_channel(1);
        if sender.send(Job::Flush(done)).is_err() {
            return Ok(());
        }
        drained.recv_timeout(FLUSH_TIMEOUT).map_err(|_| {
            io::Error::new(io::ErrorKind::TimedOut, "HTTP worker did not drain")
        })
    }

    fn failed_deliveries(&self) -> u64 {
        self.failed_requests()
    }

    fn destination(&self) -> String {
        self.url.clone()
    }
}
