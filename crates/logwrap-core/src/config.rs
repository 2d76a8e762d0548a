//! JSON configuration.
//!
//! ```json
//! {
//!   "name": "svc",
//!   "app_name": "billing",
//!   "instance_name": "worker-1",
//!   "level": "info",
//!   "meta": true,
//!   "date_filename": false,
//!   "sinks": [
//!     { "kind": "console" },
//!     { "kind": "file", "path": "/var/log/billing/app.log" },
//!     { "kind": "syslog", "address": { "transport": "unix", "address": "/dev/log" } }
//!   ]
//! }
//! ```
//!
//! Every field is optional. Sinks with an unknown `kind` or with fields
//! that do not parse are skipped.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::builder::LoggerBuilder;
use crate::error::LogWrapResult;
use crate::level::Level;
use crate::registry::{LoggerSettings, DEFAULT_LOGGER_NAME};
use crate::sink::{
    ConsoleStream, Facility, FileMode, HttpMethod, MailSettings, MemoryBuffer, Sink,
    SyslogAddress, DEFAULT_MEMORY_CAPACITY,
};

fn default_memory_capacity() -> usize {
    DEFAULT_MEMORY_CAPACITY
}

fn default_flush_level() -> Level {
    Level::Error
}

/// Parse each sink entry on its own so one bad entry only drops itself.
fn deserialize_sinks<'de, D>(deserializer: D) -> Result<Vec<SinkConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .map(|entry| {
            serde_json::from_value(entry).unwrap_or_else(|e| {
                tracing::debug!(error = %e, "skipping malformed sink");
                SinkConfig::Unsupported
            })
        })
        .collect())
}

/// Declarative description of one sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkConfig {
    Console {
        #[serde(default)]
        stream: ConsoleStream,
    },
    File {
        path: PathBuf,
        #[serde(default)]
        mode: FileMode,
    },
    Syslog {
        #[serde(default)]
        address: SyslogAddress,
        #[serde(default)]
        facility: Facility,
    },
    Socket {
        address: String,
    },
    Mail(MailSettings),
    Memory {
        #[serde(default = "default_memory_capacity")]
        capacity: usize,
        #[serde(default = "default_flush_level")]
        flush_level: Level,
        #[serde(default)]
        target: Option<Box<SinkConfig>>,
    },
    Http {
        url: String,
        #[serde(default)]
        method: HttpMethod,
    },
    /// Any kind this version does not know how to build
    #[serde(other)]
    Unsupported,
}

impl SinkConfig {
    /// Build the runtime sink, or `None` for unsupported kinds.
    pub fn build(&self) -> Option<Sink> {
        let sink = match self {
            SinkConfig::Console {
                stream: ConsoleStream::Stderr,
            } => Sink::console(),
            SinkConfig::Console {
                stream: ConsoleStream::Stdout,
            } => Sink::stdout(),
            SinkConfig::File { path, mode } => Sink::file_with_mode(path.clone(), *mode),
            SinkConfig::Syslog { address, facility } => {
                Sink::syslog_with_facility(address.clone(), *facility)
            }
            SinkConfig::Socket { address } => Sink::socket(address.clone()),
            SinkConfig::Mail(settings) => Sink::mail(settings.clone()),
            SinkConfig::Memory {
                capacity,
                flush_level,
                target,
            } => {
                let buffer = MemoryBuffer::new(*capacity);
                match target.as_deref().and_then(SinkConfig::build) {
                    Some(target) => Sink::memory_with_target(buffer, *flush_level, target),
                    None => Sink::memory(buffer),
                }
            }
            SinkConfig::Http { url, method } => Sink::http(url.clone(), *method),
            SinkConfig::Unsupported => return None,
        };
        Some(sink)
    }
}

/// Full logger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Registry key
    pub name: String,
    #[serde(alias = "appName")]
    pub app_name: Option<String>,
    /// Instance label for [`InstanceLogger::from_config`](crate::InstanceLogger::from_config)
    #[serde(alias = "instanceName")]
    pub instance_name: Option<String>,
    pub level: Level,
    pub meta: bool,
    #[serde(alias = "dateFilename")]
    pub date_filename: bool,
    #[serde(alias = "instanceLabel")]
    pub instance_label: bool,
    #[serde(deserialize_with = "deserialize_sinks")]
    pub sinks: Vec<SinkConfig>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let settings = LoggerSettings::default();
        Self {
            name: DEFAULT_LOGGER_NAME.to_string(),
            app_name: settings.app_name,
            instance_name: None,
            level: settings.level,
            meta: settings.meta,
            date_filename: settings.date_filename,
            instance_label: settings.instance_label,
            sinks: vec![SinkConfig::Console {
                stream: ConsoleStream::Stderr,
            }],
        }
    }
}

impl LoggerConfig {
    pub fn from_json_str(json: &str) -> LogWrapResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> LogWrapResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// The registry settings described by this config.
    pub fn settings(&self) -> LoggerSettings {
        LoggerSettings {
            level: self.level,
            meta: self.meta,
            date_filename: self.date_filename,
            app_name: self.app_name.clone(),
            instance_label: self.instance_label,
        }
    }

    /// Turn the config into a builder, dropping unsupported sinks.
    pub fn into_builder(self) -> LoggerBuilder {
        let mut builder = LoggerBuilder::new(&self.name)
            .settings(self.settings())
            .no_sinks();
        for sink_config in &self.sinks {
            match sink_config.build() {
                Some(sink) => builder = builder.sink(sink),
                None => tracing::debug!(logger = %self.name, "skipping unsupported sink"),
            }
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::sink::SinkKind;

    #[test]
    fn test_defaults() {
        let config = LoggerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, LoggerConfig::default());
        assert_eq!(config.name, "root");
        assert_eq!(config.level, Level::Debug);
        assert!(config.meta);
        assert!(config.date_filename);
    }

    #[test]
    fn test_parse_full_document() {
        let config = LoggerConfig::from_json_str(
            r#"{
                "name": "svc",
                "appName": "billing",
                "instance_name": "worker-1",
                "level": "warning",
                "meta": false,
                "dateFilename": false,
                "sinks": [
                    { "kind": "console", "stream": "stdout" },
                    { "kind": "file", "path": "/tmp/svc.log", "mode": "truncate" },
                    { "kind": "syslog", "address": { "transport": "unix", "address": "/dev/log" }, "facility": "local3" },
                    { "kind": "mail", "mailhost": "smtp:25", "from": "a@x", "to": ["b@x"] },
                    { "kind": "memory", "capacity": 8, "target": { "kind": "console" } },
                    { "kind": "http", "url": "http://collector/logs", "method": "GET" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.app_name.as_deref(), Some("billing"));
        assert_eq!(config.instance_name.as_deref(), Some("worker-1"));
        assert_eq!(config.level, Level::Warning);
        assert!(!config.date_filename);
        assert_eq!(config.sinks.len(), 6);
        assert_eq!(
            config.sinks[2],
            SinkConfig::Syslog {
                address: SyslogAddress::Unix(PathBuf::from("/dev/log")),
                facility: Facility::Local3,
            }
        );
        match &config.sinks[3] {
            SinkConfig::Mail(mail) => {
                assert_eq!(mail.subject, "Log record");
                assert_eq!(mail.timeout_secs, 5);
            }
            other => panic!("expected mail sink, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_sink_kind_is_skipped() {
        let config = LoggerConfig::from_json_str(
            r#"{
                "name": "skip",
                "sinks": [
                    { "kind": "carrier-pigeon", "loft": "north" },
                    { "kind": "memory" },
                    { "kind": "console" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.sinks[0], SinkConfig::Unsupported);

        let registry = Registry::new();
        let entry = config.into_builder().build_in(&registry).unwrap();
        assert_eq!(entry.sink_kinds(), vec![SinkKind::Memory, SinkKind::Console]);
    }

    #[test]
    fn test_malformed_sink_is_skipped() {
        let config = LoggerConfig::from_json_str(
            r#"{
                "name": "malformed",
                "sinks": [
                    { "kind": "file" },
                    { "kind": "syslog", "facility": "local9" },
                    "console",
                    { "kind": "console" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.sinks.len(), 4);
        assert!(config.sinks[..3]
            .iter()
            .all(|sink| *sink == SinkConfig::Unsupported));

        let registry = Registry::new();
        let entry = config.into_builder().build_in(&registry).unwrap();
        assert_eq!(entry.sink_kinds(), vec![SinkKind::Console]);
    }

    #[test]
    fn test_sinks_must_be_a_list() {
        assert!(LoggerConfig::from_json_str(r#"{ "sinks": "console" }"#).is_err());
    }

    #[test]
    fn test_from_json_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("logging.json");
        std::fs::write(&path, r#"{ "name": "from-file", "level": "error" }"#).unwrap();

        let config = LoggerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.name, "from-file");
        assert_eq!(config.settings().level, Level::Error);

        assert!(LoggerConfig::from_json_file(temp.path().join("missing.json")).is_err());
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            LoggerConfig::from_json_file(&path),
            Err(crate::error::LogWrapError::Config(_))
        ));
    }
}
