//! Instance loggers.
//!
//! An [`InstanceLogger`] is a cheap handle to a shared registry entry plus
//! its own instance name. Every record it emits carries that name, so
//! several components can share one logger (and its sinks) while staying
//! distinguishable in the output.
//!
//! ```
//! use logwrap_core::{InstanceLogger, LoggerBuilder, MemoryBuffer, Registry, Sink};
//!
//! let registry = Registry::new();
//! let buffer = MemoryBuffer::new(16);
//! let db = LoggerBuilder::new("svc")
//!     .sink(Sink::memory(buffer.clone()))
//!     .instance_in(&registry, "db")
//!     .unwrap();
//! let api = InstanceLogger::with_entry(db.entry().clone(), "api");
//!
//! db.info("connected");
//! api.warning("slow request");
//!
//! let lines = buffer.lines();
//! assert!(lines[0].contains(":db:") && lines[0].ends_with("connected"));
//! assert!(lines[1].contains(":api:") && lines[1].ends_with("slow request"));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::config::LoggerConfig;
use crate::error::{LogWrapError, LogWrapResult};
use crate::level::Level;
use crate::record::CallSite;
use crate::registry::{LoggerSettings, Registry, RegistryEntry};
use crate::sink::{Sink, SinkKind};

/// A named handle onto a shared logger.
#[derive(Debug, Clone)]
pub struct InstanceLogger {
    entry: Arc<RegistryEntry>,
    instance: String,
}

impl InstanceLogger {
    /// Bind `instance` to the logger `name` in the process-wide registry,
    /// creating it with default settings and a console sink if needed.
    pub fn new(name: &str, instance: impl Into<String>) -> LogWrapResult<Self> {
        let entry = Registry::global().get_or_create(
            name,
            LoggerSettings::default(),
            vec![Sink::console()],
        )?;
        Ok(Self::with_entry(entry, instance))
    }

    /// Bind `instance` to an existing entry.
    pub fn with_entry(entry: Arc<RegistryEntry>, instance: impl Into<String>) -> Self {
        Self {
            entry,
            instance: instance.into(),
        }
    }

    /// Build from a configuration document. `instance_name` is required.
    pub fn from_config(config: &LoggerConfig) -> LogWrapResult<Self> {
        Self::from_config_in(Registry::global(), config)
    }

    /// Like [`from_config`](Self::from_config) against a specific registry.
    pub fn from_config_in(registry: &Registry, config: &LoggerConfig) -> LogWrapResult<Self> {
        let instance = config
            .instance_name
            .clone()
            .ok_or_else(|| LogWrapError::MissingInstanceName(config.name.clone()))?;
        let entry = config.clone().into_builder().build_in(registry)?;
        Ok(Self::with_entry(entry, instance))
    }

    /// Registry name of the shared logger.
    pub fn name(&self) -> &str {
        self.entry.name()
    }

    pub fn instance_name(&self) -> &str {
        &self.instance
    }

    /// Rename this handle. Other handles on the same entry are unaffected.
    pub fn set_instance_name(&mut self, instance: impl Into<String>) {
        self.instance = instance.into();
    }

    /// The shared entry.
    pub fn entry(&self) -> &Arc<RegistryEntry> {
        &self.entry
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        self.entry.is_enabled(level)
    }

    /// Emit with an explicit call site. Used by the `log_*!` macros.
    pub fn log_at(&self, level: Level, call_site: CallSite, message: impl fmt::Display) {
        if !self.entry.is_enabled(level) {
            return;
        }
        let record = self
            .entry
            .new_record(level, message.to_string())
            .with_instance(self.instance.as_str())
            .with_call_site(call_site);
        self.entry.emit(&record);
    }

    #[track_caller]
    pub fn log(&self, level: Level, message: impl fmt::Display) {
        self.log_at(level, CallSite::caller(), message);
    }

    #[track_caller]
    pub fn debug(&self, message: impl fmt::Display) {
        self.log(Level::Debug, message);
    }

    #[track_caller]
    pub fn info(&self, message: impl fmt::Display) {
        self.log(Level::Info, message);
    }

    #[track_caller]
    pub fn warning(&self, message: impl fmt::Display) {
        self.log(Level::Warning, message);
    }

    #[track_caller]
    pub fn error(&self, message: impl fmt::Display) {
        self.log(Level::Error, message);
    }

    #[track_caller]
    pub fn critical(&self, message: impl fmt::Display) {
        self.log(Level::Critical, message);
    }

    /// See [`RegistryEntry::output_paths`].
    pub fn output_paths(&self, kind: Option<SinkKind>) -> Vec<String> {
        self.entry.output_paths(kind)
    }

    /// See [`RegistryEntry::remove_sinks`].
    pub fn remove_sinks(&self, kind: Option<SinkKind>) -> usize {
        self.entry.remove_sinks(kind)
    }

    pub fn version(&self) -> &'static str {
        self.entry.version()
    }
}

/// Log through an [`InstanceLogger`] with format arguments, recording the
/// enclosing function name.
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log_at($crate::Level::Debug, $crate::__call_site!(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log_at($crate::Level::Info, $crate::__call_site!(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warning {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log_at($crate::Level::Warning, $crate::__call_site!(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log_at($crate::Level::Error, $crate::__call_site!(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_critical {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log_at($crate::Level::Critical, $crate::__call_site!(), format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::LoggerBuilder;
    use crate::sink::MemoryBuffer;

    fn logger(registry: &Registry, name: &str, instance: &str) -> (InstanceLogger, MemoryBuffer) {
        let buffer = MemoryBuffer::new(64);
        let logger = LoggerBuilder::new(name)
            .sink(Sink::memory(buffer.clone()))
            .instance_in(registry, instance)
            .unwrap();
        (logger, buffer)
    }

    #[test]
    fn test_records_carry_instance_and_call_site() {
        let registry = Registry::new();
        let (log, buffer) = logger(&registry, "svc", "worker");

        log.info("hello");

        let record = &buffer.records()[0];
        assert_eq!(record.instance.as_deref(), Some("worker"));
        let site = record.call_site.unwrap();
        assert_eq!(site.module, "facade");
        assert_eq!(site.function, "?");
        let line = &buffer.lines()[0];
        assert!(line.contains(",[INFO:pid="));
        assert!(line.contains(":worker:facade:?:"));
        assert!(line.ends_with("],hello"));
    }

    #[test]
    fn test_each_severity_method() {
        let registry = Registry::new();
        let (log, buffer) = logger(&registry, "levels", "x");

        log.debug("d");
        log.info("i");
        log.warning("w");
        log.error("e");
        log.critical("c");

        let levels: Vec<Level> = buffer.records().iter().map(|r| r.level).collect();
        assert_eq!(levels, Level::ALL.to_vec());
    }

    #[test]
    fn test_set_instance_name_only_affects_own_handle() {
        let registry = Registry::new();
        let (mut first, buffer) = logger(&registry, "shared", "alpha");
        let second = InstanceLogger::with_entry(first.entry().clone(), "beta");

        first.set_instance_name("gamma");
        first.info("one");
        second.info("two");

        let instances: Vec<String> = buffer
            .records()
            .into_iter()
            .filter_map(|r| r.instance)
            .collect();
        assert_eq!(instances, vec!["gamma".to_string(), "beta".to_string()]);
    }

    #[test]
    fn test_macros_record_function_name() {
        let registry = Registry::new();
        let (log, buffer) = logger(&registry, "macros", "m");

        crate::log_warning!(log, "retry {} of {}", 2, 5);

        let record = &buffer.records()[0];
        assert_eq!(record.message, "retry 2 of 5");
        assert_eq!(record.level, Level::Warning);
        assert_eq!(
            record.call_site.unwrap().function,
            "test_macros_record_function_name"
        );
    }

    #[test]
    fn test_below_level_is_dropped() {
        let registry = Registry::new();
        let (log, buffer) = logger(&registry, "quiet", "q");
        log.entry().set_level(Level::Error);

        log.warning("ignored");
        assert!(buffer.is_empty());
        assert!(!log.is_enabled(Level::Warning));
    }

    #[test]
    fn test_from_config_requires_instance() {
        let registry = Registry::new();
        let config = LoggerConfig {
            name: "cfg".to_string(),
            ..LoggerConfig::default()
        };
        let err = InstanceLogger::from_config_in(&registry, &config).unwrap_err();
        assert!(matches!(err, LogWrapError::MissingInstanceName(name) if name == "cfg"));
        assert!(!registry.contains("cfg"));
    }
}
