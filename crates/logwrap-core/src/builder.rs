//! Fluent construction of registered loggers.

use std::sync::Arc;

use crate::error::LogWrapResult;
use crate::facade::InstanceLogger;
use crate::level::Level;
use crate::registry::{LoggerSettings, Registry, RegistryEntry, DEFAULT_LOGGER_NAME};
use crate::sink::Sink;

/// Builder for a named logger.
///
/// Without any [`sink`](Self::sink) call the logger gets a single console
/// sink writing to stderr.
pub struct LoggerBuilder {
    name: String,
    settings: LoggerSettings,
    sinks: Option<Vec<Sink>>,
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_LOGGER_NAME)
    }
}

impl LoggerBuilder {
    /// Create a builder for the logger registered under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: LoggerSettings::default(),
            sinks: None,
        }
    }

    /// Label rendered after the timestamp.
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.settings.app_name = Some(app_name.into());
        self
    }

    /// Minimum level (default: debug).
    pub fn level(mut self, level: Level) -> Self {
        self.settings.level = level;
        self
    }

    /// Include pid, thread and call-site fields (default: on).
    pub fn meta(mut self, meta: bool) -> Self {
        self.settings.meta = meta;
        self
    }

    /// Suffix file sink names with the capture time (default: on).
    pub fn date_filename(mut self, date_filename: bool) -> Self {
        self.settings.date_filename = date_filename;
        self
    }

    /// Render instance names (default: on).
    pub fn instance_label(mut self, instance_label: bool) -> Self {
        self.settings.instance_label = instance_label;
        self
    }

    /// Replace all settings at once.
    pub fn settings(mut self, settings: LoggerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Attach a sink. Sinks keep the order they were added in.
    pub fn sink(mut self, sink: Sink) -> Self {
        self.sinks.get_or_insert_with(Vec::new).push(sink);
        self
    }

    /// Start without any sinks instead of the default console sink.
    pub fn no_sinks(mut self) -> Self {
        self.sinks = Some(Vec::new());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn into_parts(self) -> (String, LoggerSettings, Vec<Sink>) {
        let sinks = self.sinks.unwrap_or_else(|| vec![Sink::console()]);
        (self.name, self.settings, sinks)
    }

    /// Register in (or fetch from) the process-wide registry.
    pub fn build(self) -> LogWrapResult<Arc<RegistryEntry>> {
        self.build_in(Registry::global())
    }

    /// Register in (or fetch from) a specific registry.
    pub fn build_in(self, registry: &Registry) -> LogWrapResult<Arc<RegistryEntry>> {
        let (name, settings, sinks) = self.into_parts();
        registry.get_or_create(&name, settings, sinks)
    }

    /// Register in a specific registry, failing if the name is taken.
    pub fn register_in(self, registry: &Registry) -> LogWrapResult<Arc<RegistryEntry>> {
        let (name, settings, sinks) = self.into_parts();
        registry.register(&name, settings, sinks)
    }

    /// Build in the process-wide registry and bind an instance name.
    pub fn instance(self, instance: impl Into<String>) -> LogWrapResult<InstanceLogger> {
        Ok(InstanceLogger::with_entry(self.build()?, instance))
    }

    /// Build in `registry` and bind an instance name.
    pub fn instance_in(
        self,
        registry: &Registry,
        instance: impl Into<String>,
    ) -> LogWrapResult<InstanceLogger> {
        Ok(InstanceLogger::with_entry(self.build_in(registry)?, instance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemoryBuffer, SinkKind};

    #[test]
    fn test_default_sink_is_console() {
        let registry = Registry::new();
        let entry = LoggerBuilder::new("defaults").build_in(&registry).unwrap();
        assert_eq!(entry.output_paths(None), vec!["<stderr>".to_string()]);
        assert_eq!(entry.settings(), &LoggerSettings::default());
    }

    #[test]
    fn test_no_sinks() {
        let registry = Registry::new();
        let entry = LoggerBuilder::new("silent")
            .no_sinks()
            .build_in(&registry)
            .unwrap();
        assert_eq!(entry.sink_count(), 0);
    }

    #[test]
    fn test_settings_flow_into_entry() {
        let registry = Registry::new();
        let buffer = MemoryBuffer::new(4);
        let entry = LoggerBuilder::new("tuned")
            .app_name("billing")
            .level(Level::Warning)
            .meta(false)
            .sink(Sink::memory(buffer.clone()))
            .build_in(&registry)
            .unwrap();

        assert_eq!(entry.level(), Level::Warning);
        assert_eq!(entry.sink_kinds(), vec![SinkKind::Memory]);
        assert_eq!(
            entry.formatter().template(),
            "{asctime},{app},{level},{instance},{message}"
        );

        entry.log(Level::Error, "declined");
        // No instance on a plain entry record: minimal fallback
        assert!(buffer.lines()[0].ends_with(",ERROR,declined"));
    }

    #[test]
    fn test_instance_in() {
        let registry = Registry::new();
        let logger = LoggerBuilder::new("bound")
            .no_sinks()
            .instance_in(&registry, "api")
            .unwrap();
        assert_eq!(logger.instance_name(), "api");
        assert_eq!(logger.name(), "bound");
    }
}
