//! Named logger registry.
//!
//! Every logger name maps to exactly one [`RegistryEntry`] for the life of
//! the registry. The first caller to ask for a name configures it; later
//! callers get the same entry back. When a later caller passes settings
//! that differ from the registered ones the entry is still returned and a
//! warning is logged ("first writer wins"). Use [`Registry::register`] to
//! get a [`LogWrapError::ConfigConflict`] instead.
//!
//! The registry lock only guards the map. Sink preparation (directory
//! creation, opening files) runs before the lock is taken, so a slow disk
//! never blocks lookups of other names.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::Local;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{LogWrapError, LogWrapResult};
use crate::format::Formatter;
use crate::level::Level;
use crate::record::LogRecord;
use crate::sink::{Sink, SinkKind};

/// Crate version reported by [`RegistryEntry::version`].
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name used when none is given.
pub const DEFAULT_LOGGER_NAME: &str = "root";

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Settings fixed when a logger name is first registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Minimum level at creation time
    pub level: Level,
    /// Include pid, thread and call-site fields
    pub meta: bool,
    /// Suffix file sink names with the capture time
    pub date_filename: bool,
    /// Application label rendered after the timestamp
    pub app_name: Option<String>,
    /// Render the instance name of each record
    pub instance_label: bool,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: Level::Debug,
            meta: true,
            date_filename: true,
            app_name: None,
            instance_label: true,
        }
    }
}

impl LoggerSettings {
    /// The formatter these settings produce.
    pub fn formatter(&self) -> Formatter {
        Formatter::standard(self.meta, self.app_name.is_some(), self.instance_label)
    }
}

/// Shared configuration for one logger name: level, formatter and sinks.
pub struct RegistryEntry {
    name: String,
    settings: LoggerSettings,
    level: RwLock<Level>,
    formatter: RwLock<Formatter>,
    sinks: RwLock<Vec<Sink>>,
}

impl RegistryEntry {
    /// Prepare sinks and build an entry that is not registered anywhere.
    pub fn build(
        name: impl Into<String>,
        settings: LoggerSettings,
        sinks: Vec<Sink>,
    ) -> LogWrapResult<Self> {
        let captured_at = Local::now().naive_local();
        let sinks = sinks
            .into_iter()
            .map(|sink| sink.prepare(settings.date_filename, captured_at))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.into(),
            level: RwLock::new(settings.level),
            formatter: RwLock::new(settings.formatter()),
            settings,
            sinks: RwLock::new(sinks),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Settings the entry was created with.
    pub fn settings(&self) -> &LoggerSettings {
        &self.settings
    }

    pub fn level(&self) -> Level {
        *self.level.read()
    }

    pub fn set_level(&self, level: Level) {
        *self.level.write() = level;
    }

    /// True if a record at `level` would be emitted.
    pub fn is_enabled(&self, level: Level) -> bool {
        level >= self.level()
    }

    pub fn formatter(&self) -> Formatter {
        self.formatter.read().clone()
    }

    /// Replace the line template for every sink.
    pub fn set_format(&self, template: &str) -> LogWrapResult<()> {
        let formatter = Formatter::parse(template)?;
        *self.formatter.write() = formatter;
        Ok(())
    }

    /// Go back to the template derived from the creation settings.
    pub fn reset_format(&self) {
        *self.formatter.write() = self.settings.formatter();
    }

    /// Attach another sink, applying the date suffix rule to file sinks.
    pub fn add_sink(&self, sink: Sink) -> LogWrapResult<()> {
        let sink = sink.prepare(self.settings.date_filename, Local::now().naive_local())?;
        self.sinks.write().push(sink);
        Ok(())
    }

    /// Destination descriptors in attachment order, optionally limited to
    /// sinks selected by `kind`.
    pub fn output_paths(&self, kind: Option<SinkKind>) -> Vec<String> {
        let kind = kind.unwrap_or(SinkKind::Any);
        self.sinks
            .read()
            .iter()
            .filter(|sink| kind.includes(sink.kind()))
            .map(Sink::destination)
            .collect()
    }

    /// Detach every sink selected by `kind`. `None` removes nothing.
    ///
    /// Returns the number of sinks removed.
    pub fn remove_sinks(&self, kind: Option<SinkKind>) -> usize {
        let Some(kind) = kind else {
            return 0;
        };
        let removed: Vec<Sink> = {
            let mut sinks = self.sinks.write();
            let (removed, kept): (Vec<Sink>, Vec<Sink>) = std::mem::take(&mut *sinks)
                .into_iter()
                .partition(|sink| kind.includes(sink.kind()));
            *sinks = kept;
            removed
        };
        for sink in &removed {
            let _ = sink.flush();
        }
        if !removed.is_empty() {
            tracing::debug!(logger = %self.name, ?kind, count = removed.len(), "removed sinks");
        }
        removed.len()
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.read().len()
    }

    /// Concrete kinds of the attached sinks, in attachment order.
    pub fn sink_kinds(&self) -> Vec<SinkKind> {
        self.sinks.read().iter().map(Sink::kind).collect()
    }

    /// Total failed emits across the attached sinks.
    pub fn error_count(&self) -> u64 {
        self.sinks.read().iter().map(Sink::error_count).sum()
    }

    /// A record stamped with this entry's name and app label.
    pub fn new_record(&self, level: Level, message: impl Into<String>) -> LogRecord {
        LogRecord::new(&self.name, level, message).with_app_name(self.settings.app_name.clone())
    }

    /// Format a record once and hand it to every sink.
    pub fn emit(&self, record: &LogRecord) {
        if !self.is_enabled(record.level) {
            return;
        }
        let line = self.formatter.read().format(record);
        for sink in self.sinks.read().iter() {
            sink.handle(record, &line);
        }
    }

    /// Emit a message without instance or call-site data.
    pub fn log(&self, level: Level, message: impl fmt::Display) {
        if self.is_enabled(level) {
            self.emit(&self.new_record(level, message.to_string()));
        }
    }

    /// Flush every sink, reporting the first failure.
    pub fn flush(&self) -> LogWrapResult<()> {
        let mut first_error = None;
        for sink in self.sinks.read().iter() {
            if let Err(e) = sink.flush() {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    pub fn version(&self) -> &'static str {
        VERSION
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("formatter", &self.formatter().template())
            .field("sinks", &*self.sinks.read())
            .finish()
    }
}

/// Map from logger name to its shared entry.
#[derive(Default)]
pub struct Registry {
    entries: Mutex<HashMap<String, Arc<RegistryEntry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::new)
    }

    pub fn get(&self, name: &str) -> Option<Arc<RegistryEntry>> {
        self.entries.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Forget a name. Handles already holding the entry keep working.
    pub fn remove(&self, name: &str) -> Option<Arc<RegistryEntry>> {
        self.entries.lock().remove(name)
    }

    /// Return the entry for `name`, creating it on first use.
    ///
    /// Settings and sinks are ignored when the name already exists.
    pub fn get_or_create(
        &self,
        name: &str,
        settings: LoggerSettings,
        sinks: Vec<Sink>,
    ) -> LogWrapResult<Arc<RegistryEntry>> {
        if let Some(existing) = self.get(name) {
            warn_on_conflict(&existing, &settings);
            return Ok(existing);
        }

        let entry = Arc::new(RegistryEntry::build(name, settings, sinks)?);

        let mut entries = self.entries.lock();
        if let Some(winner) = entries.get(name) {
            // Lost a creation race; the prepared sinks are dropped
            warn_on_conflict(winner, entry.settings());
            return Ok(winner.clone());
        }
        entries.insert(name.to_string(), entry.clone());
        drop(entries);

        tracing::debug!(
            logger = name,
            sinks = ?entry.output_paths(None),
            "registered logger"
        );
        Ok(entry)
    }

    /// Create the entry for `name`, failing if it is already registered.
    pub fn register(
        &self,
        name: &str,
        settings: LoggerSettings,
        sinks: Vec<Sink>,
    ) -> LogWrapResult<Arc<RegistryEntry>> {
        if self.contains(name) {
            return Err(LogWrapError::ConfigConflict(name.to_string()));
        }

        let entry = Arc::new(RegistryEntry::build(name, settings, sinks)?);

        let mut entries = self.entries.lock();
        if entries.contains_key(name) {
            return Err(LogWrapError::ConfigConflict(name.to_string()));
        }
        entries.insert(name.to_string(), entry.clone());
        Ok(entry)
    }
}

fn warn_on_conflict(existing: &RegistryEntry, requested: &LoggerSettings) {
    if existing.settings() != requested {
        tracing::warn!(
            logger = existing.name(),
            registered = ?existing.settings(),
            requested = ?requested,
            "logger already registered, ignoring new settings"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemoryBuffer;
    use tempfile::TempDir;

    fn memory_entry(registry: &Registry, name: &str) -> (Arc<RegistryEntry>, MemoryBuffer) {
        let buffer = MemoryBuffer::new(64);
        let entry = registry
            .get_or_create(
                name,
                LoggerSettings::default(),
                vec![Sink::memory(buffer.clone())],
            )
            .unwrap();
        (entry, buffer)
    }

    #[test]
    fn test_second_lookup_returns_same_entry() {
        let registry = Registry::new();
        let (first, _) = memory_entry(&registry, "svc");

        let second = registry
            .get_or_create(
                "svc",
                LoggerSettings {
                    level: Level::Critical,
                    meta: false,
                    ..LoggerSettings::default()
                },
                vec![Sink::console(), Sink::stdout()],
            )
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.level(), Level::Debug);
        assert_eq!(second.sink_kinds(), vec![SinkKind::Memory]);
        assert_eq!(registry.names(), vec!["svc".to_string()]);
    }

    #[test]
    fn test_register_rejects_existing_name() {
        let registry = Registry::new();
        registry
            .register("db", LoggerSettings::default(), vec![])
            .unwrap();
        let err = registry
            .register("db", LoggerSettings::default(), vec![])
            .unwrap_err();
        assert!(matches!(err, LogWrapError::ConfigConflict(name) if name == "db"));
    }

    #[test]
    fn test_emit_filters_by_entry_level() {
        let registry = Registry::new();
        let (entry, buffer) = memory_entry(&registry, "filter");
        entry.set_level(Level::Warning);

        entry.log(Level::Info, "dropped");
        entry.log(Level::Error, "kept");

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("kept"));
        assert!(lines[0].contains("ERROR"));
    }

    #[test]
    fn test_set_format_applies_to_sinks() {
        let registry = Registry::new();
        let (entry, buffer) = memory_entry(&registry, "fmt");

        entry.set_format("{level}|{name}|{message}").unwrap();
        entry.log(Level::Info, "custom");
        assert_eq!(buffer.lines(), vec!["INFO|fmt|custom".to_string()]);

        assert!(entry.set_format("{bogus}").is_err());
        entry.reset_format();
        assert_eq!(entry.formatter(), LoggerSettings::default().formatter());
    }

    #[test]
    fn test_remove_sinks_by_kind() {
        let registry = Registry::new();
        let entry = registry
            .get_or_create(
                "mixed",
                LoggerSettings::default(),
                vec![
                    Sink::console(),
                    Sink::memory(MemoryBuffer::new(4)),
                    Sink::stdout(),
                ],
            )
            .unwrap();

        assert_eq!(entry.remove_sinks(None), 0);
        assert_eq!(entry.remove_sinks(Some(SinkKind::Queue)), 0);
        assert_eq!(entry.sink_count(), 3);

        assert_eq!(entry.remove_sinks(Some(SinkKind::Console)), 2);
        assert_eq!(entry.sink_kinds(), vec![SinkKind::Memory]);

        assert_eq!(entry.remove_sinks(Some(SinkKind::Any)), 1);
        assert_eq!(entry.sink_count(), 0);
    }

    #[test]
    fn test_output_paths_by_kind() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.log");
        let registry = Registry::new();
        let entry = registry
            .get_or_create(
                "paths",
                LoggerSettings {
                    date_filename: false,
                    ..LoggerSettings::default()
                },
                vec![Sink::console(), Sink::file(&path), Sink::memory(MemoryBuffer::new(1))],
            )
            .unwrap();

        let file = path.display().to_string();
        assert_eq!(
            entry.output_paths(None),
            vec!["<stderr>".to_string(), file.clone(), "<mem>".to_string()]
        );
        assert_eq!(entry.output_paths(Some(SinkKind::File)), vec![file.clone()]);
        assert_eq!(
            entry.output_paths(Some(SinkKind::Stream)),
            vec!["<stderr>".to_string(), file]
        );
    }

    #[test]
    fn test_add_sink_after_creation() {
        let registry = Registry::new();
        let (entry, _) = memory_entry(&registry, "grow");
        let extra = MemoryBuffer::new(4);

        entry.add_sink(Sink::memory(extra.clone())).unwrap();
        entry.log(Level::Info, "both");

        assert_eq!(entry.sink_count(), 2);
        assert_eq!(extra.len(), 1);
    }

    #[test]
    fn test_remove_entry_keeps_handles_working() {
        let registry = Registry::new();
        let (entry, buffer) = memory_entry(&registry, "gone");

        assert!(registry.remove("gone").is_some());
        assert!(!registry.contains("gone"));

        entry.log(Level::Info, "still here");
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_version() {
        let registry = Registry::new();
        let (entry, _) = memory_entry(&registry, "v");
        assert_eq!(entry.version(), env!("CARGO_PKG_VERSION"));
    }
}
