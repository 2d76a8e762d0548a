//! logwrap core library
//!
//! Named, shared loggers with a standard line format and pluggable sinks.
//!
//! ## Overview
//!
//! A [`Registry`] maps logger names to one shared [`RegistryEntry`] each:
//! level, formatter and an ordered list of [`Sink`]s. The first request
//! for a name configures it; later requests get the same entry back.
//! [`InstanceLogger`] handles bind an instance name to an entry and stamp
//! it on every record, so components sharing a logger stay
//! distinguishable.
//!
//! Default line layout:
//!
//! ```text
//! 2023-05-01 12:00:00,123,[INFO:pid=4242:main:db:pool:?:87],connected
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use logwrap_core::{LoggerBuilder, Sink, SinkKind};
//!
//! fn main() -> Result<(), logwrap_core::LogWrapError> {
//!     let log = LoggerBuilder::new("svc")
//!         .app_name("billing")
//!         .date_filename(false)
//!         .sink(Sink::console())
//!         .sink(Sink::file("/var/log/billing/app.log"))
//!         .instance("db")?;
//!
//!     log.info("connected");
//!     println!("{:?}", log.output_paths(None));
//!
//!     log.remove_sinks(Some(SinkKind::Console));
//!     log.warning("only in the file now");
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod facade;
pub mod format;
pub mod layer;
pub mod level;
pub mod record;
pub mod registry;
pub mod sink;

// Re-exports
pub use builder::LoggerBuilder;
pub use config::{LoggerConfig, SinkConfig};
pub use error::{LogWrapError, LogWrapResult};
pub use facade::InstanceLogger;
pub use format::{dated_file_name, Formatter};
pub use layer::RegistryLayer;
pub use level::Level;
pub use record::{CallSite, LogRecord};
pub use registry::{LoggerSettings, Registry, RegistryEntry, DEFAULT_LOGGER_NAME, VERSION};
pub use sink::{
    ConsoleStream, Facility, FileMode, HttpMethod, LogSink, MailSettings, MemoryBuffer,
    QueuedRecord, Sink, SinkKind, SinkTarget, SyslogAddress,
};
